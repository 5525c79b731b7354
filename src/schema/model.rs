//! Schema model: Form → Version → Section → Question → Option

use crate::expr::Expression;
use crate::state::AnswerValue;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Never empty once loaded; the last entry is the active version
    pub(super) versions: Vec<Version>,
}

impl Form {
    /// The active (latest) version
    pub fn latest(&self) -> &Version {
        // Construction guarantees at least one version
        &self.versions[self.versions.len() - 1]
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Version {
    pub sections: Vec<Section>,
}

impl Version {
    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    pub fn questions(&self) -> impl Iterator<Item = (&Section, &Question)> {
        self.sections
            .iter()
            .flat_map(|s| s.questions.iter().map(move |q| (s, q)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    Linear,
    TwoColumn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub layout: Layout,
    pub is_repeatable: bool,
    pub questions: Vec<Question>,
}

impl Section {
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

/// Machine value plus display label for choice fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub id: String,
    pub value: String,
    pub label: String,
}

/// Field type, carrying only what its widget needs
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    MultilineText,
    SingleSelect { options: Vec<ChoiceOption> },
    SingleChoice { options: Vec<ChoiceOption> },
    MultiChoice { options: Vec<ChoiceOption> },
}

impl FieldKind {
    pub fn options(&self) -> &[ChoiceOption] {
        match self {
            FieldKind::Text | FieldKind::MultilineText => &[],
            FieldKind::SingleSelect { options }
            | FieldKind::SingleChoice { options }
            | FieldKind::MultiChoice { options } => options,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, FieldKind::MultiChoice { .. })
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FieldKind::Text | FieldKind::MultilineText)
    }

    /// Whether a value has the shape this field kind stores
    pub fn accepts(&self, value: &AnswerValue) -> bool {
        match value {
            AnswerValue::Empty => true,
            AnswerValue::Choices(_) => self.is_multi(),
            _ => !self.is_multi(),
        }
    }

    /// Option label for a stored machine value
    pub fn label_for(&self, value: &str) -> Option<&str> {
        self.options()
            .iter()
            .find(|o| o.value == value)
            .map(|o| o.label.as_str())
    }

    pub fn tag(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::MultilineText => "multiline-text",
            FieldKind::SingleSelect { .. } => "single-select",
            FieldKind::SingleChoice { .. } => "single-choice",
            FieldKind::MultiChoice { .. } => "multi-choice",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuestionMeta {
    /// Stable storage key overriding the positional key
    pub variable_name: Option<String>,
    /// Offers a history lookup keyed by this field's value
    pub history: bool,
    /// Dependent-field API descriptor, opaque to the client
    pub dependent_api: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub help_text: Option<String>,
    pub visibility: Option<Expression>,
    pub calculated: Option<Expression>,
    pub meta: QuestionMeta,
    /// Shown as a column in the responses listing
    pub visible_header: bool,
}

impl Question {
    /// Whether the question offers a remote fetch action
    pub fn is_fetchable(&self) -> bool {
        self.meta.history || self.meta.dependent_api.is_some()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Schema builders shared by tests across the crate

    use super::*;

    pub fn option(value: &str, label: &str) -> ChoiceOption {
        ChoiceOption {
            id: format!("opt-{value}"),
            value: value.to_string(),
            label: label.to_string(),
        }
    }

    pub fn question(id: &str, kind: FieldKind) -> Question {
        Question {
            id: id.to_string(),
            label: format!("Question {id}"),
            kind,
            required: false,
            help_text: None,
            visibility: None,
            calculated: None,
            meta: QuestionMeta::default(),
            visible_header: false,
        }
    }

    pub fn text(id: &str) -> Question {
        question(id, FieldKind::Text)
    }

    pub fn multi(id: &str, values: &[&str]) -> Question {
        question(
            id,
            FieldKind::MultiChoice {
                options: values.iter().map(|v| option(v, v)).collect(),
            },
        )
    }

    pub fn section(id: &str, questions: Vec<Question>) -> Section {
        Section {
            id: id.to_string(),
            title: format!("Section {id}"),
            description: None,
            layout: Layout::Linear,
            is_repeatable: false,
            questions,
        }
    }

    pub fn repeatable(id: &str, questions: Vec<Question>) -> Section {
        Section {
            is_repeatable: true,
            ..section(id, questions)
        }
    }

    pub fn form(sections: Vec<Section>) -> Form {
        Form {
            id: Uuid::nil(),
            title: "Test form".to_string(),
            description: None,
            versions: vec![Version { sections }],
        }
    }
}
