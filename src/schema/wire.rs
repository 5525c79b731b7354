//! JSON wire shape of the form schema and its conversion into the model

use super::model::{ChoiceOption, FieldKind, Form, Layout, Question, QuestionMeta, Section, Version};
use super::SchemaError;
use crate::expr::Expression;
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WireForm {
    pub id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub versions: Vec<WireVersion>,
}

#[derive(Debug, Deserialize)]
pub struct WireVersion {
    #[serde(default)]
    pub sections: Vec<WireSection>,
}

#[derive(Debug, Deserialize)]
pub struct WireSection {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ui: Option<String>,
    #[serde(default)]
    pub is_repeatable_section: bool,
    #[serde(default)]
    pub questions: Vec<WireQuestion>,
}

#[derive(Debug, Deserialize)]
pub struct WireQuestion {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub field_type: String,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub options: Vec<WireOption>,
    #[serde(default)]
    pub visibility_condition: Option<String>,
    #[serde(default)]
    pub calculated_value: Option<String>,
    #[serde(default)]
    pub meta_data: Option<WireMeta>,
    #[serde(default)]
    pub field_api_call: Option<serde_json::Value>,
    #[serde(default)]
    pub visible_header: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct WireMeta {
    #[serde(default)]
    pub variable_name: Option<String>,
    #[serde(default)]
    pub history: bool,
    #[serde(default)]
    pub field_api_call: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct WireOption {
    #[serde(default, deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub option_value: String,
    #[serde(default)]
    pub option_label: String,
}

/// Accept ids as JSON strings or numbers
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Float(n) => n.to_string(),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Truthiness of an opaque descriptor
fn descriptor(value: Option<serde_json::Value>) -> Option<serde_json::Value> {
    use serde_json::Value;
    value.filter(|v| match v {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

impl TryFrom<WireForm> for Form {
    type Error = SchemaError;

    fn try_from(wire: WireForm) -> Result<Self, Self::Error> {
        if wire.versions.is_empty() {
            return Err(SchemaError::NoVersions(wire.id));
        }
        let versions = wire
            .versions
            .into_iter()
            .map(Version::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Form {
            id: wire.id,
            title: wire.title,
            description: non_blank(wire.description),
            versions,
        })
    }
}

impl TryFrom<WireVersion> for Version {
    type Error = SchemaError;

    fn try_from(wire: WireVersion) -> Result<Self, Self::Error> {
        let sections = wire
            .sections
            .into_iter()
            .map(Section::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Version { sections })
    }
}

impl TryFrom<WireSection> for Section {
    type Error = SchemaError;

    fn try_from(wire: WireSection) -> Result<Self, Self::Error> {
        let layout = match wire.ui.as_deref() {
            Some("grid-cols-2") | Some("two-column") => Layout::TwoColumn,
            _ => Layout::Linear,
        };
        let section_id = wire.id;
        let questions = wire
            .questions
            .into_iter()
            .map(|q| question_from_wire(&section_id, q))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Section {
            id: section_id,
            title: wire.title,
            description: non_blank(wire.description),
            layout,
            is_repeatable: wire.is_repeatable_section,
            questions,
        })
    }
}

fn question_from_wire(section_id: &str, wire: WireQuestion) -> Result<Question, SchemaError> {
    let options: Vec<ChoiceOption> = wire
        .options
        .into_iter()
        .map(|o| ChoiceOption {
            id: o.id,
            label: if o.option_label.is_empty() {
                o.option_value.clone()
            } else {
                o.option_label
            },
            value: o.option_value,
        })
        .collect();

    let kind = match wire.field_type.as_str() {
        "input" | "text" => FieldKind::Text,
        "textarea" | "multiline-text" => FieldKind::MultilineText,
        "select" | "single-select" => FieldKind::SingleSelect { options },
        "radio" | "single-choice" => FieldKind::SingleChoice { options },
        "checkbox" | "multi-choice" => FieldKind::MultiChoice { options },
        other => {
            return Err(SchemaError::UnknownFieldType {
                section: section_id.to_string(),
                question: wire.id,
                field_type: other.to_string(),
            })
        }
    };

    let meta = wire.meta_data.unwrap_or_default();
    Ok(Question {
        id: wire.id,
        label: wire.label,
        kind,
        required: wire.is_required,
        help_text: non_blank(wire.help_text),
        visibility: non_blank(wire.visibility_condition).map(|s| Expression::parse(&s)),
        calculated: non_blank(wire.calculated_value).map(|s| Expression::parse(&s)),
        meta: QuestionMeta {
            variable_name: non_blank(meta.variable_name),
            history: meta.history,
            dependent_api: descriptor(wire.field_api_call).or(descriptor(meta.field_api_call)),
        },
        visible_header: wire.visible_header,
    })
}
