//! Field and table view models
//!
//! A view model carries everything the terminal renderer needs to draw one
//! question or one repeatable-section table, in either editable or preview mode.

use super::layout::table_columns;
use crate::schema::{FieldKind, Question, Section};
use crate::state::{AnswerValue, FieldKey, Row};

/// Shown in preview for fields without a value
pub const PREVIEW_PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Edit,
    Preview,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// Input widget per field kind
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetSpec {
    TextInput,
    TextArea,
    Dropdown(Vec<OptionView>),
    RadioGroup(Vec<OptionView>),
    CheckboxGroup(Vec<OptionView>),
}

impl WidgetSpec {
    pub fn options(&self) -> &[OptionView] {
        match self {
            WidgetSpec::TextInput | WidgetSpec::TextArea => &[],
            WidgetSpec::Dropdown(options)
            | WidgetSpec::RadioGroup(options)
            | WidgetSpec::CheckboxGroup(options) => options,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldView {
    pub section_id: String,
    pub question_id: String,
    pub key: FieldKey,
    pub label: String,
    pub required: bool,
    pub help_text: Option<String>,
    pub widget: WidgetSpec,
    pub value: AnswerValue,
    /// Offers a history or dependent-field lookup
    pub fetchable: bool,
}

impl FieldView {
    pub fn display(&self, mode: RenderMode) -> String {
        display_value(&self.widget, &self.value, mode)
    }
}

fn option_views(kind: &FieldKind, value: &AnswerValue) -> Vec<OptionView> {
    kind.options()
        .iter()
        .map(|o| OptionView {
            value: o.value.clone(),
            label: o.label.clone(),
            selected: match value {
                AnswerValue::Choices(selected) => selected.contains(&o.value),
                other => other.as_text() == o.value,
            },
        })
        .collect()
}

/// Dispatch a question to its widget
pub fn widget_for(kind: &FieldKind, value: &AnswerValue) -> WidgetSpec {
    match kind {
        FieldKind::Text => WidgetSpec::TextInput,
        FieldKind::MultilineText => WidgetSpec::TextArea,
        FieldKind::SingleSelect { .. } => WidgetSpec::Dropdown(option_views(kind, value)),
        FieldKind::SingleChoice { .. } => WidgetSpec::RadioGroup(option_views(kind, value)),
        FieldKind::MultiChoice { .. } => WidgetSpec::CheckboxGroup(option_views(kind, value)),
    }
}

/// Text shown for a value: option labels for choice widgets, the placeholder
/// for empty values in preview
pub fn display_value(widget: &WidgetSpec, value: &AnswerValue, mode: RenderMode) -> String {
    let text = match widget {
        WidgetSpec::TextInput | WidgetSpec::TextArea => value.display().unwrap_or_default(),
        _ => {
            let labels: Vec<&str> = widget
                .options()
                .iter()
                .filter(|o| o.selected)
                .map(|o| o.label.as_str())
                .collect();
            if labels.is_empty() {
                // Values outside the option list still show
                value.display().unwrap_or_default()
            } else {
                labels.join(", ")
            }
        }
    };
    if text.is_empty() && mode == RenderMode::Preview {
        PREVIEW_PLACEHOLDER.to_string()
    } else {
        text
    }
}

pub fn field_view(section: &Section, question: &Question, value: AnswerValue) -> FieldView {
    FieldView {
        section_id: section.id.clone(),
        question_id: question.id.clone(),
        key: question.field_key(&section.id),
        label: question.label.clone(),
        required: question.required,
        help_text: question.help_text.clone(),
        widget: widget_for(&question.kind, &value),
        value,
        fetchable: question.is_fetchable(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnView {
    pub question_id: String,
    pub label: String,
}

/// Committed rows of a repeatable section, as display strings
#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub columns: Vec<ColumnView>,
    pub rows: Vec<Vec<String>>,
    pub editing: Option<usize>,
}

pub fn table_view(section: &Section, rows: &[Row], editing: Option<usize>, mode: RenderMode) -> TableView {
    let questions = table_columns(section);
    let columns = questions
        .iter()
        .map(|q| ColumnView {
            question_id: q.id.clone(),
            label: q.label.clone(),
        })
        .collect();
    let rows = rows
        .iter()
        .map(|row| {
            questions
                .iter()
                .map(|q| {
                    let value = row.get(&q.id).cloned().unwrap_or_default();
                    display_value(&widget_for(&q.kind, &value), &value, mode)
                })
                .collect()
        })
        .collect();
    TableView {
        columns,
        rows,
        editing,
    }
}
