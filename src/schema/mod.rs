//! Form schema model
//!
//! The schema is fetched once per session, decoded from its JSON wire shape,
//! and shared read-only by the render engine, evaluator, and codec.

mod model;
mod wire;

pub use model::{FieldKind, Form, Layout, Question, Section, Version};

#[cfg(test)]
pub(crate) use model::fixtures;

use thiserror::Error;
use uuid::Uuid;
use wire::WireForm;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("form {0} has no versions")]
    NoVersions(Uuid),

    #[error("question {question} in section {section} has unknown field type '{field_type}'")]
    UnknownFieldType {
        section: String,
        question: String,
        field_type: String,
    },
}

/// Decode a form schema document
pub fn parse_form(value: serde_json::Value) -> Result<Form, SchemaError> {
    let wire: WireForm = serde_json::from_value(value)?;
    let form = Form::try_from(wire)?;
    warn_invalid_expressions(&form);
    Ok(form)
}

/// Invalid expressions stay in the model and fail open when evaluated
fn warn_invalid_expressions(form: &Form) {
    for (section, question) in form.latest().questions() {
        for (role, expr) in [("visibility", &question.visibility), ("calculated", &question.calculated)] {
            if let Some(expr) = expr.as_ref().filter(|e| !e.is_valid()) {
                tracing::warn!(
                    section = %section.id,
                    question = %question.id,
                    role,
                    source = expr.source(),
                    error = ?expr.parse_error(),
                    "Invalid expression"
                );
            }
        }
    }
}
