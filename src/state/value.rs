//! Answer value objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single answer as held in Answer State.
///
/// Multi-choice questions hold `Choices`; every other field kind holds a
/// scalar. `Number` and `Bool` only arise from calculated values and remote
/// enrichment, never from direct keyboard input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum AnswerValue {
    #[default]
    Empty,
    Text(String),
    Choices(Vec<String>),
    Number(f64),
    Bool(bool),
}

impl AnswerValue {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            AnswerValue::Empty
        } else {
            AnswerValue::Text(value)
        }
    }

    pub fn choices<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnswerValue::Choices(values.into_iter().map(Into::into).collect())
    }

    /// True for values that render as a blank input
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Empty => true,
            AnswerValue::Text(s) => s.is_empty(),
            AnswerValue::Choices(c) => c.is_empty(),
            AnswerValue::Number(_) | AnswerValue::Bool(_) => false,
        }
    }

    /// Text content for scalar values (empty for choices)
    pub fn as_text(&self) -> String {
        match self {
            AnswerValue::Empty | AnswerValue::Choices(_) => String::new(),
            AnswerValue::Text(s) => s.clone(),
            AnswerValue::Number(n) => format_number(*n),
            AnswerValue::Bool(b) => b.to_string(),
        }
    }

    /// Selected options of a multi-choice answer
    pub fn as_choices(&self) -> &[String] {
        match self {
            AnswerValue::Choices(c) => c,
            _ => &[],
        }
    }

    /// Display string, `None` when the value is empty
    pub fn display(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(match self {
            AnswerValue::Choices(c) => c.join(", "),
            other => other.as_text(),
        })
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display().unwrap_or_default())
    }
}

/// Format a number without a trailing `.0` for whole values
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<serde_json::Value> for AnswerValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => AnswerValue::Empty,
            Value::Bool(b) => AnswerValue::Bool(b),
            Value::Number(n) => n.as_f64().map(AnswerValue::Number).unwrap_or_default(),
            Value::String(s) => AnswerValue::text(s),
            Value::Array(items) => AnswerValue::Choices(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            // Nested objects are not a legal answer shape; keep them readable.
            Value::Object(map) => AnswerValue::Text(Value::Object(map).to_string()),
        }
    }
}

impl From<AnswerValue> for serde_json::Value {
    fn from(value: AnswerValue) -> Self {
        use serde_json::Value;
        match value {
            AnswerValue::Empty => Value::String(String::new()),
            AnswerValue::Text(s) => Value::String(s),
            AnswerValue::Choices(c) => Value::Array(c.into_iter().map(Value::String).collect()),
            AnswerValue::Number(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AnswerValue::Bool(b) => Value::Bool(b),
        }
    }
}
