//! Field binding: the stable storage key of a question

use crate::schema::{Question, Section};
use std::borrow::Borrow;
use std::fmt;

/// Resolved field key: the question's variable name, or `"{section}.{question}"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey(String);

impl FieldKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FieldKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Derive the storage key for a question. Depends only on the schema.
pub fn resolve_key(section_id: &str, question: &Question) -> FieldKey {
    match question.meta.variable_name.as_deref() {
        Some(name) if !name.is_empty() => FieldKey(name.to_string()),
        _ => FieldKey(format!("{}.{}", section_id, question.id)),
    }
}

impl Question {
    pub fn field_key(&self, section_id: &str) -> FieldKey {
        resolve_key(section_id, self)
    }
}

/// Resolved keys of every question in a section, in schema order
pub fn section_keys(section: &Section) -> Vec<FieldKey> {
    section
        .questions
        .iter()
        .map(|q| resolve_key(&section.id, q))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::*;

    #[test]
    fn test_positional_key() {
        assert_eq!(resolve_key("s1", &text("q1")).as_str(), "s1.q1");
    }

    #[test]
    fn test_variable_name_overrides() {
        let mut q = text("q1");
        q.meta.variable_name = Some("age".into());
        assert_eq!(resolve_key("s1", &q).as_str(), "age");
    }

    #[test]
    fn test_empty_variable_name_falls_back() {
        let mut q = text("q1");
        q.meta.variable_name = Some(String::new());
        assert_eq!(resolve_key("s1", &q).as_str(), "s1.q1");
    }

    #[test]
    fn test_section_keys_in_schema_order() {
        let s = section("s", vec![text("b"), text("a")]);
        let keys: Vec<String> = section_keys(&s).iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["s.b", "s.a"]);
    }
}
