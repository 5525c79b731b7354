//! Response shapes of the form service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A stored submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    #[serde(alias = "_id", deserialize_with = "id_string")]
    pub id: String,
    pub submitted_at: DateTime<Utc>,
    /// Nested `{ section: { question: value } }` payload
    #[serde(default)]
    pub data: serde_json::Value,
}

/// One hit of a history lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(alias = "_id", deserialize_with = "id_string")]
    pub id: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryEnvelope {
    #[serde(default)]
    pub data: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub(super) struct SubmitBody<'a> {
    pub data: &'a serde_json::Value,
}

/// Dependent-field data: other field keys and their values
pub type DependentData = serde_json::Map<String, serde_json::Value>;

/// Credentials attached to every request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthContext {
    pub session_cookie: Option<String>,
}

impl AuthContext {
    pub fn with_cookie(cookie: impl Into<String>) -> Self {
        Self {
            session_cookie: Some(cookie.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session_cookie.as_deref().is_some_and(|c| !c.is_empty())
    }
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Int(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Int(n) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stored_response_accepts_mongo_id() {
        let response: StoredResponse = serde_json::from_value(json!({
            "_id": "abc",
            "submitted_at": "2024-03-01T10:00:00Z",
            "data": { "s1": { "q1": "x" } }
        }))
        .unwrap();
        assert_eq!(response.id, "abc");
        assert_eq!(response.data["s1"]["q1"], json!("x"));
    }

    #[test]
    fn test_history_envelope() {
        let envelope: HistoryEnvelope = serde_json::from_value(json!({
            "data": [{ "_id": 7, "submitted_at": "2024-03-01T10:00:00Z" }]
        }))
        .unwrap();
        assert_eq!(envelope.data[0].id, "7");
    }

    #[test]
    fn test_auth_context() {
        assert!(!AuthContext::default().is_authenticated());
        assert!(!AuthContext::with_cookie("").is_authenticated());
        assert!(AuthContext::with_cookie("sid=1").is_authenticated());
    }
}
