//! Trait abstraction for the form service to enable mocking in tests

use super::types::{DependentData, HistoryEntry, StoredResponse};
use crate::schema::Form;
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Operations the form engine needs from the remote service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FormApi: Send + Sync {
    /// Load and decode a form schema
    async fn fetch_form_schema(&self, form_id: Uuid) -> Result<Form>;

    /// Submit a nested answer payload
    async fn submit_response(&self, form_id: Uuid, payload: serde_json::Value) -> Result<()>;

    /// Fetch one stored response
    async fn fetch_response_by_id(&self, form_id: Uuid, response_id: &str) -> Result<StoredResponse>;

    /// Responses in which a question had the given value
    async fn fetch_history(&self, form_id: Uuid, question_id: &str, value: &str) -> Result<Vec<HistoryEntry>>;

    /// Values for other fields derived from one field's value
    async fn fetch_dependent_field_data(
        &self,
        form_id: Uuid,
        section_id: &str,
        question_id: &str,
        value: &str,
    ) -> Result<DependentData>;

    /// Every stored response of a form
    async fn fetch_all_responses(&self, form_id: Uuid) -> Result<Vec<StoredResponse>>;
}
