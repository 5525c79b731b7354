//! HTTP/JSON client for the form service

use super::traits::FormApi;
use super::types::{AuthContext, DependentData, HistoryEntry, HistoryEnvelope, StoredResponse, SubmitBody};
use crate::schema::{self, Form};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the form service REST API
pub struct HttpFormApi {
    client: Client,
    base_url: Url,
}

impl HttpFormApi {
    pub fn new(base_url: &str, auth: AuthContext) -> Result<Self> {
        let base_url = Url::parse(base_url).with_context(|| format!("Invalid API base URL '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("API base URL '{base_url}' cannot carry a path"));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(Self::headers(&auth)?)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, base_url })
    }

    fn headers(auth: &AuthContext) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = auth.session_cookie.as_deref().filter(|c| !c.is_empty()) {
            let value = HeaderValue::from_str(cookie).context("Session cookie is not a valid header value")?;
            headers.insert(COOKIE, value);
        }
        Ok(headers)
    }

    /// Base URL extended by percent-encoded path segments
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to {what}"))?
            .error_for_status()
            .with_context(|| format!("Failed to {what}"))?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode response to {what}"))
    }
}

#[async_trait]
impl FormApi for HttpFormApi {
    async fn fetch_form_schema(&self, form_id: Uuid) -> Result<Form> {
        let url = self.endpoint(&[&form_id.to_string()]);
        tracing::debug!(%url, "Fetching form schema");
        let document: serde_json::Value = self.send_json(self.client.get(url), "load form").await?;
        let form = schema::parse_form(document).context("Form schema is invalid")?;
        Ok(form)
    }

    async fn submit_response(&self, form_id: Uuid, payload: serde_json::Value) -> Result<()> {
        let url = self.endpoint(&[&form_id.to_string(), "responses"]);
        tracing::debug!(%url, "Submitting response");
        self.client
            .post(url)
            .json(&SubmitBody { data: &payload })
            .send()
            .await
            .context("Failed to submit response")?
            .error_for_status()
            .context("Failed to submit response")?;
        Ok(())
    }

    async fn fetch_response_by_id(&self, form_id: Uuid, response_id: &str) -> Result<StoredResponse> {
        let url = self.endpoint(&[&form_id.to_string(), "responses", response_id]);
        self.send_json(self.client.get(url), "load response").await
    }

    async fn fetch_history(&self, form_id: Uuid, question_id: &str, value: &str) -> Result<Vec<HistoryEntry>> {
        let url = self.endpoint(&[&form_id.to_string(), "questions", question_id, "history"]);
        let request = self.client.get(url).query(&[("value", value)]);
        let envelope: HistoryEnvelope = self.send_json(request, "load history").await?;
        Ok(envelope.data)
    }

    async fn fetch_dependent_field_data(
        &self,
        form_id: Uuid,
        section_id: &str,
        question_id: &str,
        value: &str,
    ) -> Result<DependentData> {
        let url = self.endpoint(&[
            &form_id.to_string(),
            "sections",
            section_id,
            "questions",
            question_id,
            "api",
        ]);
        let request = self.client.get(url).query(&[("value", value)]);
        self.send_json(request, "load dependent field data").await
    }

    async fn fetch_all_responses(&self, form_id: Uuid) -> Result<Vec<StoredResponse>> {
        let url = self.endpoint(&[&form_id.to_string(), "responses"]);
        self.send_json(self.client.get(url), "load responses").await
    }
}
