//! Remote enrichment coordinator
//!
//! A fetch is checked against its preconditions before it is dispatched, runs
//! on a spawned task, and reports back over a channel drained by the event
//! loop. The merge happens on the loop, so Answer State is only ever touched
//! from one place.

use crate::api::{FormApi, HistoryEntry};
use crate::state::{AnswerValue, FieldKey, FormSession, MergeReport, NoticeKind};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("Missing value or question ID")]
    MissingInput,

    #[error("question {0} offers no lookup")]
    NotFetchable(String),

    #[error("a fetch for {0} is already running")]
    Busy(FieldKey),

    #[error("Fetch failed: {0:#}")]
    Fetch(anyhow::Error),
}

/// Everything a fetch needs, captured when it is triggered
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub form_id: Uuid,
    pub section_id: String,
    pub question_id: String,
    pub key: FieldKey,
    pub value: String,
    pub history: bool,
    pub dependent: bool,
    /// Store revision at dispatch
    pub revision: u64,
}

impl FetchRequest {
    /// Build a request from the question's current value
    pub fn for_question(session: &FormSession, section_id: &str, question_id: &str) -> Result<Self, EnrichError> {
        let form = session.form();
        let (section, question) = form
            .latest()
            .section(section_id)
            .and_then(|s| s.question(question_id).map(|q| (s, q)))
            .ok_or(EnrichError::MissingInput)?;
        if !question.is_fetchable() {
            return Err(EnrichError::NotFetchable(question.id.clone()));
        }

        let value = session
            .value(section, question)
            .display()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(EnrichError::MissingInput)?;
        if form.id.is_nil() || question.id.is_empty() {
            return Err(EnrichError::MissingInput);
        }

        Ok(Self {
            form_id: form.id,
            section_id: section.id.clone(),
            question_id: question.id.clone(),
            key: question.field_key(&section.id),
            value,
            history: question.meta.history,
            dependent: question.meta.dependent_api.is_some(),
            revision: session.store().revision(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    /// Most recent matching responses, newest first
    pub history: Option<Vec<HistoryEntry>>,
    pub dependent: Option<Vec<(FieldKey, AnswerValue)>>,
}

/// Run the lookups of one request. Any failure fails the whole fetch.
pub async fn fetch_for(api: &dyn FormApi, request: &FetchRequest, history_limit: usize) -> Result<FetchOutcome, EnrichError> {
    let mut outcome = FetchOutcome::default();

    if request.history {
        let mut entries = api
            .fetch_history(request.form_id, &request.question_id, &request.value)
            .await
            .map_err(EnrichError::Fetch)?;
        entries.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        entries.truncate(history_limit);
        outcome.history = Some(entries);
    }

    if request.dependent {
        let data = api
            .fetch_dependent_field_data(
                request.form_id,
                &request.section_id,
                &request.question_id,
                &request.value,
            )
            .await
            .map_err(EnrichError::Fetch)?;
        let values = data
            .into_iter()
            .map(|(key, value)| (FieldKey::new(key), AnswerValue::from(value)))
            .collect();
        outcome.dependent = Some(values);
    }

    Ok(outcome)
}

#[derive(Debug)]
pub struct FetchCompletion {
    pub request: FetchRequest,
    pub outcome: Result<FetchOutcome, EnrichError>,
}

/// What a completed fetch changed
#[derive(Debug, Default, PartialEq)]
pub struct Applied {
    pub history: Option<Vec<HistoryEntry>>,
    pub merge: Option<MergeReport>,
}

pub struct Coordinator {
    api: Arc<dyn FormApi>,
    history_limit: usize,
    busy: HashSet<FieldKey>,
    tx: mpsc::UnboundedSender<FetchCompletion>,
    rx: mpsc::UnboundedReceiver<FetchCompletion>,
}

impl Coordinator {
    pub fn new(api: Arc<dyn FormApi>, history_limit: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api,
            history_limit,
            busy: HashSet::new(),
            tx,
            rx,
        }
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.busy.contains(key)
    }

    pub fn in_flight(&self) -> usize {
        self.busy.len()
    }

    /// Check preconditions and start a fetch for one question
    pub fn trigger(&mut self, session: &FormSession, section_id: &str, question_id: &str) -> Result<(), EnrichError> {
        let request = FetchRequest::for_question(session, section_id, question_id)?;
        self.dispatch(request)
    }

    pub fn dispatch(&mut self, request: FetchRequest) -> Result<(), EnrichError> {
        if !self.busy.insert(request.key.clone()) {
            return Err(EnrichError::Busy(request.key));
        }
        tracing::debug!(key = %request.key, value = %request.value, "Dispatching fetch");

        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let limit = self.history_limit;
        tokio::spawn(async move {
            let outcome = fetch_for(api.as_ref(), &request, limit).await;
            // The receiver only goes away on shutdown
            let _ = tx.send(FetchCompletion { request, outcome });
        });
        Ok(())
    }

    /// Next completed fetch, if one is ready
    pub fn try_next(&mut self) -> Option<FetchCompletion> {
        let completion = self.rx.try_recv().ok()?;
        self.busy.remove(&completion.request.key);
        Some(completion)
    }

    /// Wait for the next completed fetch
    #[cfg(test)]
    pub async fn next(&mut self) -> Option<FetchCompletion> {
        let completion = self.rx.recv().await?;
        self.busy.remove(&completion.request.key);
        Some(completion)
    }
}

/// Merge a completed fetch into the session.
///
/// Dependent data is merged in one step, keeping keys the user edited after
/// dispatch. A failed fetch posts a notice and leaves answers untouched. A
/// fetch dispatched before the form was reset is discarded.
pub fn apply_completion(session: &mut FormSession, completion: FetchCompletion) -> Applied {
    let FetchCompletion { request, outcome } = completion;
    if session.store().is_stale(request.revision) {
        tracing::debug!(key = %request.key, "Discarding fetch dispatched before reset");
        return Applied::default();
    }
    match outcome {
        Ok(outcome) => {
            let merge = outcome
                .dependent
                .map(|values| session.apply_remote(values, request.revision));
            Applied {
                history: outcome.history,
                merge,
            }
        }
        Err(err) => {
            tracing::error!(key = %request.key, error = %err, "Fetch failed");
            session.notify(NoticeKind::Failure, "Fetch failed");
            Applied::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DependentData, MockFormApi};
    use crate::schema::fixtures::*;
    use crate::schema::Form;
    use anyhow::anyhow;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn lookup_form() -> Form {
        let mut mrn = text("mrn");
        mrn.meta.history = true;
        mrn.meta.dependent_api = Some(json!({ "url": "/patients" }));
        let mut name = text("name");
        name.meta.variable_name = Some("patient_name".to_string());
        let mut f = form(vec![section("p", vec![mrn, name, text("plain")])]);
        f.id = Uuid::from_u128(7);
        f
    }

    fn entry(id: &str, day: u32) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            submitted_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        }
    }

    fn filled_session() -> FormSession {
        let mut session = FormSession::new(lookup_form());
        session.set_text("p", "mrn", "12345").unwrap();
        session
    }

    fn dependent(pairs: &[(&str, serde_json::Value)]) -> DependentData {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    mod preconditions {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_missing_value_is_rejected() {
            let session = FormSession::new(lookup_form());
            assert!(matches!(
                FetchRequest::for_question(&session, "p", "mrn"),
                Err(EnrichError::MissingInput)
            ));
        }

        #[test]
        fn test_missing_form_id_is_rejected() {
            let mut f = lookup_form();
            f.id = Uuid::nil();
            let mut session = FormSession::new(f);
            session.set_text("p", "mrn", "1").unwrap();
            assert!(matches!(
                FetchRequest::for_question(&session, "p", "mrn"),
                Err(EnrichError::MissingInput)
            ));
        }

        #[test]
        fn test_plain_question_is_not_fetchable() {
            let mut session = filled_session();
            session.set_text("p", "plain", "x").unwrap();
            assert!(matches!(
                FetchRequest::for_question(&session, "p", "plain"),
                Err(EnrichError::NotFetchable(_))
            ));
        }

        #[test]
        fn test_request_captures_value_and_revision() {
            let session = filled_session();
            let request = FetchRequest::for_question(&session, "p", "mrn").unwrap();
            assert_eq!(request.value, "12345");
            assert_eq!(request.key, FieldKey::from("p.mrn"));
            assert_eq!(request.revision, session.store().revision());
            assert!(request.history && request.dependent);
        }
    }

    mod fetch {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_history_sorted_newest_first_and_truncated() {
            let mut api = MockFormApi::new();
            api.expect_fetch_history().times(1).returning(|_, _, _| {
                Ok(vec![
                    entry("a", 1),
                    entry("b", 5),
                    entry("c", 3),
                    entry("d", 9),
                    entry("e", 2),
                    entry("f", 7),
                ])
            });
            api.expect_fetch_dependent_field_data()
                .returning(|_, _, _, _| Ok(DependentData::new()));

            let request = FetchRequest::for_question(&filled_session(), "p", "mrn").unwrap();
            let outcome = fetch_for(&api, &request, 5).await.unwrap();

            let ids: Vec<String> = outcome.history.unwrap().into_iter().map(|e| e.id).collect();
            assert_eq!(ids, vec!["d", "f", "b", "c", "e"]);
        }

        #[tokio::test]
        async fn test_any_failure_fails_the_fetch() {
            let mut api = MockFormApi::new();
            api.expect_fetch_history().returning(|_, _, _| Ok(vec![]));
            api.expect_fetch_dependent_field_data()
                .returning(|_, _, _, _| Err(anyhow!("502 Bad Gateway")));

            let request = FetchRequest::for_question(&filled_session(), "p", "mrn").unwrap();
            let err = fetch_for(&api, &request, 5).await.unwrap_err();
            assert!(err.to_string().starts_with("Fetch failed"));
        }
    }

    mod coordinator {
        use super::*;
        use pretty_assertions::assert_eq;

        fn api_returning(data: DependentData) -> Arc<dyn FormApi> {
            let mut api = MockFormApi::new();
            api.expect_fetch_history().returning(|_, _, _| Ok(vec![entry("h1", 1)]));
            api.expect_fetch_dependent_field_data()
                .returning(move |_, _, _, _| Ok(data.clone()));
            Arc::new(api)
        }

        #[tokio::test]
        async fn test_dependent_data_merges_into_answers() {
            let mut session = filled_session();
            let mut coordinator = Coordinator::new(
                api_returning(dependent(&[("patient_name", json!("Ada")), ("age", json!(36))])),
                5,
            );

            coordinator.trigger(&session, "p", "mrn").unwrap();
            assert!(coordinator.is_busy("p.mrn"));

            let completion = coordinator.next().await.unwrap();
            assert!(!coordinator.is_busy("p.mrn"));
            let applied = apply_completion(&mut session, completion);

            assert_eq!(applied.history.map(|h| h.len()), Some(1));
            assert_eq!(session.store().get("patient_name"), Some(&AnswerValue::text("Ada")));
            assert_eq!(session.store().get("age"), Some(&AnswerValue::Number(36.0)));
        }

        #[tokio::test]
        async fn test_fetch_dispatched_before_submit_is_discarded() {
            let mut session = FormSession::new(lookup_form());
            session.set_text("p", "mrn", "A-123").unwrap();
            let mut coordinator = Coordinator::new(
                api_returning(dependent(&[("patient_name", json!("Patient A"))])),
                5,
            );

            coordinator.trigger(&session, "p", "mrn").unwrap();
            session.submit_succeeded();

            let completion = coordinator.next().await.unwrap();
            let applied = apply_completion(&mut session, completion);

            assert_eq!(applied, Applied::default());
            assert_eq!(session.store().get("patient_name"), Some(&AnswerValue::Empty));
            assert_eq!(session.store().get("p.mrn"), Some(&AnswerValue::Empty));
        }

        #[tokio::test]
        async fn test_second_trigger_while_busy_is_blocked() {
            let session = filled_session();
            let mut coordinator = Coordinator::new(api_returning(DependentData::new()), 5);
            coordinator.trigger(&session, "p", "mrn").unwrap();
            assert!(matches!(
                coordinator.trigger(&session, "p", "mrn"),
                Err(EnrichError::Busy(_))
            ));
            assert_eq!(coordinator.in_flight(), 1);
            coordinator.next().await.unwrap();
            assert_eq!(coordinator.in_flight(), 0);
        }

        #[tokio::test]
        async fn test_manual_edit_during_fetch_wins() {
            let mut session = filled_session();
            let mut coordinator =
                Coordinator::new(api_returning(dependent(&[("patient_name", json!("Ada"))])), 5);

            coordinator.trigger(&session, "p", "mrn").unwrap();
            session.set_text("p", "name", "Grace").unwrap();

            let completion = coordinator.next().await.unwrap();
            let applied = apply_completion(&mut session, completion);

            assert_eq!(session.store().get("patient_name"), Some(&AnswerValue::text("Grace")));
            assert_eq!(
                applied.merge.map(|m| m.skipped),
                Some(vec![FieldKey::from("patient_name")])
            );
        }

        #[tokio::test]
        async fn test_failure_posts_notice_and_keeps_answers() {
            let mut api = MockFormApi::new();
            api.expect_fetch_history()
                .returning(|_, _, _| Err(anyhow!("connection refused")));
            let mut session = filled_session();
            let before = session.store().state().clone();
            let mut coordinator = Coordinator::new(Arc::new(api), 5);

            coordinator.trigger(&session, "p", "mrn").unwrap();
            let completion = coordinator.next().await.unwrap();
            let applied = apply_completion(&mut session, completion);

            assert_eq!(applied, Applied::default());
            assert_eq!(session.store().state(), &before);
            assert_eq!(
                session.latest_notice().map(|n| n.message.as_str()),
                Some("Fetch failed")
            );
            assert!(!coordinator.is_busy("p.mrn"));
        }
    }
}
