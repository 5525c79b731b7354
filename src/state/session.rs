//! Form editing session
//!
//! One session owns the loaded form, its Answer State and the row manager.
//! Every user input is shape-checked against the question's field kind and
//! followed by a recompute of calculated values.

use super::binding::FieldKey;
use super::codec::{self, CodecError};
use super::rows::{RowError, RowEvent, RowManager};
use super::store::{AnswerStore, MergeReport, Origin};
use super::value::AnswerValue;
use crate::expr::evaluate_calculated;
use crate::schema::{FieldKind, Form, Question, Section, Version};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How long a transient notice stays visible
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("unknown section {0}")]
    UnknownSection(String),

    #[error("unknown question {question} in section {section}")]
    UnknownQuestion { section: String, question: String },

    #[error("question {question} is a {kind} field")]
    WrongShape { question: String, kind: &'static str },

    #[error("'{value}' is not an option of question {question}")]
    UnknownOption { question: String, value: String },

    #[error(transparent)]
    Row(#[from] RowError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub posted_at: Instant,
}

impl Notice {
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.posted_at) >= NOTICE_TTL
    }
}

#[derive(Debug)]
pub struct FormSession {
    form: Form,
    store: AnswerStore,
    rows: RowManager,
    /// Keys the user typed into; their calculated values are never recomputed
    manual: HashSet<FieldKey>,
    notices: Vec<Notice>,
}

fn locate<'a>(form: &'a Form, section_id: &str, question_id: &str) -> Result<(&'a Section, &'a Question), SessionError> {
    let section = form
        .latest()
        .section(section_id)
        .ok_or_else(|| SessionError::UnknownSection(section_id.to_string()))?;
    let question = section
        .question(question_id)
        .ok_or_else(|| SessionError::UnknownQuestion {
            section: section_id.to_string(),
            question: question_id.to_string(),
        })?;
    Ok((section, question))
}

fn locate_section<'a>(form: &'a Form, section_id: &str) -> Result<&'a Section, SessionError> {
    form.latest()
        .section(section_id)
        .ok_or_else(|| SessionError::UnknownSection(section_id.to_string()))
}

fn check_option(question: &Question, value: &str) -> Result<(), SessionError> {
    if question.kind.label_for(value).is_some() {
        Ok(())
    } else {
        Err(SessionError::UnknownOption {
            question: question.id.clone(),
            value: value.to_string(),
        })
    }
}

impl FormSession {
    pub fn new(form: Form) -> Self {
        let store = AnswerStore::new(form.latest());
        let mut session = Self {
            form,
            store,
            rows: RowManager::default(),
            manual: HashSet::new(),
            notices: Vec::new(),
        };
        session.recompute_calculated();
        session
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn version(&self) -> &Version {
        self.form.latest()
    }

    pub fn store(&self) -> &AnswerStore {
        &self.store
    }

    pub fn rows(&self) -> &RowManager {
        &self.rows
    }

    /// Current input value. Repeatable sections read the draft first, then the
    /// flat map where calculated values live.
    pub fn value(&self, section: &Section, question: &Question) -> AnswerValue {
        let key = question.field_key(&section.id);
        let value = if section.is_repeatable {
            self.store.draft(key.as_str()).or_else(|| self.store.get(key.as_str()))
        } else {
            self.store.get(key.as_str())
        };
        value.cloned().unwrap_or_default()
    }

    #[cfg(test)]
    pub fn is_manual(&self, key: &str) -> bool {
        self.manual.contains(key)
    }

    /// Replace a text field's content
    pub fn set_text(&mut self, section_id: &str, question_id: &str, text: &str) -> Result<(), SessionError> {
        let (section, question) = locate(&self.form, section_id, question_id)?;
        if !question.kind.is_text() {
            return Err(SessionError::WrongShape {
                question: question.id.clone(),
                kind: question.kind.tag(),
            });
        }
        let key = question.field_key(&section.id);
        self.write_user_value(section.is_repeatable, key, AnswerValue::text(text));
        Ok(())
    }

    /// Pick the single option of a select or radio field
    pub fn select_option(&mut self, section_id: &str, question_id: &str, value: &str) -> Result<(), SessionError> {
        let (section, question) = locate(&self.form, section_id, question_id)?;
        if !matches!(
            question.kind,
            FieldKind::SingleSelect { .. } | FieldKind::SingleChoice { .. }
        ) {
            return Err(SessionError::WrongShape {
                question: question.id.clone(),
                kind: question.kind.tag(),
            });
        }
        check_option(question, value)?;
        let key = question.field_key(&section.id);
        self.write_user_value(section.is_repeatable, key, AnswerValue::text(value));
        Ok(())
    }

    /// Add or remove one option of a multi-choice field, keeping option order
    pub fn toggle_option(&mut self, section_id: &str, question_id: &str, value: &str) -> Result<(), SessionError> {
        let (section, question) = locate(&self.form, section_id, question_id)?;
        if !question.kind.is_multi() {
            return Err(SessionError::WrongShape {
                question: question.id.clone(),
                kind: question.kind.tag(),
            });
        }
        check_option(question, value)?;

        let current = self.value(section, question);
        let mut selected: Vec<String> = current.as_choices().to_vec();
        if let Some(pos) = selected.iter().position(|v| v == value) {
            selected.remove(pos);
        } else {
            selected.push(value.to_string());
            let order: Vec<&str> = question.kind.options().iter().map(|o| o.value.as_str()).collect();
            selected.sort_by_key(|v| order.iter().position(|o| o == v));
        }

        let key = question.field_key(&section.id);
        self.write_user_value(section.is_repeatable, key, AnswerValue::Choices(selected));
        Ok(())
    }

    pub fn clear_field(&mut self, section_id: &str, question_id: &str) -> Result<(), SessionError> {
        let (section, question) = locate(&self.form, section_id, question_id)?;
        let empty = if question.kind.is_multi() {
            AnswerValue::Choices(Vec::new())
        } else {
            AnswerValue::Empty
        };
        let key = question.field_key(&section.id);
        self.write_user_value(section.is_repeatable, key, empty);
        Ok(())
    }

    fn write_user_value(&mut self, in_draft: bool, key: FieldKey, value: AnswerValue) {
        if in_draft {
            self.store.set_draft(&key, value, Origin::User);
        } else {
            self.store.set_scalar(&key, value, Origin::User);
        }
        self.manual.insert(key);
        self.recompute_calculated();
    }

    /// Re-evaluate calculated values until nothing changes.
    ///
    /// Bounded by the number of calculated questions plus one pass; a cycle
    /// that never settles is logged and left as is. Returns the number of writes.
    pub fn recompute_calculated(&mut self) -> usize {
        let targets: Vec<(&Section, &Question)> = self
            .form
            .latest()
            .questions()
            .filter(|(_, q)| q.calculated.is_some())
            .collect();

        let mut writes = 0;
        for _ in 0..=targets.len() {
            let mut changed = false;
            for (section, question) in &targets {
                let key = question.field_key(&section.id);
                if self.manual.contains(&key) {
                    continue;
                }
                let Some(expression) = &question.calculated else {
                    continue;
                };
                let Some(value) = evaluate_calculated(expression, &self.store.scope()) else {
                    continue;
                };
                if !question.kind.accepts(&value) {
                    tracing::debug!(key = %key, "Calculated value does not fit field kind");
                    continue;
                }

                // Calculated values always land in the flat map; adding a row
                // falls back to it for keys the draft lacks.
                if self.store.get(key.as_str()).cloned().unwrap_or_default() == value {
                    continue;
                }
                self.store.set_scalar(&key, value, Origin::Calculated);
                changed = true;
                writes += 1;
            }
            if !changed {
                return writes;
            }
        }
        tracing::warn!(writes, "Calculated values did not settle");
        writes
    }

    /// Merge remote enrichment data dispatched at revision `since`
    pub fn apply_remote(&mut self, values: Vec<(FieldKey, AnswerValue)>, since: u64) -> MergeReport {
        let report = self.store.merge_remote(values, since);
        if !report.skipped.is_empty() {
            tracing::warn!(skipped = ?report.skipped, "Kept manual edits made during fetch");
        }
        self.recompute_calculated();
        report
    }

    pub fn add_row(&mut self, section_id: &str) -> Result<(), SessionError> {
        let section = locate_section(&self.form, section_id)?;
        let event = self.rows.add_row(&mut self.store, section)?;
        self.after_row_event(event);
        Ok(())
    }

    pub fn begin_edit(&mut self, section_id: &str, index: usize) -> Result<(), SessionError> {
        let section = locate_section(&self.form, section_id)?;
        self.rows.begin_edit(&mut self.store, section, index)?;
        Ok(())
    }

    pub fn save_edit(&mut self, section_id: &str) -> Result<(), SessionError> {
        let section = locate_section(&self.form, section_id)?;
        let event = self.rows.save_edit(&mut self.store, section)?;
        self.after_row_event(event);
        Ok(())
    }

    pub fn cancel_edit(&mut self, section_id: &str) -> Result<(), SessionError> {
        let section = locate_section(&self.form, section_id)?;
        self.rows.cancel_edit(&mut self.store, section)?;
        self.recompute_calculated();
        Ok(())
    }

    pub fn request_delete(&mut self, section_id: &str, index: usize) -> Result<(), SessionError> {
        let section = locate_section(&self.form, section_id)?;
        self.rows.request_delete(&self.store, section, index)?;
        Ok(())
    }

    pub fn confirm_delete(&mut self) -> Result<(), SessionError> {
        let event = self.rows.confirm_delete(&mut self.store)?;
        self.after_row_event(event);
        Ok(())
    }

    pub fn cancel_delete(&mut self) {
        self.rows.cancel_delete();
    }

    pub fn move_row(&mut self, section_id: &str, from: usize, to: usize) -> Result<(), SessionError> {
        let section = locate_section(&self.form, section_id)?;
        self.rows.move_row(&mut self.store, section, from, to)?;
        self.recompute_calculated();
        Ok(())
    }

    fn after_row_event(&mut self, event: RowEvent) {
        self.recompute_calculated();
        self.notify(NoticeKind::Success, event.message());
    }

    /// Nested submission payload for the current answers
    pub fn submission_payload(&self) -> Result<serde_json::Value, SessionError> {
        Ok(codec::encode(self.store.state(), self.form.latest())?)
    }

    /// A submit was acknowledged: start over with empty answers
    pub fn submit_succeeded(&mut self) {
        self.store.reset(self.form.latest());
        self.rows.reset();
        self.manual.clear();
        self.recompute_calculated();
        self.notify(NoticeKind::Success, "Submitted, thanks!");
    }

    /// A submit failed: answers are kept for a retry
    pub fn submit_failed(&mut self) {
        self.notify(NoticeKind::Failure, "Submit failed, please retry.");
    }

    pub fn notify(&mut self, kind: NoticeKind, message: impl Into<String>) {
        self.notices.push(Notice {
            kind,
            message: message.into(),
            posted_at: Instant::now(),
        });
    }

    /// Drop notices older than the display window
    pub fn prune_notices(&mut self, now: Instant) {
        self.notices.retain(|n| !n.is_expired(now));
    }

    /// Newest live notice
    pub fn latest_notice(&self) -> Option<&Notice> {
        self.notices.last()
    }

    #[cfg(test)]
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }
}
