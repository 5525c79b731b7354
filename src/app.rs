//! Application state and core logic

use crate::api::{FormApi, HistoryEntry, StoredResponse};
use crate::config::ClientConfig;
use crate::enrich::{apply_completion, Coordinator, EnrichError};
use crate::render::{display_value, render_version, widget_for, RenderMode, SectionView};
use crate::schema::{FieldKind, Version};
use crate::state::{codec, AnswerState, FormSession, NoticeKind};
use anyhow::Result;
use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Top-level screens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Loading,
    /// Schema could not be loaded; carries the reason
    LoadFailed(String),
    Form,
    Preview,
    Responses,
}

/// Something in the form view that can hold keyboard focus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Field { section_id: String, question_id: String },
    Table { section_id: String },
    History,
}

/// Result of the latest history lookup
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPanel {
    pub question_label: String,
    pub value: String,
    pub entries: Vec<HistoryEntry>,
    pub selected: usize,
}

/// Read-only rendering of a set of answers
#[derive(Debug, Clone)]
pub struct PreviewState {
    pub title: String,
    pub sections: Vec<SectionView>,
    pub payload: serde_json::Value,
    pub scroll: u16,
    /// View to return to on Esc
    pub back: View,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRow {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
    pub cells: Vec<String>,
}

/// All stored responses, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct ResponsesListing {
    pub columns: Vec<String>,
    pub rows: Vec<ResponseRow>,
    pub selected: usize,
}

/// How a focused field takes input
enum InputKind {
    Text { multiline: bool },
    Single(Vec<String>),
    Multi(Vec<String>),
}

/// Main application struct
pub struct App {
    api: Arc<dyn FormApi>,
    pub config: ClientConfig,
    pub form_id: Uuid,
    pub view: View,
    pub session: Option<FormSession>,
    coordinator: Coordinator,
    /// Index into [`App::targets`]
    pub focus: usize,
    /// Highlighted option of a focused choice field
    pub option_cursor: usize,
    /// Highlighted row of a focused table
    pub table_row: usize,
    pub history: Option<HistoryPanel>,
    pub preview: Option<PreviewState>,
    pub responses: Option<ResponsesListing>,
    /// Delete option highlighted in the confirm dialog
    pub delete_selected: bool,
    errors: VecDeque<String>,
    /// Copy feedback message
    pub copy_message: Option<String>,
    quit: bool,
}

impl App {
    pub fn new(api: Arc<dyn FormApi>, config: ClientConfig, form_id: Uuid) -> Self {
        let coordinator = Coordinator::new(Arc::clone(&api), config.history_limit);
        Self {
            api,
            config,
            form_id,
            view: View::Loading,
            session: None,
            coordinator,
            focus: 0,
            option_cursor: 0,
            table_row: 0,
            history: None,
            preview: None,
            responses: None,
            delete_selected: false,
            errors: VecDeque::new(),
            copy_message: None,
            quit: false,
        }
    }

    /// Fetch the schema and start a session
    pub async fn load_form(&mut self) {
        self.view = View::Loading;
        match self.api.fetch_form_schema(self.form_id).await {
            Ok(form) => {
                tracing::info!(form = %form.id, title = %form.title, "Form loaded");
                self.session = Some(FormSession::new(form));
                self.focus = 0;
                self.option_cursor = 0;
                self.history = None;
                self.view = View::Form;
            }
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "Could not load form");
                self.session = None;
                self.view = View::LoadFailed(format!(
                    "Could not load form from {}: {err:#}",
                    self.config.api_base_url
                ));
            }
        }
    }

    /// Check if app should quit
    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Push an error message to the error queue for display
    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push_back(message.into());
    }

    pub fn current_error(&self) -> Option<&str> {
        self.errors.front().map(String::as_str)
    }

    fn dismiss_error(&mut self) {
        self.errors.pop_front();
    }

    pub fn fetches_in_flight(&self) -> usize {
        self.coordinator.in_flight()
    }

    pub fn is_fetching(&self, key: &str) -> bool {
        self.coordinator.is_busy(key)
    }

    /// Apply finished fetches and expire old notices
    pub fn tick(&mut self) {
        while let Some(completion) = self.coordinator.try_next() {
            let Some(session) = self.session.as_mut() else {
                continue;
            };
            let question_label = session
                .version()
                .section(&completion.request.section_id)
                .and_then(|s| s.question(&completion.request.question_id))
                .map(|q| q.label.clone())
                .unwrap_or_default();
            let value = completion.request.value.clone();
            let applied = apply_completion(session, completion);
            if let Some(report) = &applied.merge {
                tracing::debug!(applied = report.applied.len(), skipped = report.skipped.len(), "Lookup merged");
            }
            if let Some(entries) = applied.history {
                self.history = Some(HistoryPanel {
                    question_label,
                    value,
                    entries,
                    selected: 0,
                });
            }
        }
        if let Some(session) = self.session.as_mut() {
            session.prune_notices(Instant::now());
        }
    }

    /// Sections of the editable form
    pub fn form_sections(&self) -> Vec<SectionView> {
        match &self.session {
            Some(session) => render_version(session.version(), session, RenderMode::Edit),
            None => Vec::new(),
        }
    }

    /// Focusable items in display order
    pub fn targets(&self) -> Vec<Target> {
        let mut targets = Vec::new();
        for section in self.form_sections() {
            let has_table = section.table.is_some();
            for field in section.fields.into_display_order() {
                targets.push(Target::Field {
                    section_id: field.section_id,
                    question_id: field.question_id,
                });
            }
            if has_table {
                targets.push(Target::Table {
                    section_id: section.id,
                });
            }
        }
        if self.history.is_some() {
            targets.push(Target::History);
        }
        targets
    }

    pub fn focused(&self) -> Option<Target> {
        let targets = self.targets();
        let index = self.focus.min(targets.len().saturating_sub(1));
        targets.into_iter().nth(index)
    }

    fn move_focus(&mut self, forward: bool) {
        let count = self.targets().len();
        if count == 0 {
            return;
        }
        let current = self.focus.min(count - 1);
        self.focus = if forward {
            (current + 1) % count
        } else if current == 0 {
            count - 1
        } else {
            current - 1
        };
        self.option_cursor = 0;
        self.table_row = 0;
    }

    /// Handle a key event
    pub async fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        // Error dialog is modal
        if self.current_error().is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                self.dismiss_error();
            }
            return Ok(());
        }

        // Delete confirmation is modal
        if self
            .session
            .as_ref()
            .is_some_and(|s| s.rows().pending_delete().is_some())
        {
            self.handle_confirm_delete_key(key);
            return Ok(());
        }

        self.copy_message = None;

        match self.view.clone() {
            View::Loading => {}
            View::LoadFailed(_) => match key.code {
                KeyCode::Char('r') => self.load_form().await,
                KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
                _ => {}
            },
            View::Form => self.handle_form_key(key).await?,
            View::Preview => self.handle_preview_key(key),
            View::Responses => self.handle_responses_key(key).await,
        }
        Ok(())
    }

    async fn handle_form_key(&mut self, key: KeyEvent) -> Result<()> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Tab => {
                self.move_focus(true);
                return Ok(());
            }
            KeyCode::BackTab => {
                self.move_focus(false);
                return Ok(());
            }
            KeyCode::Char('s') if ctrl => {
                self.submit().await;
                return Ok(());
            }
            KeyCode::Char('p') if ctrl => {
                self.open_form_preview();
                return Ok(());
            }
            KeyCode::Char('l') if ctrl => {
                self.open_responses().await;
                return Ok(());
            }
            _ => {}
        }

        match self.focused() {
            Some(Target::Field {
                section_id,
                question_id,
            }) => self.handle_field_key(key, &section_id, &question_id),
            Some(Target::Table { section_id }) => self.handle_table_key(key, &section_id),
            Some(Target::History) => self.handle_history_key(key).await,
            None => {}
        }
        Ok(())
    }

    fn input_kind(&self, section_id: &str, question_id: &str) -> Option<InputKind> {
        let session = self.session.as_ref()?;
        let question = session.version().section(section_id)?.question(question_id)?;
        let values = || question.kind.options().iter().map(|o| o.value.clone()).collect();
        Some(match &question.kind {
            FieldKind::Text => InputKind::Text { multiline: false },
            FieldKind::MultilineText => InputKind::Text { multiline: true },
            FieldKind::SingleSelect { .. } | FieldKind::SingleChoice { .. } => InputKind::Single(values()),
            FieldKind::MultiChoice { .. } => InputKind::Multi(values()),
        })
    }

    fn handle_field_key(&mut self, key: KeyEvent, section_id: &str, question_id: &str) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let Some(kind) = self.input_kind(section_id, question_id) else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let repeatable = session
            .version()
            .section(section_id)
            .is_some_and(|s| s.is_repeatable);

        // Unmet lookup preconditions block until dismissed
        let mut blocking = None;
        let result = match (key.code, &kind) {
            (KeyCode::Char('f'), _) if ctrl => {
                match self.coordinator.trigger(session, section_id, question_id) {
                    Ok(()) => {}
                    Err(err @ (EnrichError::MissingInput | EnrichError::NotFetchable(_))) => {
                        tracing::debug!(section = section_id, question = question_id, error = %err, "Lookup not started");
                        blocking = Some(err.to_string());
                    }
                    Err(err) => session.notify(NoticeKind::Failure, err.to_string()),
                }
                Ok(())
            }
            (KeyCode::Char('a'), _) if ctrl && repeatable => {
                if session.rows().editing_index(section_id).is_some() {
                    session.save_edit(section_id)
                } else {
                    session.add_row(section_id)
                }
            }
            (KeyCode::Esc, _) if repeatable && session.rows().editing_index(section_id).is_some() => {
                session.cancel_edit(section_id)
            }
            (KeyCode::Char(c), InputKind::Text { .. }) if !ctrl => {
                let mut text = session.field_text(section_id, question_id);
                text.push(c);
                session.set_text(section_id, question_id, &text)
            }
            (KeyCode::Enter, InputKind::Text { multiline: true }) => {
                let mut text = session.field_text(section_id, question_id);
                text.push('\n');
                session.set_text(section_id, question_id, &text)
            }
            (KeyCode::Backspace, InputKind::Text { .. }) => {
                let mut text = session.field_text(section_id, question_id);
                text.pop();
                session.set_text(section_id, question_id, &text)
            }
            (KeyCode::Up | KeyCode::Left, InputKind::Single(_) | InputKind::Multi(_)) => {
                self.option_cursor = self.option_cursor.saturating_sub(1);
                Ok(())
            }
            (KeyCode::Down | KeyCode::Right, InputKind::Single(values) | InputKind::Multi(values)) => {
                if self.option_cursor + 1 < values.len() {
                    self.option_cursor += 1;
                }
                Ok(())
            }
            (KeyCode::Char(' ') | KeyCode::Enter, InputKind::Single(values)) => match values.get(self.option_cursor) {
                Some(value) => session.select_option(section_id, question_id, value),
                None => Ok(()),
            },
            (KeyCode::Char(' ') | KeyCode::Enter, InputKind::Multi(values)) => match values.get(self.option_cursor) {
                Some(value) => session.toggle_option(section_id, question_id, value),
                None => Ok(()),
            },
            (KeyCode::Backspace | KeyCode::Delete, _) => session.clear_field(section_id, question_id),
            _ => Ok(()),
        };

        if let Some(message) = blocking {
            self.push_error(message);
        }
        if let Err(err) = result {
            self.push_error(err.to_string());
        }
    }

    fn handle_table_key(&mut self, key: KeyEvent, section_id: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let len = session.store().rows(section_id).len();
        if len == 0 {
            return;
        }
        let row = self.table_row.min(len - 1);

        let result = match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.table_row = row.saturating_sub(1);
                Ok(())
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.table_row = (row + 1).min(len - 1);
                Ok(())
            }
            KeyCode::Char('e') | KeyCode::Enter => session.begin_edit(section_id, row),
            KeyCode::Char('d') => {
                self.delete_selected = false;
                session.request_delete(section_id, row)
            }
            KeyCode::Char('J') if row + 1 < len => session.move_row(section_id, row, row + 1).map(|()| {
                self.table_row = row + 1;
            }),
            KeyCode::Char('K') if row > 0 => session.move_row(section_id, row, row - 1).map(|()| {
                self.table_row = row - 1;
            }),
            _ => Ok(()),
        };

        if let Err(err) = result {
            self.push_error(err.to_string());
        }
    }

    fn handle_confirm_delete_key(&mut self, key: KeyEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Up | KeyCode::Down | KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                self.delete_selected = !self.delete_selected;
            }
            KeyCode::Enter if self.delete_selected => {
                if let Err(err) = session.confirm_delete() {
                    self.push_error(err.to_string());
                }
                self.table_row = self.table_row.saturating_sub(1);
            }
            KeyCode::Enter | KeyCode::Esc => session.cancel_delete(),
            _ => {}
        }
    }

    async fn handle_history_key(&mut self, key: KeyEvent) {
        let Some(panel) = self.history.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => panel.selected = panel.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if panel.selected + 1 < panel.entries.len() {
                    panel.selected += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(entry) = panel.entries.get(panel.selected).cloned() {
                    self.open_response_preview(&entry.id, View::Form).await;
                }
            }
            KeyCode::Esc => {
                self.history = None;
                self.focus = 0;
            }
            _ => {}
        }
    }

    fn handle_preview_key(&mut self, key: KeyEvent) {
        let Some(preview) = self.preview.as_mut() else {
            self.view = View::Form;
            return;
        };
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => preview.scroll = preview.scroll.saturating_add(1),
            KeyCode::Up | KeyCode::Char('k') => preview.scroll = preview.scroll.saturating_sub(1),
            KeyCode::Char('y') => {
                let text = match serde_json::to_string_pretty(&preview.payload) {
                    Ok(text) => text,
                    Err(err) => {
                        self.push_error(format!("Failed to encode payload: {err}"));
                        return;
                    }
                };
                match self.copy_to_clipboard(&text) {
                    Ok(()) => self.copy_message = Some("Payload copied".to_string()),
                    Err(err) => self.push_error(format!("Failed to copy: {err}")),
                }
            }
            KeyCode::Esc | KeyCode::Char('q') => {
                let back = preview.back.clone();
                self.preview = None;
                self.view = back;
            }
            _ => {}
        }
    }

    async fn handle_responses_key(&mut self, key: KeyEvent) {
        let Some(listing) = self.responses.as_mut() else {
            self.view = View::Form;
            return;
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => listing.selected = listing.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if listing.selected + 1 < listing.rows.len() {
                    listing.selected += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(row) = listing.rows.get(listing.selected) {
                    let id = row.id.clone();
                    self.open_response_preview(&id, View::Responses).await;
                }
            }
            KeyCode::Char('r') => self.open_responses().await,
            KeyCode::Esc | KeyCode::Char('q') => self.view = View::Form,
            _ => {}
        }
    }

    /// Submit the current answers
    async fn submit(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let payload = match session.submission_payload() {
            Ok(payload) => payload,
            Err(err) => {
                self.push_error(err.to_string());
                return;
            }
        };
        match self.api.submit_response(self.form_id, payload).await {
            Ok(()) => {
                tracing::info!(form = %self.form_id, "Response submitted");
                session.submit_succeeded();
                self.focus = 0;
                self.option_cursor = 0;
                self.history = None;
            }
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "Submit failed");
                session.submit_failed();
            }
        }
    }

    /// Preview the in-progress answers
    fn open_form_preview(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let payload = match session.submission_payload() {
            Ok(payload) => payload,
            Err(err) => {
                self.push_error(err.to_string());
                return;
            }
        };
        let state = session.store().state();
        self.preview = Some(PreviewState {
            title: format!("Preview: {}", session.form().title),
            sections: render_version(session.version(), state, RenderMode::Preview),
            payload,
            scroll: 0,
            back: View::Form,
        });
        self.view = View::Preview;
    }

    /// Fetch a stored response and show it read-only
    async fn open_response_preview(&mut self, response_id: &str, back: View) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let response = match self.api.fetch_response_by_id(self.form_id, response_id).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(response = response_id, error = %format!("{err:#}"), "Could not load response");
                self.push_error(format!("Could not load response: {err:#}"));
                return;
            }
        };
        let state = match codec::decode(&response.data, session.version()) {
            Ok(state) => state,
            Err(err) => {
                self.push_error(format!("Response {} cannot be shown: {err}", response.id));
                return;
            }
        };
        self.preview = Some(PreviewState {
            title: format!(
                "Response {} ({})",
                response.id,
                response.submitted_at.format("%Y-%m-%d %H:%M")
            ),
            sections: render_version(session.version(), &state, RenderMode::Preview),
            payload: response.data,
            scroll: 0,
            back,
        });
        self.view = View::Preview;
    }

    /// Load every response of the form into the listing
    async fn open_responses(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        match self.api.fetch_all_responses(self.form_id).await {
            Ok(responses) => {
                self.responses = Some(build_listing(session.version(), responses));
                self.view = View::Responses;
            }
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "Could not load responses");
                self.push_error(format!("Could not load responses: {err:#}"));
            }
        }
    }

    fn copy_to_clipboard(&self, text: &str) -> Result<()> {
        use arboard::Clipboard;
        let mut clipboard = Clipboard::new()?;
        clipboard.set_text(text)?;
        Ok(())
    }
}

impl FormSession {
    /// Text content of a field's current value
    fn field_text(&self, section_id: &str, question_id: &str) -> String {
        self.version()
            .section(section_id)
            .and_then(|s| s.question(question_id).map(|q| self.value(s, q).as_text()))
            .unwrap_or_default()
    }
}

/// One row per response with a cell per `visible_header` question
fn build_listing(version: &Version, mut responses: Vec<StoredResponse>) -> ResponsesListing {
    responses.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    let headers: Vec<_> = version.questions().filter(|(_, q)| q.visible_header).collect();

    let rows = responses
        .into_iter()
        .map(|response| {
            let state = codec::decode(&response.data, version).unwrap_or_else(|err| {
                tracing::warn!(response = %response.id, error = %err, "Response does not match schema");
                AnswerState::default()
            });
            let cells = headers
                .iter()
                .map(|(section, question)| {
                    if section.is_repeatable {
                        return format!("{} rows", state.rows(&section.id).len());
                    }
                    let value = state
                        .simple
                        .get(question.field_key(&section.id).as_str())
                        .cloned()
                        .unwrap_or_default();
                    display_value(&widget_for(&question.kind, &value), &value, RenderMode::Preview)
                })
                .collect();
            ResponseRow {
                id: response.id,
                submitted_at: response.submitted_at,
                cells,
            }
        })
        .collect();

    ResponsesListing {
        columns: headers.iter().map(|(_, q)| q.label.clone()).collect(),
        rows,
        selected: 0,
    }
}
