//! Render engine
//!
//! Decides which questions are visible, arranges them per section layout and
//! builds view models. Editable forms and read-only previews go through the
//! same [`render_version`] so visibility and layout never diverge.

mod layout;
mod widget;

pub use layout::{plan_section, Arrangement};
pub use widget::{display_value, field_view, table_view, widget_for, FieldView, RenderMode, TableView, WidgetSpec};

use crate::expr::Scope;
use crate::schema::{Question, Section, Version};
use crate::state::{AnswerState, AnswerValue, FormSession, Row};

/// Answers a renderer reads from
pub trait AnswerSource: Scope {
    fn field_value(&self, section: &Section, question: &Question) -> AnswerValue;

    fn rows(&self, section_id: &str) -> &[Row];

    fn editing_row(&self, _section_id: &str) -> Option<usize> {
        None
    }
}

impl Scope for FormSession {
    fn lookup(&self, name: &str) -> Option<&AnswerValue> {
        let store = self.store();
        store.draft(name).or_else(|| store.get(name))
    }
}

impl AnswerSource for FormSession {
    fn field_value(&self, section: &Section, question: &Question) -> AnswerValue {
        self.value(section, question)
    }

    fn rows(&self, section_id: &str) -> &[Row] {
        self.store().rows(section_id)
    }

    fn editing_row(&self, section_id: &str) -> Option<usize> {
        FormSession::rows(self).editing_index(section_id)
    }
}

impl AnswerSource for AnswerState {
    fn field_value(&self, section: &Section, question: &Question) -> AnswerValue {
        self.simple
            .get(question.field_key(&section.id).as_str())
            .cloned()
            .unwrap_or_default()
    }

    fn rows(&self, section_id: &str) -> &[Row] {
        AnswerState::rows(self, section_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub repeatable: bool,
    pub fields: Arrangement<FieldView>,
    pub table: Option<TableView>,
}

/// Build the view of every section of a version
pub fn render_version<S: AnswerSource>(version: &Version, source: &S, mode: RenderMode) -> Vec<SectionView> {
    version
        .sections
        .iter()
        .map(|section| render_section(section, source, mode))
        .collect()
}

pub fn render_section<S: AnswerSource>(section: &Section, source: &S, mode: RenderMode) -> SectionView {
    // Previews show committed rows only, not the row inputs
    let fields = if section.is_repeatable && mode == RenderMode::Preview {
        Arrangement::Linear(Vec::new())
    } else {
        plan_section(section, source).map(|q| field_view(section, q, source.field_value(section, q)))
    };
    let table = section.is_repeatable.then(|| {
        table_view(
            section,
            source.rows(&section.id),
            source.editing_row(&section.id),
            mode,
        )
    });
    SectionView {
        id: section.id.clone(),
        title: section.title.clone(),
        description: section.description.clone(),
        repeatable: section.is_repeatable,
        fields,
        table,
    }
}
