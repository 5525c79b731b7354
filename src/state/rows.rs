//! Repeatable-section row operations
//!
//! Rows are composed and edited through the store's draft buffer. The manager
//! tracks whether a row is being edited and which deletion awaits
//! confirmation; the data changes themselves are single store operations.

use super::binding::resolve_key;
use super::store::{AnswerStore, Row};
use super::value::AnswerValue;
use crate::schema::Section;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("section {0} is not repeatable")]
    NotRepeatable(String),

    #[error("row {index} out of range for section {section} ({len} rows)")]
    IndexOutOfRange {
        section: String,
        index: usize,
        len: usize,
    },

    #[error("row {index} of section {section} is being edited")]
    EditInProgress { section: String, index: usize },

    #[error("no row is being edited")]
    NotEditing,

    #[error("no row deletion is awaiting confirmation")]
    NoPendingDelete,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RowMode {
    /// Draft buffer composes a new row
    #[default]
    Idle,
    Editing { section: String, index: usize },
}

/// Completed row operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowEvent {
    Added,
    Updated,
    Deleted,
    Moved,
}

impl RowEvent {
    pub fn message(self) -> &'static str {
        match self {
            RowEvent::Added => "Row added",
            RowEvent::Updated => "Row updated",
            RowEvent::Deleted => "Row deleted",
            RowEvent::Moved => "Row moved",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RowManager {
    mode: RowMode,
    pending_delete: Option<(String, usize)>,
}

impl RowManager {
    #[cfg(test)]
    pub fn mode(&self) -> &RowMode {
        &self.mode
    }

    pub fn pending_delete(&self) -> Option<(&str, usize)> {
        self.pending_delete
            .as_ref()
            .map(|(section, index)| (section.as_str(), *index))
    }

    /// Index of the row being edited in `section_id`, if any
    pub fn editing_index(&self, section_id: &str) -> Option<usize> {
        match &self.mode {
            RowMode::Editing { section, index } if section == section_id => Some(*index),
            _ => None,
        }
    }

    fn ensure_idle(&self) -> Result<(), RowError> {
        match &self.mode {
            RowMode::Idle => Ok(()),
            RowMode::Editing { section, index } => Err(RowError::EditInProgress {
                section: section.clone(),
                index: *index,
            }),
        }
    }

    /// Build a row from the draft, falling back to the flat map, and append it
    pub fn add_row(&mut self, store: &mut AnswerStore, section: &Section) -> Result<RowEvent, RowError> {
        ensure_repeatable(section)?;
        self.ensure_idle()?;

        let row: Row = section
            .questions
            .iter()
            .map(|q| {
                let key = resolve_key(&section.id, q);
                let value = store
                    .draft(key.as_str())
                    .filter(|v| !v.is_empty())
                    .or_else(|| store.get(key.as_str()))
                    .cloned()
                    .unwrap_or_default();
                (q.id.clone(), value)
            })
            .collect();

        store.commit_row(section, row);
        tracing::debug!(section = %section.id, rows = store.rows(&section.id).len(), "Row added");
        Ok(RowEvent::Added)
    }

    /// Load row `index` into the draft buffer
    pub fn begin_edit(&mut self, store: &mut AnswerStore, section: &Section, index: usize) -> Result<(), RowError> {
        ensure_repeatable(section)?;
        self.ensure_idle()?;

        let rows = store.rows(&section.id);
        let row = rows.get(index).ok_or_else(|| RowError::IndexOutOfRange {
            section: section.id.clone(),
            index,
            len: rows.len(),
        })?;
        let values = section
            .questions
            .iter()
            .map(|q| {
                let value = row.get(&q.id).cloned().unwrap_or_default();
                (resolve_key(&section.id, q), value)
            })
            .collect();

        store.load_draft(values);
        self.mode = RowMode::Editing {
            section: section.id.clone(),
            index,
        };
        Ok(())
    }

    /// Replace the edited row with the draft. Keys missing from the draft save as empty.
    pub fn save_edit(&mut self, store: &mut AnswerStore, section: &Section) -> Result<RowEvent, RowError> {
        let index = self.editing_index(&section.id).ok_or(RowError::NotEditing)?;

        let row: Row = section
            .questions
            .iter()
            .map(|q| {
                let key = resolve_key(&section.id, q);
                let value = store.draft(key.as_str()).cloned().unwrap_or(AnswerValue::Empty);
                (q.id.clone(), value)
            })
            .collect();

        store.replace_row(section, index, row)?;
        self.mode = RowMode::Idle;
        Ok(RowEvent::Updated)
    }

    pub fn cancel_edit(&mut self, store: &mut AnswerStore, section: &Section) -> Result<(), RowError> {
        self.editing_index(&section.id).ok_or(RowError::NotEditing)?;
        let keys: Vec<_> = section
            .questions
            .iter()
            .map(|q| resolve_key(&section.id, q))
            .collect();
        store.clear_draft(&keys);
        self.mode = RowMode::Idle;
        Ok(())
    }

    /// First step of deletion: remember the target until confirmed
    pub fn request_delete(&mut self, store: &AnswerStore, section: &Section, index: usize) -> Result<(), RowError> {
        ensure_repeatable(section)?;
        self.ensure_idle()?;
        let len = store.rows(&section.id).len();
        if index >= len {
            return Err(RowError::IndexOutOfRange {
                section: section.id.clone(),
                index,
                len,
            });
        }
        self.pending_delete = Some((section.id.clone(), index));
        Ok(())
    }

    pub fn confirm_delete(&mut self, store: &mut AnswerStore) -> Result<RowEvent, RowError> {
        let (section, index) = self.pending_delete.take().ok_or(RowError::NoPendingDelete)?;
        store.remove_row(&section, index)?;
        tracing::debug!(section = %section, index, "Row deleted");
        Ok(RowEvent::Deleted)
    }

    pub fn cancel_delete(&mut self) {
        self.pending_delete = None;
    }

    pub fn move_row(
        &mut self,
        store: &mut AnswerStore,
        section: &Section,
        from: usize,
        to: usize,
    ) -> Result<RowEvent, RowError> {
        ensure_repeatable(section)?;
        self.ensure_idle()?;
        store.move_row(&section.id, from, to)?;
        Ok(RowEvent::Moved)
    }

    pub fn reset(&mut self) {
        self.mode = RowMode::Idle;
        self.pending_delete = None;
    }
}

fn ensure_repeatable(section: &Section) -> Result<(), RowError> {
    if section.is_repeatable {
        Ok(())
    } else {
        Err(RowError::NotRepeatable(section.id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::*;
    use crate::schema::Version;
    use crate::state::store::Origin;
    use crate::state::FieldKey;

    fn meds() -> Section {
        let mut dose = text("dose");
        dose.meta.variable_name = Some("med_dose".to_string());
        repeatable("meds", vec![text("drug"), dose])
    }

    fn setup() -> (AnswerStore, RowManager, Section) {
        let section = meds();
        let version = Version {
            sections: vec![section.clone()],
        };
        (AnswerStore::new(&version), RowManager::default(), section)
    }

    fn type_row(store: &mut AnswerStore, drug: &str, dose: &str) {
        store.set_draft(&FieldKey::from("meds.drug"), AnswerValue::text(drug), Origin::User);
        store.set_draft(&FieldKey::from("med_dose"), AnswerValue::text(dose), Origin::User);
    }

    fn add(store: &mut AnswerStore, rows: &mut RowManager, section: &Section, drug: &str) {
        type_row(store, drug, "1");
        rows.add_row(store, section).unwrap();
    }

    fn drugs(store: &AnswerStore) -> Vec<String> {
        store
            .rows("meds")
            .iter()
            .map(|r| r["drug"].as_text())
            .collect()
    }

    mod add {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_add_row_keys_by_question_id() {
            let (mut store, mut rows, section) = setup();
            type_row(&mut store, "aspirin", "100mg");

            assert_eq!(rows.add_row(&mut store, &section), Ok(RowEvent::Added));

            let row = &store.rows("meds")[0];
            assert_eq!(row["drug"], AnswerValue::text("aspirin"));
            assert_eq!(row["dose"], AnswerValue::text("100mg"));
        }

        #[test]
        fn test_add_row_clears_draft_keys() {
            let (mut store, mut rows, section) = setup();
            type_row(&mut store, "aspirin", "100mg");
            rows.add_row(&mut store, &section).unwrap();
            assert!(store.draft("meds.drug").is_none());
            assert!(store.draft("med_dose").is_none());
            assert!(!store.has_draft());
        }

        #[test]
        fn test_add_row_falls_back_to_flat_map() {
            let (mut store, mut rows, section) = setup();
            store.merge_remote(vec![(FieldKey::from("med_dose"), AnswerValue::text("5mg"))], 0);
            store.set_draft(&FieldKey::from("meds.drug"), AnswerValue::text("x"), Origin::User);
            rows.add_row(&mut store, &section).unwrap();
            assert_eq!(store.rows("meds")[0]["dose"], AnswerValue::text("5mg"));
            assert!(store.get("med_dose").is_none());
        }

        #[test]
        fn test_blank_draft_falls_through_to_flat_map() {
            let (mut store, mut rows, section) = setup();
            store.merge_remote(vec![(FieldKey::from("med_dose"), AnswerValue::text("5mg"))], 0);
            type_row(&mut store, "x", "");
            assert_eq!(store.draft("med_dose"), Some(&AnswerValue::Empty));
            rows.add_row(&mut store, &section).unwrap();
            assert_eq!(store.rows("meds")[0]["dose"], AnswerValue::text("5mg"));
        }

        #[test]
        fn test_add_row_appends_in_order() {
            let (mut store, mut rows, section) = setup();
            for drug in ["A", "B", "C"] {
                add(&mut store, &mut rows, &section, drug);
            }
            assert_eq!(drugs(&store), vec!["A", "B", "C"]);
        }

        #[test]
        fn test_add_to_simple_section_is_error() {
            let (mut store, mut rows, _) = setup();
            let simple = section("s", vec![text("q")]);
            assert_eq!(
                rows.add_row(&mut store, &simple),
                Err(RowError::NotRepeatable("s".to_string()))
            );
        }
    }

    mod edit {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_edit_loads_draft_under_resolved_keys() {
            let (mut store, mut rows, section) = setup();
            add(&mut store, &mut rows, &section, "A");
            rows.begin_edit(&mut store, &section, 0).unwrap();
            assert_eq!(store.draft("meds.drug"), Some(&AnswerValue::text("A")));
            assert_eq!(store.draft("med_dose"), Some(&AnswerValue::text("1")));
            assert_eq!(rows.editing_index("meds"), Some(0));
        }

        #[test]
        fn test_save_replaces_only_edited_row() {
            let (mut store, mut rows, section) = setup();
            for drug in ["A", "B", "C"] {
                add(&mut store, &mut rows, &section, drug);
            }
            let before = store.rows("meds").to_vec();

            rows.begin_edit(&mut store, &section, 1).unwrap();
            store.set_draft(&FieldKey::from("meds.drug"), AnswerValue::text("B2"), Origin::User);
            assert_eq!(rows.save_edit(&mut store, &section), Ok(RowEvent::Updated));

            let after = store.rows("meds");
            assert_eq!(after[0], before[0]);
            assert_eq!(after[2], before[2]);
            assert_eq!(after[1]["drug"], AnswerValue::text("B2"));
            assert_eq!(rows.mode(), &RowMode::Idle);
        }

        #[test]
        fn test_save_uses_only_draft_values() {
            let (mut store, mut rows, section) = setup();
            add(&mut store, &mut rows, &section, "A");
            rows.begin_edit(&mut store, &section, 0).unwrap();
            store.clear_draft(&[FieldKey::from("med_dose")]);
            rows.save_edit(&mut store, &section).unwrap();
            assert_eq!(store.rows("meds")[0]["dose"], AnswerValue::Empty);
        }

        #[test]
        fn test_cancel_keeps_row_and_clears_draft() {
            let (mut store, mut rows, section) = setup();
            add(&mut store, &mut rows, &section, "A");
            rows.begin_edit(&mut store, &section, 0).unwrap();
            store.set_draft(&FieldKey::from("meds.drug"), AnswerValue::text("Z"), Origin::User);
            rows.cancel_edit(&mut store, &section).unwrap();
            assert_eq!(drugs(&store), vec!["A"]);
            assert!(!store.has_draft());
        }

        #[test]
        fn test_add_while_editing_is_rejected() {
            let (mut store, mut rows, section) = setup();
            add(&mut store, &mut rows, &section, "A");
            rows.begin_edit(&mut store, &section, 0).unwrap();
            assert!(matches!(
                rows.add_row(&mut store, &section),
                Err(RowError::EditInProgress { index: 0, .. })
            ));
        }

        #[test]
        fn test_save_without_edit_is_error() {
            let (mut store, mut rows, section) = setup();
            assert_eq!(rows.save_edit(&mut store, &section), Err(RowError::NotEditing));
        }

        #[test]
        fn test_edit_out_of_range() {
            let (mut store, mut rows, section) = setup();
            assert!(matches!(
                rows.begin_edit(&mut store, &section, 0),
                Err(RowError::IndexOutOfRange { len: 0, .. })
            ));
            assert_eq!(rows.mode(), &RowMode::Idle);
        }
    }

    mod delete {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_delete_requires_confirmation() {
            let (mut store, mut rows, section) = setup();
            for drug in ["A", "B", "C"] {
                add(&mut store, &mut rows, &section, drug);
            }
            rows.request_delete(&store, &section, 0).unwrap();
            assert_eq!(drugs(&store).len(), 3);
            assert_eq!(rows.pending_delete(), Some(("meds", 0)));

            assert_eq!(rows.confirm_delete(&mut store), Ok(RowEvent::Deleted));
            assert_eq!(drugs(&store), vec!["B", "C"]);
            assert_eq!(rows.pending_delete(), None);
        }

        #[test]
        fn test_cancel_delete_keeps_rows() {
            let (mut store, mut rows, section) = setup();
            add(&mut store, &mut rows, &section, "A");
            rows.request_delete(&store, &section, 0).unwrap();
            rows.cancel_delete();
            assert_eq!(rows.confirm_delete(&mut store), Err(RowError::NoPendingDelete));
            assert_eq!(drugs(&store), vec!["A"]);
        }
    }

    mod reorder {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_move_first_to_last() {
            let (mut store, mut rows, section) = setup();
            for drug in ["A", "B", "C"] {
                add(&mut store, &mut rows, &section, drug);
            }
            assert_eq!(rows.move_row(&mut store, &section, 0, 2), Ok(RowEvent::Moved));
            assert_eq!(drugs(&store), vec!["B", "C", "A"]);
        }

        #[test]
        fn test_move_out_of_range_leaves_rows() {
            let (mut store, mut rows, section) = setup();
            add(&mut store, &mut rows, &section, "A");
            assert!(rows.move_row(&mut store, &section, 0, 5).is_err());
            assert_eq!(drugs(&store), vec!["A"]);
        }
    }
}
