//! Answer State store
//!
//! Holds the flat answer map for simple sections, the committed row lists of
//! repeatable sections, and the draft buffer used while composing or editing
//! a row. All mutation goes through the small set of methods below so that
//! multi-key updates are applied all together or not at all.

use super::binding::{section_keys, FieldKey};
use super::rows::RowError;
use super::value::AnswerValue;
use crate::expr::Scope;
use crate::schema::{Section, Version};
use std::collections::{BTreeMap, HashMap};

/// One record of a repeatable section, keyed by raw question id
pub type Row = BTreeMap<String, AnswerValue>;

/// The answer data itself, independent of editing bookkeeping
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnswerState {
    /// Resolved field key → answer, for non-repeatable sections
    pub simple: BTreeMap<FieldKey, AnswerValue>,
    /// Section id → committed rows, for repeatable sections
    pub rows: BTreeMap<String, Vec<Row>>,
}

impl AnswerState {
    /// Empty answers for every question of a version
    pub fn for_version(version: &Version) -> Self {
        let mut state = AnswerState::default();
        for section in &version.sections {
            if section.is_repeatable {
                state.rows.insert(section.id.clone(), Vec::new());
            } else {
                for key in section_keys(section) {
                    state.simple.insert(key, AnswerValue::Empty);
                }
            }
        }
        state
    }

    pub fn rows(&self, section_id: &str) -> &[Row] {
        self.rows.get(section_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Scope for AnswerState {
    fn lookup(&self, name: &str) -> Option<&AnswerValue> {
        self.simple.get(name)
    }
}

/// Who caused a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Direct user input; marks the key as manually edited
    User,
    Calculated,
}

/// Outcome of merging remote data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub applied: Vec<FieldKey>,
    /// Keys the user edited after the fetch was dispatched
    pub skipped: Vec<FieldKey>,
}

#[derive(Debug, Clone, Default)]
pub struct AnswerStore {
    state: AnswerState,
    draft: HashMap<FieldKey, AnswerValue>,
    revision: u64,
    /// Revision at which the user last edited each key
    user_edits: HashMap<FieldKey, u64>,
    /// Revision of the last reset; remote data dispatched before it is stale
    reset_revision: u64,
}

impl AnswerStore {
    pub fn new(version: &Version) -> Self {
        Self::from_state(AnswerState::for_version(version))
    }

    pub fn from_state(state: AnswerState) -> Self {
        Self {
            state,
            ..Default::default()
        }
    }

    pub fn state(&self) -> &AnswerState {
        &self.state
    }

    /// Monotonic counter bumped by every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, key: &str) -> Option<&AnswerValue> {
        self.state.simple.get(key)
    }

    pub fn rows(&self, section_id: &str) -> &[Row] {
        self.state.rows(section_id)
    }

    pub fn draft(&self, key: &str) -> Option<&AnswerValue> {
        self.draft.get(key)
    }

    #[cfg(test)]
    pub fn has_draft(&self) -> bool {
        !self.draft.is_empty()
    }

    /// Evaluation scope: draft values shadow the flat map
    pub fn scope(&self) -> LayeredScope<'_> {
        LayeredScope {
            draft: &self.draft,
            simple: &self.state.simple,
        }
    }

    fn bump(&mut self, key: &FieldKey, origin: Origin) {
        self.revision += 1;
        if origin == Origin::User {
            self.user_edits.insert(key.clone(), self.revision);
        }
    }

    /// Last-write-wins update of one flat key. Returns whether the value changed.
    pub fn set_scalar(&mut self, key: &FieldKey, value: AnswerValue, origin: Origin) -> bool {
        if self.state.simple.get(key) == Some(&value) {
            return false;
        }
        self.bump(key, origin);
        self.state.simple.insert(key.clone(), value);
        true
    }

    /// Update one key of the draft buffer. Returns whether the value changed.
    pub fn set_draft(&mut self, key: &FieldKey, value: AnswerValue, origin: Origin) -> bool {
        if self.draft.get(key) == Some(&value) {
            return false;
        }
        self.bump(key, origin);
        self.draft.insert(key.clone(), value);
        true
    }

    /// Replace the draft values of a section's keys in one step
    pub fn load_draft(&mut self, values: Vec<(FieldKey, AnswerValue)>) {
        self.revision += 1;
        for (key, value) in values {
            self.draft.insert(key, value);
        }
    }

    pub fn clear_draft(&mut self, keys: &[FieldKey]) {
        self.revision += 1;
        for key in keys {
            self.draft.remove(key);
        }
    }

    /// Append a row and clear the section's draft and flat entries
    pub fn commit_row(&mut self, section: &Section, row: Row) {
        let keys = section_keys(section);
        self.revision += 1;
        self.state
            .rows
            .entry(section.id.clone())
            .or_default()
            .push(row);
        for key in &keys {
            self.draft.remove(key);
            self.state.simple.remove(key);
        }
    }

    /// Replace the row at `index` and clear the section's draft entries
    pub fn replace_row(&mut self, section: &Section, index: usize, row: Row) -> Result<(), RowError> {
        let rows = self.rows_mut(&section.id, index)?;
        rows[index] = row;
        self.revision += 1;
        for key in section_keys(section) {
            self.draft.remove(&key);
        }
        Ok(())
    }

    pub fn remove_row(&mut self, section_id: &str, index: usize) -> Result<Row, RowError> {
        let rows = self.rows_mut(section_id, index)?;
        let removed = rows.remove(index);
        self.revision += 1;
        Ok(removed)
    }

    /// Move one row, keeping the relative order of all others
    pub fn move_row(&mut self, section_id: &str, from: usize, to: usize) -> Result<(), RowError> {
        let rows = self.rows_mut(section_id, from)?;
        if to >= rows.len() {
            return Err(RowError::IndexOutOfRange {
                section: section_id.to_string(),
                index: to,
                len: rows.len(),
            });
        }
        let moved = rows.remove(from);
        rows.insert(to, moved);
        self.revision += 1;
        Ok(())
    }

    fn rows_mut(&mut self, section_id: &str, index: usize) -> Result<&mut Vec<Row>, RowError> {
        let rows = self
            .state
            .rows
            .get_mut(section_id)
            .ok_or_else(|| RowError::NotRepeatable(section_id.to_string()))?;
        if index >= rows.len() {
            return Err(RowError::IndexOutOfRange {
                section: section_id.to_string(),
                index,
                len: rows.len(),
            });
        }
        Ok(rows)
    }

    /// Whether work dispatched at revision `since` predates the last reset
    pub fn is_stale(&self, since: u64) -> bool {
        since < self.reset_revision
    }

    /// Merge remote values into the flat map in one step.
    ///
    /// Keys the user edited after revision `since` keep the user's value.
    /// Data dispatched before the last reset is dropped entirely.
    pub fn merge_remote(&mut self, values: Vec<(FieldKey, AnswerValue)>, since: u64) -> MergeReport {
        let mut report = MergeReport::default();
        if self.is_stale(since) {
            tracing::debug!(
                since,
                reset = self.reset_revision,
                keys = values.len(),
                "Dropping remote data dispatched before reset"
            );
            report.skipped = values.into_iter().map(|(key, _)| key).collect();
            return report;
        }
        let mut accepted = Vec::with_capacity(values.len());
        for (key, value) in values {
            let edited_after = self.user_edits.get(&key).is_some_and(|&rev| rev > since);
            if edited_after {
                report.skipped.push(key);
            } else {
                accepted.push((key, value));
            }
        }
        if !accepted.is_empty() {
            self.revision += 1;
        }
        for (key, value) in accepted {
            report.applied.push(key.clone());
            self.state.simple.insert(key, value);
        }
        report
    }

    /// Back to the initialized state for a version
    pub fn reset(&mut self, version: &Version) {
        self.state = AnswerState::for_version(version);
        self.draft.clear();
        self.user_edits.clear();
        self.revision += 1;
        self.reset_revision = self.revision;
    }
}

/// Draft buffer layered over the flat answer map
pub struct LayeredScope<'a> {
    draft: &'a HashMap<FieldKey, AnswerValue>,
    simple: &'a BTreeMap<FieldKey, AnswerValue>,
}

impl Scope for LayeredScope<'_> {
    fn lookup(&self, name: &str) -> Option<&AnswerValue> {
        self.draft.get(name).or_else(|| self.simple.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::*;

    fn version() -> Version {
        form(vec![
            section("s1", vec![text("name"), multi("tags", &["a", "b"])]),
            repeatable("meds", vec![text("drug"), text("dose")]),
        ])
        .latest()
        .clone()
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AnswerValue::text(*v)))
            .collect()
    }

    fn store_with_rows(names: &[&str]) -> (AnswerStore, Section) {
        let v = version();
        let mut store = AnswerStore::new(&v);
        let section = v.section("meds").unwrap().clone();
        for name in names {
            store.commit_row(&section, row(&[("drug", name)]));
        }
        (store, section)
    }

    fn drugs(store: &AnswerStore) -> Vec<String> {
        store
            .rows("meds")
            .iter()
            .map(|r| r["drug"].as_text())
            .collect()
    }

    mod init {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_simple_sections_start_empty() {
            let store = AnswerStore::new(&version());
            assert_eq!(store.get("s1.name"), Some(&AnswerValue::Empty));
            assert_eq!(store.get("s1.tags"), Some(&AnswerValue::Empty));
        }

        #[test]
        fn test_repeatable_sections_have_rows_not_scalars() {
            let store = AnswerStore::new(&version());
            assert!(store.rows("meds").is_empty());
            assert!(store.state().rows.contains_key("meds"));
            assert_eq!(store.get("meds.drug"), None);
        }

        #[test]
        fn test_reset_restores_initial_state() {
            let v = version();
            let mut store = AnswerStore::new(&v);
            store.set_scalar(&"s1.name".into(), AnswerValue::text("x"), Origin::User);
            store.reset(&v);
            assert_eq!(store.state(), &AnswerState::for_version(&v));
        }
    }

    mod scalar {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_set_scalar_last_write_wins() {
            let mut store = AnswerStore::new(&version());
            let key = FieldKey::from("s1.name");
            assert!(store.set_scalar(&key, AnswerValue::text("a"), Origin::User));
            assert!(store.set_scalar(&key, AnswerValue::text("b"), Origin::User));
            assert_eq!(store.get("s1.name"), Some(&AnswerValue::text("b")));
        }

        #[test]
        fn test_unchanged_value_does_not_bump_revision() {
            let mut store = AnswerStore::new(&version());
            let key = FieldKey::from("s1.name");
            store.set_scalar(&key, AnswerValue::text("a"), Origin::User);
            let rev = store.revision();
            assert!(!store.set_scalar(&key, AnswerValue::text("a"), Origin::User));
            assert_eq!(store.revision(), rev);
        }

        #[test]
        fn test_scope_prefers_draft() {
            let mut store = AnswerStore::new(&version());
            let key = FieldKey::from("s1.name");
            store.set_scalar(&key, AnswerValue::text("flat"), Origin::User);
            store.set_draft(&key, AnswerValue::text("draft"), Origin::User);
            assert_eq!(store.scope().lookup("s1.name"), Some(&AnswerValue::text("draft")));
        }
    }

    mod rows {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_commit_clears_draft_and_flat_keys() {
            let v = version();
            let mut store = AnswerStore::new(&v);
            let section = v.section("meds").unwrap();
            store.set_draft(&"meds.drug".into(), AnswerValue::text("x"), Origin::User);
            store.merge_remote(vec![("meds.dose".into(), AnswerValue::text("5"))], 0);
            store.commit_row(section, row(&[("drug", "x"), ("dose", "5")]));
            assert!(store.draft("meds.drug").is_none());
            assert!(store.get("meds.dose").is_none());
            assert_eq!(store.rows("meds").len(), 1);
        }

        #[test]
        fn test_remove_first_row() {
            let (mut store, _) = store_with_rows(&["A", "B", "C"]);
            store.remove_row("meds", 0).unwrap();
            assert_eq!(drugs(&store), vec!["B", "C"]);
        }

        #[test]
        fn test_move_first_to_last() {
            let (mut store, _) = store_with_rows(&["A", "B", "C"]);
            store.move_row("meds", 0, 2).unwrap();
            assert_eq!(drugs(&store), vec!["B", "C", "A"]);
        }

        #[test]
        fn test_move_last_to_first() {
            let (mut store, _) = store_with_rows(&["A", "B", "C"]);
            store.move_row("meds", 2, 0).unwrap();
            assert_eq!(drugs(&store), vec!["C", "A", "B"]);
        }

        #[test]
        fn test_out_of_range_is_error_and_leaves_rows() {
            let (mut store, section) = store_with_rows(&["A"]);
            assert!(matches!(
                store.remove_row("meds", 3),
                Err(RowError::IndexOutOfRange { index: 3, len: 1, .. })
            ));
            assert!(store.move_row("meds", 0, 1).is_err());
            assert!(store.replace_row(&section, 1, Row::new()).is_err());
            assert_eq!(drugs(&store), vec!["A"]);
        }

        #[test]
        fn test_rows_of_simple_section_is_error() {
            let mut store = AnswerStore::new(&version());
            assert!(matches!(
                store.remove_row("s1", 0),
                Err(RowError::NotRepeatable(_))
            ));
        }
    }

    mod merge {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_merge_applies_all_keys() {
            let mut store = AnswerStore::new(&version());
            let report = store.merge_remote(
                vec![
                    ("s1.name".into(), AnswerValue::text("Ada")),
                    ("extra".into(), AnswerValue::Number(3.0)),
                ],
                store.revision(),
            );
            assert_eq!(report.applied.len(), 2);
            assert_eq!(store.get("extra"), Some(&AnswerValue::Number(3.0)));
        }

        #[test]
        fn test_merge_skips_keys_edited_after_dispatch() {
            let mut store = AnswerStore::new(&version());
            let dispatched_at = store.revision();
            store.set_scalar(&"s1.name".into(), AnswerValue::text("mine"), Origin::User);

            let report = store.merge_remote(
                vec![
                    ("s1.name".into(), AnswerValue::text("remote")),
                    ("s1.tags".into(), AnswerValue::choices(["a"])),
                ],
                dispatched_at,
            );

            assert_eq!(report.skipped, vec![FieldKey::from("s1.name")]);
            assert_eq!(store.get("s1.name"), Some(&AnswerValue::text("mine")));
            assert_eq!(store.get("s1.tags"), Some(&AnswerValue::choices(["a"])));
        }

        #[test]
        fn test_merge_overwrites_edits_made_before_dispatch() {
            let mut store = AnswerStore::new(&version());
            store.set_scalar(&"s1.name".into(), AnswerValue::text("mine"), Origin::User);
            let dispatched_at = store.revision();
            store.merge_remote(vec![("s1.name".into(), AnswerValue::text("remote"))], dispatched_at);
            assert_eq!(store.get("s1.name"), Some(&AnswerValue::text("remote")));
        }

        #[test]
        fn test_merge_drops_data_dispatched_before_reset() {
            let v = version();
            let mut store = AnswerStore::new(&v);
            store.set_scalar(&"s1.name".into(), AnswerValue::text("first"), Origin::User);
            let dispatched_at = store.revision();
            store.reset(&v);

            let report = store.merge_remote(
                vec![
                    ("s1.name".into(), AnswerValue::text("remote")),
                    ("s1.tags".into(), AnswerValue::choices(["a"])),
                ],
                dispatched_at,
            );

            assert!(report.applied.is_empty());
            assert_eq!(report.skipped.len(), 2);
            assert_eq!(store.state(), &AnswerState::for_version(&v));
        }

        #[test]
        fn test_merge_after_reset_accepts_new_dispatch() {
            let v = version();
            let mut store = AnswerStore::new(&v);
            store.reset(&v);
            let dispatched_at = store.revision();
            let report = store.merge_remote(vec![("s1.name".into(), AnswerValue::text("remote"))], dispatched_at);
            assert_eq!(report.applied, vec![FieldKey::from("s1.name")]);
        }
    }
}
