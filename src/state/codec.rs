//! Submission codec
//!
//! Answer State ⇄ flat transport keys ⇄ nested submission payload.
//!
//! Flat keys are `section.question` for simple sections and
//! `section.row.question` for repeatable rows. The nested payload groups them
//! back into `{ section: { question: value } }` and
//! `{ section: [ { question: value }, ... ] }`.

use super::binding::resolve_key;
use super::store::{AnswerState, Row};
use super::value::AnswerValue;
use crate::schema::Version;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Flattened answers keyed by transport key
pub type FlatAnswers = BTreeMap<String, AnswerValue>;

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("malformed answer key '{0}'")]
    MalformedKey(String),

    #[error("response payload must be a JSON object")]
    NotAnObject,

    #[error("section {section} expected {expected} in response payload")]
    ShapeMismatch {
        section: String,
        expected: &'static str,
    },
}

/// Flatten Answer State into transport keys.
///
/// Simple answers are emitted for every question of the version, so empty
/// fields are submitted as empty values. Keys merged in from remote data that
/// belong to no question are not submitted.
pub fn flatten(state: &AnswerState, version: &Version) -> FlatAnswers {
    let mut flat = FlatAnswers::new();
    for section in &version.sections {
        if section.is_repeatable {
            for (index, row) in state.rows(&section.id).iter().enumerate() {
                for (question_id, value) in row {
                    flat.insert(format!("{}.{}.{}", section.id, index, question_id), value.clone());
                }
            }
        } else {
            for question in &section.questions {
                let value = state
                    .simple
                    .get(resolve_key(&section.id, question).as_str())
                    .cloned()
                    .unwrap_or_default();
                flat.insert(format!("{}.{}", section.id, question.id), value);
            }
        }
    }
    flat
}

/// Rebuild Answer State from transport keys
pub fn unflatten(flat: &FlatAnswers, version: &Version) -> Result<AnswerState, CodecError> {
    let mut state = AnswerState::for_version(version);
    let mut rows: BTreeMap<String, BTreeMap<usize, Row>> = BTreeMap::new();

    for (key, value) in flat {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            [section_id, question_id] => {
                let Some(section) = version.section(section_id) else {
                    tracing::debug!(key = %key, "Skipping answer for unknown section");
                    continue;
                };
                if section.is_repeatable {
                    return Err(CodecError::ShapeMismatch {
                        section: section.id.clone(),
                        expected: "a list of rows",
                    });
                }
                let field_key = match section.question(question_id) {
                    Some(question) => resolve_key(&section.id, question),
                    None => key.as_str().into(),
                };
                state.simple.insert(field_key, value.clone());
            }
            [section_id, index, question_id] => {
                let index: usize = index
                    .parse()
                    .map_err(|_| CodecError::MalformedKey(key.clone()))?;
                rows.entry(section_id.to_string())
                    .or_default()
                    .entry(index)
                    .or_default()
                    .insert(question_id.to_string(), value.clone());
            }
            _ => return Err(CodecError::MalformedKey(key.clone())),
        }
    }

    for (section_id, indexed) in rows {
        let Some(section) = version.section(&section_id) else {
            tracing::debug!(section = %section_id, "Skipping rows for unknown section");
            continue;
        };
        if !section.is_repeatable {
            return Err(CodecError::ShapeMismatch {
                section: section_id,
                expected: "an object of answers",
            });
        }
        state.rows.insert(section_id, indexed.into_values().collect());
    }

    Ok(state)
}

/// Group transport keys into the nested submission payload
pub fn to_payload(flat: &FlatAnswers) -> Result<Value, CodecError> {
    let mut simple: BTreeMap<&str, Map<String, Value>> = BTreeMap::new();
    let mut repeated: BTreeMap<&str, BTreeMap<usize, Map<String, Value>>> = BTreeMap::new();

    for (key, value) in flat {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            [section_id, question_id] => {
                simple
                    .entry(*section_id)
                    .or_default()
                    .insert(question_id.to_string(), value.clone().into());
            }
            [section_id, index, question_id] => {
                let index: usize = index
                    .parse()
                    .map_err(|_| CodecError::MalformedKey(key.clone()))?;
                repeated
                    .entry(*section_id)
                    .or_default()
                    .entry(index)
                    .or_default()
                    .insert(question_id.to_string(), value.clone().into());
            }
            _ => return Err(CodecError::MalformedKey(key.clone())),
        }
    }

    let mut payload = Map::new();
    for (section_id, answers) in simple {
        payload.insert(section_id.to_string(), Value::Object(answers));
    }
    for (section_id, indexed) in repeated {
        let rows = indexed.into_values().map(Value::Object).collect();
        payload.insert(section_id.to_string(), Value::Array(rows));
    }
    Ok(Value::Object(payload))
}

/// Split a nested payload into transport keys
pub fn from_payload(payload: &Value) -> Result<FlatAnswers, CodecError> {
    let sections = payload.as_object().ok_or(CodecError::NotAnObject)?;
    let mut flat = FlatAnswers::new();

    for (section_id, answers) in sections {
        match answers {
            Value::Object(answers) => {
                for (question_id, value) in answers {
                    flat.insert(format!("{section_id}.{question_id}"), value.clone().into());
                }
            }
            Value::Array(rows) => {
                for (index, row) in rows.iter().enumerate() {
                    let row = row.as_object().ok_or_else(|| CodecError::ShapeMismatch {
                        section: section_id.clone(),
                        expected: "rows that are objects",
                    })?;
                    for (question_id, value) in row {
                        flat.insert(format!("{section_id}.{index}.{question_id}"), value.clone().into());
                    }
                }
            }
            _ => {
                return Err(CodecError::ShapeMismatch {
                    section: section_id.clone(),
                    expected: "an object or a list of rows",
                })
            }
        }
    }
    Ok(flat)
}

/// Answer State → submission payload
pub fn encode(state: &AnswerState, version: &Version) -> Result<Value, CodecError> {
    to_payload(&flatten(state, version))
}

/// Stored response payload → Answer State, for preview and history replay
pub fn decode(payload: &Value, version: &Version) -> Result<AnswerState, CodecError> {
    unflatten(&from_payload(payload)?, version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::*;
    use crate::state::FieldKey;
    use serde_json::json;

    fn version() -> Version {
        let mut age = text("age");
        age.meta.variable_name = Some("patient_age".to_string());
        form(vec![
            section("s1", vec![text("name"), age, multi("tags", &["a", "b"])]),
            repeatable("meds", vec![text("drug"), multi("times", &["am", "pm"])]),
        ])
        .latest()
        .clone()
    }

    fn filled_state(version: &Version) -> AnswerState {
        let mut state = AnswerState::for_version(version);
        state
            .simple
            .insert(FieldKey::from("patient_age"), AnswerValue::text("42"));
        state
            .simple
            .insert(FieldKey::from("s1.tags"), AnswerValue::choices(["a", "b"]));
        let row = |drug: &str, times: &[&str]| -> Row {
            [
                ("drug".to_string(), AnswerValue::text(drug)),
                ("times".to_string(), AnswerValue::choices(times.iter().copied())),
            ]
            .into_iter()
            .collect()
        };
        state.rows.insert(
            "meds".to_string(),
            vec![row("aspirin", &["am"]), row("", &["am", "pm"])],
        );
        state
    }

    mod flatten {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_flat_keys_use_question_ids() {
            let v = version();
            let flat = flatten(&filled_state(&v), &v);
            let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
            assert_eq!(
                keys,
                vec![
                    "meds.0.drug",
                    "meds.0.times",
                    "meds.1.drug",
                    "meds.1.times",
                    "s1.age",
                    "s1.name",
                    "s1.tags"
                ]
            );
            assert_eq!(flat["s1.age"], AnswerValue::text("42"));
            assert_eq!(flat["s1.name"], AnswerValue::Empty);
        }

        #[test]
        fn test_round_trip() {
            let v = version();
            let state = filled_state(&v);
            assert_eq!(unflatten(&flatten(&state, &v), &v).unwrap(), state);
        }

        #[test]
        fn test_round_trip_through_payload() {
            let v = version();
            let state = filled_state(&v);
            let payload = encode(&state, &v).unwrap();
            assert_eq!(decode(&payload, &v).unwrap(), state);
        }

        #[test]
        fn test_malformed_key() {
            let v = version();
            let flat: FlatAnswers = [("a.b.c.d".to_string(), AnswerValue::Empty)].into_iter().collect();
            assert_eq!(
                unflatten(&flat, &v),
                Err(CodecError::MalformedKey("a.b.c.d".to_string()))
            );
            let flat: FlatAnswers = [("meds.x.drug".to_string(), AnswerValue::Empty)].into_iter().collect();
            assert!(matches!(unflatten(&flat, &v), Err(CodecError::MalformedKey(_))));
        }
    }

    mod payload {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_encode_nests_sections_and_rows() {
            let v = version();
            let payload = encode(&filled_state(&v), &v).unwrap();
            assert_eq!(
                payload,
                json!({
                    "s1": { "name": "", "age": "42", "tags": ["a", "b"] },
                    "meds": [
                        { "drug": "aspirin", "times": ["am"] },
                        { "drug": "", "times": ["am", "pm"] }
                    ]
                })
            );
        }

        #[test]
        fn test_decode_stores_under_resolved_keys() {
            let v = version();
            let state = decode(&json!({ "s1": { "age": 30 } }), &v).unwrap();
            assert_eq!(state.simple.get("patient_age"), Some(&AnswerValue::Number(30.0)));
            assert_eq!(state.simple.get("s1.name"), Some(&AnswerValue::Empty));
            assert!(state.rows("meds").is_empty());
        }

        #[test]
        fn test_decode_skips_unknown_sections() {
            let v = version();
            let state = decode(&json!({ "old": { "q": "x" } }), &v).unwrap();
            assert_eq!(state, AnswerState::for_version(&v));
        }

        #[test]
        fn test_decode_rejects_wrong_shapes() {
            let v = version();
            assert_eq!(decode(&json!([1, 2]), &v), Err(CodecError::NotAnObject));
            assert!(matches!(
                decode(&json!({ "meds": { "drug": "x" } }), &v),
                Err(CodecError::ShapeMismatch { .. })
            ));
            assert!(matches!(
                decode(&json!({ "s1": [{ "name": "x" }] }), &v),
                Err(CodecError::ShapeMismatch { .. })
            ));
            assert!(matches!(
                decode(&json!({ "s1": "x" }), &v),
                Err(CodecError::ShapeMismatch { .. })
            ));
        }
    }
}
