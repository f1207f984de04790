use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{InvalidAnswerError, PersistenceError};
use crate::spec::item::Item;
use crate::validate::normalize_answer;

/// Stored answer. Checkboxes are flags, multi-select dropdowns are lists,
/// everything else is text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Flag(bool),
    Text(String),
    List(Vec<String>),
}

impl AnswerValue {
    /// String form used by condition comparisons.
    pub fn coerced(&self) -> String {
        match self {
            AnswerValue::Flag(flag) => flag.to_string(),
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::List(values) => values.join(","),
        }
    }

    /// Converts persisted JSON, returning `None` for values that carry no
    /// answer (null, blank text, `false`, empty lists).
    pub fn from_json(value: &Value) -> Option<Self> {
        let answer = match value {
            Value::Bool(flag) => AnswerValue::Flag(*flag),
            Value::String(text) => AnswerValue::Text(text.clone()),
            Value::Number(_) => AnswerValue::Text(crate::expr::coerce_value(value)),
            Value::Array(values) => AnswerValue::List(
                values
                    .iter()
                    .map(crate::expr::coerce_value)
                    .filter(|text| !text.is_empty())
                    .collect(),
            ),
            Value::Null | Value::Object(_) => return None,
        };
        answer.is_meaningful().then_some(answer)
    }

    pub fn to_json(&self) -> Value {
        match self {
            AnswerValue::Flag(flag) => Value::Bool(*flag),
            AnswerValue::Text(text) => Value::String(text.clone()),
            AnswerValue::List(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        }
    }

    pub fn is_meaningful(&self) -> bool {
        match self {
            AnswerValue::Flag(flag) => *flag,
            AnswerValue::Text(text) => !text.trim().is_empty(),
            AnswerValue::List(values) => !values.is_empty(),
        }
    }
}

pub type AnswerMap = BTreeMap<String, AnswerValue>;

/// What an accepted write did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Stored,
    Cleared,
}

/// Answers keyed by question id. A key exists only while its question holds
/// a meaningful answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerStore {
    answers: AnswerMap,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store, dropping entries that carry no answer.
    pub fn from_map(answers: AnswerMap) -> Self {
        Self {
            answers: answers
                .into_iter()
                .filter(|(_, value)| value.is_meaningful())
                .collect(),
        }
    }

    pub fn get(&self, question_id: &str) -> Option<&AnswerValue> {
        self.answers.get(question_id)
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.answers.contains_key(question_id)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn as_map(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AnswerValue)> {
        self.answers.iter()
    }

    /// Validates `raw` against the item's type and stores it. Rejected
    /// writes leave the store untouched.
    pub fn set(&mut self, item: &Item, raw: &Value) -> Result<SetOutcome, InvalidAnswerError> {
        match normalize_answer(item, raw)? {
            Some(value) => {
                self.answers.insert(item.id.clone(), value);
                Ok(SetOutcome::Stored)
            }
            None => {
                self.answers.remove(&item.id);
                Ok(SetOutcome::Cleared)
            }
        }
    }

    pub fn delete(&mut self, question_id: &str) -> Option<AnswerValue> {
        let removed = self.answers.remove(question_id);
        if removed.is_some() {
            debug!(question_id, "answer removed");
        }
        removed
    }

    /// Whole map as a JSON object.
    pub fn serialize(&self) -> Value {
        Value::Object(
            self.answers
                .iter()
                .map(|(id, value)| (id.clone(), value.to_json()))
                .collect::<Map<_, _>>(),
        )
    }

    pub fn restore(value: &Value) -> Result<Self, PersistenceError> {
        let object = value
            .as_object()
            .ok_or_else(|| PersistenceError::Decode("answers must be a JSON object".into()))?;
        Ok(Self {
            answers: object
                .iter()
                .filter_map(|(id, value)| {
                    AnswerValue::from_json(value).map(|answer| (id.clone(), answer))
                })
                .collect(),
        })
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, PersistenceError> {
        serde_cbor::to_vec(&self.answers).map_err(|err| PersistenceError::Encode(err.to_string()))
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, PersistenceError> {
        let answers: AnswerMap = serde_cbor::from_slice(bytes)
            .map_err(|err| PersistenceError::Decode(err.to_string()))?;
        Ok(Self::from_map(answers))
    }
}
