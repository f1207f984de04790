use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::answers::{AnswerStore, AnswerValue};
use crate::error::InvalidAnswerError;
use crate::expr::coerce_value;
use crate::spec::item::{Item, ItemType};
use crate::spec::schema::SurveySchema;
use crate::visibility::recompute;

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").expect("date pattern compiles")
});

/// Maps a raw input value onto what the store keeps for this item.
/// `Ok(None)` means the answer is cleared.
pub fn normalize_answer(
    item: &Item,
    raw: &Value,
) -> Result<Option<AnswerValue>, InvalidAnswerError> {
    if !item.kind.is_input() {
        return Err(InvalidAnswerError::NotAnswerable(item.id.clone()));
    }
    if raw.is_null() {
        return Ok(None);
    }

    match &item.kind {
        ItemType::Text | ItemType::Textarea => {
            let text = text_input(item, raw)?;
            Ok(non_blank(text).map(AnswerValue::Text))
        }
        ItemType::Date => {
            let Some(text) = non_blank(text_input(item, raw)?) else {
                return Ok(None);
            };
            if !DATE_PATTERN.is_match(text.trim()) {
                return Err(InvalidAnswerError::InvalidDate {
                    question_id: item.id.clone(),
                    value: text,
                });
            }
            Ok(Some(AnswerValue::Text(text.trim().to_string())))
        }
        ItemType::Checkbox => match raw {
            Value::Bool(true) => Ok(Some(AnswerValue::Flag(true))),
            Value::Bool(false) => Ok(None),
            Value::String(text) if text == "true" => Ok(Some(AnswerValue::Flag(true))),
            Value::String(text) if text == "false" || text.trim().is_empty() => Ok(None),
            _ => Err(type_mismatch(item, "a boolean")),
        },
        ItemType::YesNo | ItemType::RadioGroup | ItemType::Dropdown => {
            if item.accepts_many() {
                return choice_list(item, raw);
            }
            let chosen = match raw {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => coerce_value(raw),
                _ => return Err(type_mismatch(item, "a single option value")),
            };
            if chosen.trim().is_empty() {
                return Ok(None);
            }
            canonical_option(item, &chosen).map(|value| Some(AnswerValue::Text(value)))
        }
        ItemType::Subheader | ItemType::Info | ItemType::Unknown(_) => {
            Err(InvalidAnswerError::NotAnswerable(item.id.clone()))
        }
    }
}

/// True when a stored value fully answers the item for completion purposes.
pub fn is_satisfied(item: &Item, value: Option<&AnswerValue>) -> bool {
    let Some(value) = value else {
        return false;
    };
    match &item.kind {
        ItemType::Checkbox => matches!(value, AnswerValue::Flag(true))
            || matches!(value, AnswerValue::Text(text) if text == "true"),
        ItemType::Subheader | ItemType::Info | ItemType::Unknown(_) => true,
        _ => value.is_meaningful() && normalize_answer(item, &value.to_json()).is_ok(),
    }
}

fn text_input(item: &Item, raw: &Value) -> Result<String, InvalidAnswerError> {
    match raw {
        Value::String(text) => Ok(text.clone()),
        Value::Number(_) => Ok(coerce_value(raw)),
        _ => Err(type_mismatch(item, "text")),
    }
}

fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn canonical_option(item: &Item, chosen: &str) -> Result<String, InvalidAnswerError> {
    item.option(chosen)
        .map(|option| option.value.clone())
        .ok_or_else(|| InvalidAnswerError::UnknownOption {
            question_id: item.id.clone(),
            value: chosen.to_string(),
        })
}

fn choice_list(item: &Item, raw: &Value) -> Result<Option<AnswerValue>, InvalidAnswerError> {
    let Value::Array(values) = raw else {
        return Err(type_mismatch(item, "a list of option values"));
    };
    let mut chosen = Vec::with_capacity(values.len());
    for value in values {
        if value.is_array() || value.is_object() {
            return Err(type_mismatch(item, "a list of option values"));
        }
        let option = canonical_option(item, &coerce_value(value))?;
        if !chosen.contains(&option) {
            chosen.push(option);
        }
    }
    Ok((!chosen.is_empty()).then_some(AnswerValue::List(chosen)))
}

fn type_mismatch(item: &Item, expected: &'static str) -> InvalidAnswerError {
    InvalidAnswerError::TypeMismatch {
        question_id: item.id.clone(),
        expected,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub question_id: Option<String>,
    pub message: String,
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub missing_required: Vec<String>,
    pub unknown_fields: Vec<String>,
}

/// Checks a stored answer map against the currently visible part of the
/// survey. The input is not modified.
pub fn validate(schema: &SurveySchema, answers: &AnswerStore) -> ValidationResult {
    let mut visible_answers = answers.clone();
    let snapshot = recompute(schema, &mut visible_answers, None);

    let mut errors = Vec::new();
    let mut missing_required = Vec::new();

    for item in schema.items() {
        let stored = answers.get(&item.id);
        if !snapshot.is_question_visible(&item.id) {
            if stored.is_some() {
                errors.push(ValidationError {
                    question_id: Some(item.id.clone()),
                    message: "answer stored for a hidden question".into(),
                    code: Some("hidden".into()),
                });
            }
            continue;
        }
        match stored {
            None => {
                if item.required && item.kind.is_input() {
                    missing_required.push(item.id.clone());
                }
            }
            Some(value) => {
                if let Err(error) = normalize_answer(item, &value.to_json()) {
                    errors.push(ValidationError {
                        question_id: Some(item.id.clone()),
                        message: error.to_string(),
                        code: Some(error.code().into()),
                    });
                } else if item.required && !is_satisfied(item, Some(value)) {
                    missing_required.push(item.id.clone());
                }
            }
        }
    }

    let unknown_fields: Vec<String> = answers
        .iter()
        .filter(|(id, _)| schema.item(id).is_none())
        .map(|(id, _)| id.clone())
        .collect();

    ValidationResult {
        valid: errors.is_empty() && missing_required.is_empty() && unknown_fields.is_empty(),
        errors,
        missing_required,
        unknown_fields,
    }
}
