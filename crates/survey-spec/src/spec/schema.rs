use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::answers::AnswerMap;
use crate::error::SchemaLoadError;
use crate::expr::Logic;
use crate::spec::item::Item;

/// A titled group of items revealed as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Controls whether the whole section is ever shown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<Logic>,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl Section {
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }

    pub fn is_visible(&self, answers: &AnswerMap) -> bool {
        self.logic
            .as_ref()
            .is_none_or(|logic| logic.evaluate(answers))
    }
}

/// Top-level survey definition. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SurveySchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Ordered sections; the wire name is `questions`.
    #[serde(rename = "questions")]
    pub sections: Vec<Section>,
}

impl SurveySchema {
    pub fn from_json_str(input: &str) -> Result<Self, SchemaLoadError> {
        let value: Value = serde_json::from_str(input).map_err(SchemaLoadError::Json)?;
        Self::from_value(value)
    }

    /// Parses and structurally checks a schema document.
    pub fn from_value(value: Value) -> Result<Self, SchemaLoadError> {
        if !value.get("questions").is_some_and(Value::is_array) {
            return Err(SchemaLoadError::MissingQuestions);
        }
        let schema: SurveySchema =
            serde_json::from_value(value).map_err(SchemaLoadError::Structure)?;
        schema.check_ids()?;
        Ok(schema)
    }

    fn check_ids(&self) -> Result<(), SchemaLoadError> {
        let mut sections = BTreeSet::new();
        let mut items = BTreeSet::new();
        for section in &self.sections {
            if !sections.insert(section.id.as_str()) {
                return Err(SchemaLoadError::DuplicateSection(section.id.clone()));
            }
            for item in &section.items {
                if !items.insert(item.id.as_str()) {
                    return Err(SchemaLoadError::DuplicateItem(item.id.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.sections.iter().flat_map(|section| section.items.iter())
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items().find(|item| item.id == id)
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.id == id)
    }

    /// Section that declares the item `item_id`.
    pub fn section_of(&self, item_id: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|section| section.items.iter().any(|item| item.id == item_id))
    }

    /// JSON Schema describing the survey document format.
    pub fn json_schema() -> Value {
        schemars::schema_for!(SurveySchema).to_value()
    }
}
