use std::sync::LazyLock;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::answers::AnswerMap;
use crate::expr::{Logic, coerce_value};

/// Closed set of item kinds. Anything the schema names outside the set,
/// including a missing or non-string `type`, is kept as `Unknown` and
/// treated as a display-only no-op.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Value", into = "String")]
pub enum ItemType {
    Text,
    Textarea,
    Date,
    Checkbox,
    YesNo,
    RadioGroup,
    Dropdown,
    Subheader,
    Info,
    Unknown(String),
}

impl ItemType {
    pub fn as_str(&self) -> &str {
        match self {
            ItemType::Text => "text",
            ItemType::Textarea => "textarea",
            ItemType::Date => "date",
            ItemType::Checkbox => "checkbox",
            ItemType::YesNo => "yesno",
            ItemType::RadioGroup => "radiogroup",
            ItemType::Dropdown => "dropdown",
            ItemType::Subheader => "subheader",
            ItemType::Info => "info",
            ItemType::Unknown(label) => label,
        }
    }

    /// True for items that accept an answer.
    pub fn is_input(&self) -> bool {
        !matches!(
            self,
            ItemType::Subheader | ItemType::Info | ItemType::Unknown(_)
        )
    }

    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            ItemType::YesNo | ItemType::RadioGroup | ItemType::Dropdown
        )
    }
}

impl From<String> for ItemType {
    fn from(label: String) -> Self {
        match label.as_str() {
            "text" => ItemType::Text,
            "textarea" => ItemType::Textarea,
            "date" => ItemType::Date,
            "checkbox" => ItemType::Checkbox,
            "yesno" => ItemType::YesNo,
            "radiogroup" => ItemType::RadioGroup,
            "dropdown" => ItemType::Dropdown,
            "subheader" => ItemType::Subheader,
            "info" => ItemType::Info,
            _ => ItemType::Unknown(label),
        }
    }
}

impl From<Value> for ItemType {
    fn from(value: Value) -> Self {
        match value {
            Value::String(label) => ItemType::from(label),
            other => ItemType::Unknown(coerce_value(&other)),
        }
    }
}

impl Default for ItemType {
    fn default() -> Self {
        ItemType::Unknown(String::new())
    }
}

impl From<ItemType> for String {
    fn from(kind: ItemType) -> Self {
        kind.as_str().to_string()
    }
}

/// One selectable value of a choice item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChoiceOption {
    /// Option value; numbers and booleans in the schema are held as text.
    #[serde(deserialize_with = "value_as_text")]
    #[schemars(with = "Value")]
    pub value: String,
    #[serde(default)]
    pub label: String,
}

impl ChoiceOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// Label shown to users, falling back to the raw value.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.value
        } else {
            &self.label
        }
    }
}

fn value_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(|value| coerce_value(&value))
}

static DEFAULT_YES_NO: LazyLock<Vec<ChoiceOption>> =
    LazyLock::new(|| vec![ChoiceOption::new("1", "Yes"), ChoiceOption::new("2", "No")]);

/// A question or display-only element inside a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Item {
    pub id: String,
    #[serde(rename = "type", default)]
    #[schemars(with = "String")]
    pub kind: ItemType,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<Logic>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    /// Dropdowns only: accept several option values.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub multiple: bool,
}

impl Item {
    /// Declared options; yes/no items without options get Yes=1 / No=2.
    pub fn options(&self) -> &[ChoiceOption] {
        if self.options.is_empty() && self.kind == ItemType::YesNo {
            DEFAULT_YES_NO.as_slice()
        } else {
            self.options.as_slice()
        }
    }

    pub fn option(&self, value: &str) -> Option<&ChoiceOption> {
        self.options().iter().find(|option| option.value == value)
    }

    pub fn accepts_many(&self) -> bool {
        self.multiple && self.kind == ItemType::Dropdown
    }

    /// Own logic only; section logic is applied by the engine.
    pub fn is_visible(&self, answers: &AnswerMap) -> bool {
        self.logic
            .as_ref()
            .is_none_or(|logic| logic.evaluate(answers))
    }
}
