use serde::Serialize;

use crate::answers::{AnswerStore, AnswerValue};
use crate::spec::item::{Item, ItemType};
use crate::spec::schema::SurveySchema;
use crate::visibility::VisibilitySnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub question_id: String,
    pub prompt: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummarySection {
    pub id: String,
    pub title: String,
    pub entries: Vec<SummaryEntry>,
}

/// Human-readable answers of a finished survey, grouped by section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveySummary {
    pub title: Option<String>,
    pub sections: Vec<SummarySection>,
}

impl SurveySummary {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn render_text(&self) -> String {
        let mut lines = Vec::new();
        if let Some(title) = &self.title {
            lines.push(title.clone());
        }
        if self.sections.is_empty() {
            lines.push("No visible answers to display.".to_string());
        }
        for section in &self.sections {
            lines.push(format!("== {}", section.title));
            for entry in &section.entries {
                lines.push(format!("{}: {}", entry.prompt, entry.answer));
            }
        }
        lines.join("\n")
    }
}

/// Collects the visible, answered input items in schema order.
pub fn summarize(
    schema: &SurveySchema,
    answers: &AnswerStore,
    snapshot: &VisibilitySnapshot,
) -> SurveySummary {
    let sections = schema
        .sections
        .iter()
        .filter(|section| snapshot.section(&section.id).is_some_and(|s| s.visible))
        .filter_map(|section| {
            let entries: Vec<SummaryEntry> = section
                .items
                .iter()
                .filter(|item| snapshot.is_question_visible(&item.id))
                .filter_map(|item| {
                    let answer = display_answer(item, answers.get(&item.id)?)?;
                    Some(SummaryEntry {
                        question_id: item.id.clone(),
                        prompt: item.text.clone(),
                        answer,
                    })
                })
                .collect();
            (!entries.is_empty()).then(|| SummarySection {
                id: section.id.clone(),
                title: section.display_title().to_string(),
                entries,
            })
        })
        .collect();

    SurveySummary {
        title: schema.title.clone(),
        sections,
    }
}

/// Display form of a stored answer; `None` for display-only items.
pub fn display_answer(item: &Item, value: &AnswerValue) -> Option<String> {
    match &item.kind {
        ItemType::Checkbox => {
            let checked = matches!(value, AnswerValue::Flag(true))
                || matches!(value, AnswerValue::Text(text) if text == "true");
            Some(if checked { "Accepted" } else { "Not Accepted" }.to_string())
        }
        ItemType::YesNo | ItemType::RadioGroup | ItemType::Dropdown => {
            let label = |raw: &str| {
                item.option(raw)
                    .map(|option| option.display_label().to_string())
            };
            let text = match value {
                AnswerValue::List(values) => {
                    let labels: Vec<String> = values.iter().filter_map(|v| label(v)).collect();
                    (!labels.is_empty()).then(|| labels.join(", "))
                }
                other => label(&other.coerced()),
            };
            Some(text.unwrap_or_else(|| "No Answer".to_string()))
        }
        ItemType::Text | ItemType::Textarea | ItemType::Date => Some(value.coerced()),
        ItemType::Subheader | ItemType::Info | ItemType::Unknown(_) => None,
    }
}
