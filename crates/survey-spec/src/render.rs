use serde_json::{Map, Value, json};

use crate::{
    answers::AnswerStore,
    error::SchemaLoadError,
    spec::{
        item::{ChoiceOption, ItemType},
        schema::SurveySchema,
    },
    visibility::VisibilitySnapshot,
};

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Some visible section still needs answers.
    NeedInput,
    /// Every visible section is complete.
    Complete,
    /// The schema could not be loaded.
    Error,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
            RenderStatus::Error => "error",
        }
    }
}

/// Progress counters exposed to renderers.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

impl RenderProgress {
    pub fn label(&self) -> String {
        if self.total == 0 {
            "No sections".to_string()
        } else {
            format!("Sections complete: {} of {}", self.completed, self.total)
        }
    }
}

/// How a front end should present an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputControl {
    TextLine,
    TextArea,
    DatePicker,
    Toggle,
    RadioButtons,
    Select,
    MultiSelect,
    Heading,
    Paragraph,
    Unsupported,
}

impl InputControl {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputControl::TextLine => "text",
            InputControl::TextArea => "textarea",
            InputControl::DatePicker => "date",
            InputControl::Toggle => "toggle",
            InputControl::RadioButtons => "radio",
            InputControl::Select => "select",
            InputControl::MultiSelect => "multi_select",
            InputControl::Heading => "heading",
            InputControl::Paragraph => "paragraph",
            InputControl::Unsupported => "unsupported",
        }
    }
}

/// Single dispatch point from item type to presentation.
pub fn input_control(kind: &ItemType, multiple: bool) -> InputControl {
    match kind {
        ItemType::Text => InputControl::TextLine,
        ItemType::Textarea => InputControl::TextArea,
        ItemType::Date => InputControl::DatePicker,
        ItemType::Checkbox => InputControl::Toggle,
        ItemType::YesNo | ItemType::RadioGroup => InputControl::RadioButtons,
        ItemType::Dropdown if multiple => InputControl::MultiSelect,
        ItemType::Dropdown => InputControl::Select,
        ItemType::Subheader => InputControl::Heading,
        ItemType::Info => InputControl::Paragraph,
        ItemType::Unknown(_) => InputControl::Unsupported,
    }
}

/// Describes a single item for render outputs.
#[derive(Debug, Clone)]
pub struct RenderQuestion {
    pub id: String,
    pub text: String,
    pub help: Option<String>,
    pub kind: ItemType,
    pub control: InputControl,
    pub required: bool,
    pub visible: bool,
    pub current_value: Option<Value>,
    pub options: Vec<ChoiceOption>,
}

#[derive(Debug, Clone)]
pub struct RenderSection {
    pub id: String,
    pub title: String,
    pub visible: bool,
    pub revealed: bool,
    pub complete: bool,
    pub questions: Vec<RenderQuestion>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub title: Option<String>,
    pub status: RenderStatus,
    pub progress: RenderProgress,
    pub sections: Vec<RenderSection>,
}

/// Build the renderer payload from the schema, answers, and snapshot.
pub fn build_render_payload(
    schema: &SurveySchema,
    answers: &AnswerStore,
    snapshot: &VisibilitySnapshot,
) -> RenderPayload {
    let sections = schema
        .sections
        .iter()
        .zip(&snapshot.sections)
        .map(|(section, state)| RenderSection {
            id: section.id.clone(),
            title: section.display_title().to_string(),
            visible: state.visible,
            revealed: state.revealed,
            complete: state.complete,
            questions: section
                .items
                .iter()
                .zip(&state.questions)
                .map(|(item, question)| RenderQuestion {
                    id: item.id.clone(),
                    text: item.text.clone(),
                    help: item.help.clone(),
                    kind: item.kind.clone(),
                    control: input_control(&item.kind, item.accepts_many()),
                    required: item.required,
                    visible: question.visible,
                    current_value: answers.get(&item.id).map(|value| value.to_json()),
                    options: item.options().to_vec(),
                })
                .collect(),
        })
        .collect();

    let status = if snapshot.ready_to_finish {
        RenderStatus::Complete
    } else {
        RenderStatus::NeedInput
    };

    RenderPayload {
        title: schema.title.clone(),
        status,
        progress: RenderProgress {
            completed: snapshot.completed_count(),
            total: snapshot.visible_count(),
            percent: snapshot.progress,
        },
        sections,
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let sections = payload
        .sections
        .iter()
        .map(|section| {
            let questions = section
                .questions
                .iter()
                .map(|question| {
                    let mut map = Map::new();
                    map.insert("id".into(), Value::String(question.id.clone()));
                    map.insert("text".into(), Value::String(question.text.clone()));
                    map.insert(
                        "help".into(),
                        question.help.clone().map(Value::String).unwrap_or(Value::Null),
                    );
                    map.insert("type".into(), Value::String(question.kind.as_str().into()));
                    map.insert(
                        "control".into(),
                        Value::String(question.control.as_str().into()),
                    );
                    map.insert("required".into(), Value::Bool(question.required));
                    map.insert("visible".into(), Value::Bool(question.visible));
                    if let Some(current_value) = &question.current_value {
                        map.insert("current_value".into(), current_value.clone());
                    }
                    if !question.options.is_empty() {
                        map.insert(
                            "options".into(),
                            Value::Array(
                                question
                                    .options
                                    .iter()
                                    .map(|option| {
                                        json!({
                                            "value": option.value,
                                            "label": option.display_label(),
                                        })
                                    })
                                    .collect(),
                            ),
                        );
                    }
                    Value::Object(map)
                })
                .collect::<Vec<_>>();
            json!({
                "id": section.id,
                "title": section.title,
                "visible": section.visible,
                "revealed": section.revealed,
                "complete": section.complete,
                "questions": questions,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "title": payload.title,
        "status": payload.status.as_str(),
        "progress": {
            "completed": payload.progress.completed,
            "total": payload.progress.total,
            "percent": payload.progress.percent,
            "label": payload.progress.label(),
        },
        "sections": sections,
    })
}

/// JSON body reported when no schema is available.
pub fn render_error_json(error: &SchemaLoadError) -> Value {
    json!({
        "status": RenderStatus::Error.as_str(),
        "error": error.to_string(),
    })
}

/// Render the revealed part of the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    if let Some(title) = &payload.title {
        lines.push(format!("Survey: {}", title));
    }
    lines.push(format!(
        "Status: {} ({}%, {})",
        payload.status.as_str(),
        payload.progress.percent,
        payload.progress.label()
    ));

    for section in payload.sections.iter().filter(|section| section.revealed) {
        let marker = if section.complete {
            "Complete"
        } else {
            "Incomplete"
        };
        lines.push(format!("== {} [{}]", section.title, marker));
        for question in section.questions.iter().filter(|question| question.visible) {
            lines.push(question_line(question));
            if let Some(help) = &question.help {
                lines.push(format!("     {}", help));
            }
        }
    }

    if payload.status == RenderStatus::Complete {
        lines.push("All visible sections are complete.".to_string());
    }

    lines.join("\n")
}

fn question_line(question: &RenderQuestion) -> String {
    match question.control {
        InputControl::Heading => format!(" -- {}", question.text),
        InputControl::Paragraph => format!("    {}", question.text),
        InputControl::Unsupported => format!(
            "    Unknown question type: {}",
            question.kind.as_str()
        ),
        _ => {
            let mut entry = format!(" - {} ({})", question.id, question.text);
            if question.required {
                entry.push_str(" [required]");
            }
            if let Some(current_value) = &question.current_value {
                entry.push_str(&format!(" = {}", value_to_display(question, current_value)));
            } else if !question.options.is_empty() {
                let choices = question
                    .options
                    .iter()
                    .map(|option| format!("{}={}", option.value, option.display_label()))
                    .collect::<Vec<_>>();
                entry.push_str(&format!(" <{}>", choices.join(", ")));
            }
            entry
        }
    }
}

fn value_to_display(question: &RenderQuestion, value: &Value) -> String {
    let label = |raw: &str| {
        question
            .options
            .iter()
            .find(|option| option.value == raw)
            .map(|option| option.display_label().to_string())
            .unwrap_or_else(|| raw.to_string())
    };
    match value {
        Value::String(text) if !question.options.is_empty() => label(text),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Array(values) => values
            .iter()
            .filter_map(Value::as_str)
            .map(label)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
