use std::collections::BTreeSet;

use survey_spec::{
    ChoiceOption, InputControl, RenderPayload, RenderQuestion, RenderSection, RenderStatus,
    SubmitError, SurveySummary,
};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: sections and question prompts only.
    Clean,
    /// Verbose output: status, progress, choice values.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints sections as they are revealed and prompts for their questions.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    shown_sections: BTreeSet<String>,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            header_printed: false,
            shown_sections: BTreeSet::new(),
        }
    }

    pub fn show_header(&mut self, payload: &RenderPayload) {
        if self.header_printed {
            return;
        }
        println!("Survey: {}", payload.title.as_deref().unwrap_or("Untitled"));
        self.header_printed = true;
    }

    /// Prints the display items of every section revealed since the last call.
    pub fn show_sections(&mut self, payload: &RenderPayload) {
        for section in payload.sections.iter().filter(|section| section.revealed) {
            if !self.shown_sections.insert(section.id.clone()) {
                continue;
            }
            println!();
            println!("== {}", section.title);
            for question in section.questions.iter().filter(|question| question.visible) {
                match question.control {
                    InputControl::Heading => println!("-- {}", question.text),
                    InputControl::Paragraph => println!("{}", question.text),
                    InputControl::Unsupported => {
                        println!("Unknown question type: {}", question.kind.as_str())
                    }
                    _ => {}
                }
            }
        }
    }

    pub fn show_status(&self, payload: &RenderPayload) {
        if self.verbosity.is_verbose() {
            println!(
                "Status: {} ({}%, {})",
                payload.status.as_str(),
                payload.progress.percent,
                payload.progress.label()
            );
        } else if payload.status == RenderStatus::NeedInput && payload.progress.total == 0 {
            println!("No visible sections are available; check your conditional logic.");
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = format!("[{}] {}", prompt.section, prompt.title);
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{}", line);
        if let Some(help) = &prompt.help {
            println!("{}", help);
        }
        if self.verbosity.is_verbose() && !prompt.choices.is_empty() {
            println!("Choices: {}", prompt.choices.join(", "));
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if let Some(debug) = &error.debug_message {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_rejection(&self, error: &SubmitError) {
        eprintln!("Answer rejected: {}", error);
    }

    pub fn show_still_required(&self, prompt: &PromptContext) {
        println!("'{}' must be answered before the survey can finish.", prompt.title);
    }

    pub fn show_completion(&self, summary: &SurveySummary, save_pending: bool) {
        println!();
        println!("Done ✅");
        println!("{}", summary.render_text());
        if save_pending {
            eprintln!("Warning: the latest answers could not be saved.");
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub section: String,
    pub title: String,
    pub help: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
    pub choices: Vec<String>,
}

impl PromptContext {
    pub fn new(section: &RenderSection, question: &RenderQuestion) -> Self {
        let choices = question
            .options
            .iter()
            .map(|option| format!("{}={}", option.value, option.display_label()))
            .collect();
        Self {
            section: section.title.clone(),
            title: question.text.clone(),
            help: question.help.clone(),
            required: question.required,
            hint: hint(question.control, &question.options),
            choices,
        }
    }
}

fn hint(control: InputControl, options: &[ChoiceOption]) -> Option<String> {
    let labels = || {
        options
            .iter()
            .map(ChoiceOption::display_label)
            .collect::<Vec<_>>()
            .join("/")
    };
    match control {
        InputControl::Toggle => Some("(yes/no)".to_string()),
        InputControl::DatePicker => Some("(YYYY-MM-DD)".to_string()),
        InputControl::RadioButtons | InputControl::Select if !options.is_empty() => {
            Some(format!("({})", labels()))
        }
        InputControl::MultiSelect => Some(format!("(comma-separated: {})", labels())),
        _ => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}
