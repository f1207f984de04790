mod logging;
mod wizard;

use std::collections::BTreeSet;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use survey_spec::{
    AnswerPersistence, AnswerStore, FilePersistence, InputControl, ItemType, MemoryPersistence,
    PersistenceError, RenderPayload, RenderQuestion, RenderSection, RenderStatus, SchemaFile,
    SchemaSource, SubmitError, SurveySchema, SurveySession, ValidationResult,
    build_render_payload, render_error_json, render_json_ui, render_text, validate,
};
use tracing::{debug, info};
use wizard::{AnswerParseError, PromptContext, Verbosity, WizardPresenter};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Answer file used when `--answers` is not given.
const ANSWERS_ENV: &str = "SURVEY_ANSWERS";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Text front end for conditional surveys",
    long_about = "Evaluates a survey schema against stored answers: shows the visible sections, records answers, validates answer files and prints the completion summary"
)]
struct Cli {
    /// Log engine decisions (pruning, reveals, rejections) to stderr.
    #[arg(long, global = true, alias = "debug")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
struct SurveyArgs {
    /// Path to the survey schema JSON.
    #[arg(long, value_name = "SCHEMA")]
    schema: PathBuf,
    /// Answer file (JSON, or CBOR when it ends in `.cbor`). Defaults to SURVEY_ANSWERS.
    #[arg(long, value_name = "ANSWERS")]
    answers: Option<PathBuf>,
}

impl SurveyArgs {
    fn open(self) -> SurveySession<AnswerBackend> {
        SurveySession::open(
            &SchemaFile::new(self.schema),
            AnswerBackend::resolve(self.answers),
        )
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print which sections and questions are visible for the stored answers.
    Status {
        #[command(flatten)]
        survey: SurveyArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Record one answer and print the updated state.
    Answer {
        #[command(flatten)]
        survey: SurveyArgs,
        /// Question id.
        #[arg(long)]
        question: String,
        /// Answer as JSON (`"2"`, `true`, `["a","b"]`); anything else is taken as text.
        #[arg(long, allow_hyphen_values = true)]
        value: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Remove the stored answer of a question.
    Clear {
        #[command(flatten)]
        survey: SurveyArgs,
        #[arg(long)]
        question: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Check an answer file against the schema.
    Validate {
        #[command(flatten)]
        survey: SurveyArgs,
    },
    /// Print the summary of a finished survey.
    Summary {
        #[command(flatten)]
        survey: SurveyArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the JSON Schema of the survey schema format.
    Schema,
    /// Answer the survey interactively.
    Run {
        #[command(flatten)]
        survey: SurveyArgs,
    },
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);
    match cli.command {
        Command::Status { survey, format } => run_status(survey, format),
        Command::Answer {
            survey,
            question,
            value,
            format,
        } => run_answer(survey, &question, parse_value_arg(&value), format),
        Command::Clear {
            survey,
            question,
            format,
        } => run_answer(survey, &question, Value::Null, format),
        Command::Validate { survey } => run_validate(survey),
        Command::Summary { survey, format } => run_summary(survey, format),
        Command::Schema => run_schema(),
        Command::Run { survey } => run_wizard(survey, cli.verbose),
    }
}

/// Where answers live between invocations.
enum AnswerBackend {
    File(FilePersistence),
    Memory(MemoryPersistence),
}

impl AnswerBackend {
    fn resolve(path: Option<PathBuf>) -> Self {
        let path = path.or_else(|| {
            env::var_os(ANSWERS_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        });
        match path {
            Some(path) => {
                debug!(path = %path.display(), "using answer file");
                AnswerBackend::File(FilePersistence::new(path))
            }
            None => {
                info!("no answer file given; answers are kept for this run only");
                AnswerBackend::Memory(MemoryPersistence::new())
            }
        }
    }
}

impl AnswerPersistence for AnswerBackend {
    fn load(&self) -> Result<Option<AnswerStore>, PersistenceError> {
        match self {
            AnswerBackend::File(file) => file.load(),
            AnswerBackend::Memory(memory) => memory.load(),
        }
    }

    fn save(&self, answers: &AnswerStore) -> Result<(), PersistenceError> {
        match self {
            AnswerBackend::File(file) => file.save(answers),
            AnswerBackend::Memory(memory) => memory.save(answers),
        }
    }
}

fn parse_value_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn run_status(survey: SurveyArgs, format: OutputFormat) -> CliResult<()> {
    let session = survey.open();
    print_state(&session, format)
}

fn run_answer(
    survey: SurveyArgs,
    question_id: &str,
    value: Value,
    format: OutputFormat,
) -> CliResult<()> {
    let mut session = survey.open();
    ensure_available(&session, format)?;
    if let Err(error) = session.submit_answer(question_id, &value) {
        eprintln!("Answer rejected: {}", error);
        return Err(error.into());
    }
    print_state(&session, format)
}

fn run_validate(survey: SurveyArgs) -> CliResult<()> {
    let schema = SchemaFile::new(&survey.schema).load()?;
    let answers = match AnswerBackend::resolve(survey.answers) {
        AnswerBackend::File(file) => file.load()?.unwrap_or_default(),
        AnswerBackend::Memory(_) => {
            return Err(format!("validate needs --answers or {}", ANSWERS_ENV).into());
        }
    };

    let result = validate(&schema, &answers);
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for error in &result.errors {
            println!(
                "  {} - {} ({})",
                error.question_id.as_deref().unwrap_or("<unknown>"),
                error.message,
                error.code.as_deref().unwrap_or("invalid")
            );
        }
    }
    if !result.missing_required.is_empty() {
        println!(
            "Missing required answers: {}",
            result.missing_required.join(", ")
        );
    }
    if !result.unknown_fields.is_empty() {
        println!(
            "Unknown answer fields: {}",
            result.unknown_fields.join(", ")
        );
    }
}

fn run_summary(survey: SurveyArgs, format: OutputFormat) -> CliResult<()> {
    let session = survey.open();
    ensure_available(&session, format)?;
    let summary = session.finish()?;
    match format {
        OutputFormat::Text => println!("{}", summary.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

fn run_schema() -> CliResult<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&SurveySchema::json_schema())?
    );
    Ok(())
}

fn ensure_available<P: AnswerPersistence>(
    session: &SurveySession<P>,
    format: OutputFormat,
) -> CliResult<()> {
    let Some(error) = session.error() else {
        return Ok(());
    };
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&render_error_json(error))?);
    }
    Err(format!("survey unavailable: {}", error).into())
}

fn current_payload<P: AnswerPersistence>(session: &SurveySession<P>) -> CliResult<RenderPayload> {
    match (session.schema(), session.answers(), session.snapshot()) {
        (Some(schema), Some(answers), Ok(snapshot)) => {
            Ok(build_render_payload(schema, answers, snapshot))
        }
        (_, _, Err(error)) => Err(format!("survey unavailable: {}", error).into()),
        _ => Err("survey unavailable".into()),
    }
}

fn print_state<P: AnswerPersistence>(
    session: &SurveySession<P>,
    format: OutputFormat,
) -> CliResult<()> {
    ensure_available(session, format)?;
    let payload = current_payload(session)?;
    match format {
        OutputFormat::Text => println!("{}", render_text(&payload)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&render_json_ui(&payload))?
        ),
    }
    if session.save_pending() {
        eprintln!("Warning: answers could not be saved; changes are kept for this run only.");
    }
    Ok(())
}

fn run_wizard(survey: SurveyArgs, verbose: bool) -> CliResult<()> {
    let mut session = survey.open();
    ensure_available(&session, OutputFormat::Text)?;

    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose));
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut skipped = BTreeSet::new();

    loop {
        let payload = current_payload(&session)?;
        presenter.show_header(&payload);
        presenter.show_sections(&payload);
        presenter.show_status(&payload);

        let Some((section, question)) = next_question(&payload, &skipped) else {
            if payload.status == RenderStatus::Complete {
                let summary = session.finish()?;
                presenter.show_completion(&summary, session.save_pending());
                return Ok(());
            }
            return Err("no further questions are available; check the survey logic".into());
        };

        let prompt = PromptContext::new(section, question);
        let Some(answer) = prompt_question(&prompt, question, &presenter, &mut input)? else {
            println!();
            println!("Input closed; answers given so far are kept.");
            return Ok(());
        };
        if answer.is_null() {
            skipped.insert(question.id.clone());
            continue;
        }

        match session.submit_answer(&question.id, &answer) {
            Ok(_) => {}
            Err(error @ SubmitError::Invalid(_)) => {
                presenter.show_rejection(&error);
                continue;
            }
            Err(error) => return Err(error.into()),
        }
        let stored = session
            .answers()
            .is_some_and(|answers| answers.contains(&question.id));
        if !stored {
            if question.required {
                presenter.show_still_required(&prompt);
            } else {
                skipped.insert(question.id.clone());
            }
        }
    }
}

/// First visible, unanswered input question of the revealed sections.
fn next_question<'a>(
    payload: &'a RenderPayload,
    skipped: &BTreeSet<String>,
) -> Option<(&'a RenderSection, &'a RenderQuestion)> {
    payload
        .sections
        .iter()
        .filter(|section| section.revealed)
        .find_map(|section| {
            section
                .questions
                .iter()
                .find(|question| {
                    question.visible
                        && is_prompted(question.control)
                        && question.current_value.is_none()
                        && !skipped.contains(&question.id)
                })
                .map(|question| (section, question))
        })
}

fn is_prompted(control: InputControl) -> bool {
    !matches!(
        control,
        InputControl::Heading | InputControl::Paragraph | InputControl::Unsupported
    )
}

/// Reads until the answer parses; `None` once input is exhausted.
fn prompt_question(
    prompt: &PromptContext,
    question: &RenderQuestion,
    presenter: &WizardPresenter,
    input: &mut impl BufRead,
) -> CliResult<Option<Value>> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("survey aborted by user".into());
        }

        match parse_answer(question, trimmed) {
            Ok(value) => return Ok(Some(value)),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn parse_answer(question: &RenderQuestion, raw: &str) -> Result<Value, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        if question.required {
            return Err(AnswerParseError::new(
                "This question requires an answer.",
                None,
            ));
        }
        return Ok(Value::Null);
    }

    match question.control {
        InputControl::Toggle => parse_boolean(raw),
        InputControl::RadioButtons if matches!(question.kind, ItemType::YesNo) => {
            parse_yes_no(question, raw)
        }
        InputControl::RadioButtons | InputControl::Select => {
            parse_choice(question, raw).map(Value::String)
        }
        InputControl::MultiSelect => parse_choices(question, raw),
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn parse_boolean(raw: &str) -> Result<Value, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" => Ok(Value::Bool(true)),
        "false" | "f" | "no" | "n" => Ok(Value::Bool(false)),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

/// Option value or label first, then y/n mapped onto the first two options.
fn parse_yes_no(question: &RenderQuestion, raw: &str) -> Result<Value, AnswerParseError> {
    let by_option = parse_choice(question, raw);
    if by_option.is_ok() {
        return by_option.map(Value::String);
    }
    let index = match parse_boolean(raw) {
        Ok(Value::Bool(true)) => 0,
        Ok(_) => 1,
        Err(_) => return by_option.map(Value::String),
    };
    question
        .options
        .get(index)
        .map(|option| Value::String(option.value.clone()))
        .ok_or_else(|| AnswerParseError::new("This question has no matching option.", None))
}

fn parse_choice(question: &RenderQuestion, raw: &str) -> Result<String, AnswerParseError> {
    question
        .options
        .iter()
        .find(|option| {
            option.value.eq_ignore_ascii_case(raw) || option.display_label().eq_ignore_ascii_case(raw)
        })
        .map(|option| option.value.clone())
        .ok_or_else(|| {
            let allowed = question
                .options
                .iter()
                .map(|option| option.display_label())
                .collect::<Vec<_>>()
                .join(", ");
            AnswerParseError::new(
                format!("Choose one of: {}.", allowed),
                Some(format!("an option value or label, got '{}'", raw)),
            )
        })
}

fn parse_choices(question: &RenderQuestion, raw: &str) -> Result<Value, AnswerParseError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_choice(question, part).map(Value::String))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use serde_json::json;
    use std::fs;
    use std::path::Path;

    const TWO_SECTIONS: &str = include_str!("../../survey-spec/tests/fixtures/two_sections.json");
    const HOUSEHOLD: &str = include_str!("../../survey-spec/tests/fixtures/household.json");

    fn payload(fixture: &str, answers: &[(&str, Value)]) -> RenderPayload {
        let schema = SurveySchema::from_json_str(fixture).expect("schema");
        let mut session = SurveySession::with_schema(schema, MemoryPersistence::new());
        for (id, value) in answers {
            session.submit_answer(id, value).expect("answer");
        }
        current_payload(&session).expect("payload")
    }

    fn question<'a>(payload: &'a RenderPayload, id: &str) -> &'a RenderQuestion {
        payload
            .sections
            .iter()
            .flat_map(|section| &section.questions)
            .find(|question| question.id == id)
            .expect("question")
    }

    fn write_schema(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("schema.json");
        fs::write(&path, contents).expect("write schema");
        path
    }

    #[test]
    fn parse_answer_yes_no_accepts_labels_and_short_forms() {
        let payload = payload(HOUSEHOLD, &[]);
        let has_pets = question(&payload, "has_pets");
        assert_eq!(parse_answer(has_pets, "Yes").unwrap(), json!("1"));
        assert_eq!(parse_answer(has_pets, "n").unwrap(), json!("2"));
        assert_eq!(parse_answer(has_pets, "2").unwrap(), json!("2"));
        assert!(parse_answer(has_pets, "maybe").is_err());
        assert!(parse_answer(has_pets, "").is_err());
    }

    #[test]
    fn parse_answer_multi_select_splits_commas() {
        let payload = payload(HOUSEHOLD, &[("has_pets", json!("1"))]);
        let kinds = question(&payload, "pet_kinds");
        assert_eq!(
            parse_answer(kinds, "cat, Dog").unwrap(),
            json!(["cat", "dog"])
        );
        assert!(parse_answer(kinds, "cat, hamster").is_err());
    }

    #[test]
    fn parse_answer_optional_blank_skips() {
        let payload = payload(HOUSEHOLD, &[]);
        assert_eq!(parse_answer(question(&payload, "born"), "").unwrap(), Value::Null);
        assert_eq!(
            parse_answer(question(&payload, "agree"), "y").unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn next_question_skips_display_and_answered_items() {
        let payload = payload(HOUSEHOLD, &[("name", json!("Ada"))]);
        let (section, next) = next_question(&payload, &BTreeSet::new()).expect("next");
        assert_eq!(section.id, "about");
        assert_eq!(next.id, "born");

        let skipped = BTreeSet::from(["born".to_string()]);
        let (_, next) = next_question(&payload, &skipped).expect("next");
        assert_eq!(next.id, "has_pets");
    }

    #[test]
    fn value_argument_falls_back_to_text() {
        assert_eq!(parse_value_arg("\"2\""), json!("2"));
        assert_eq!(parse_value_arg("[\"cat\"]"), json!(["cat"]));
        assert_eq!(parse_value_arg("a friend"), json!("a friend"));
    }

    #[test]
    fn answer_command_persists_and_rejects() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let schema = write_schema(workspace.path(), TWO_SECTIONS);
        let answers = workspace.path().join("answers.json");

        Command::cargo_bin("survey")?
            .args(["answer", "--question", "Q1", "--value", "2"])
            .arg("--schema")
            .arg(&schema)
            .arg("--answers")
            .arg(&answers)
            .assert()
            .success();
        let stored: Value = serde_json::from_str(&fs::read_to_string(&answers)?)?;
        assert_eq!(stored, json!({ "Q1": "2" }));

        let output = Command::cargo_bin("survey")?
            .args(["answer", "--question", "Q1", "--value", "9"])
            .arg("--schema")
            .arg(&schema)
            .env(ANSWERS_ENV, &answers)
            .output()?;
        assert!(!output.status.success());
        assert!(String::from_utf8_lossy(&output.stderr).contains("not an option"));
        let stored: Value = serde_json::from_str(&fs::read_to_string(&answers)?)?;
        assert_eq!(stored, json!({ "Q1": "2" }));
        Ok(())
    }

    #[test]
    fn status_json_reports_sections() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let schema = write_schema(workspace.path(), TWO_SECTIONS);
        let answers = workspace.path().join("answers.cbor");
        fs::write(&answers, AnswerStore::restore(&json!({ "Q1": "2" }))?.to_cbor()?)?;

        let output = Command::cargo_bin("survey")?
            .args(["status", "--format", "json"])
            .arg("--schema")
            .arg(&schema)
            .arg("--answers")
            .arg(&answers)
            .output()?;
        assert!(output.status.success());
        let ui: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(ui["status"], "complete");
        assert_eq!(ui["sections"][1]["revealed"], true);
        Ok(())
    }

    #[test]
    fn broken_schema_exits_with_error_json() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let schema = write_schema(workspace.path(), r#"{ "title": "empty" }"#);

        let output = Command::cargo_bin("survey")?
            .args(["status", "--format", "json"])
            .arg("--schema")
            .arg(&schema)
            .output()?;
        assert!(!output.status.success());
        let body: Value = serde_json::from_slice(&output.stdout)?;
        assert_eq!(body["status"], "error");
        Ok(())
    }

    #[test]
    fn validate_command_lists_problems() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let schema = write_schema(workspace.path(), TWO_SECTIONS);
        let answers = workspace.path().join("answers.json");
        fs::write(&answers, r#"{ "Q1": "1", "Q2": "radio", "extra": "x" }"#)?;

        let output = Command::cargo_bin("survey")?
            .arg("validate")
            .arg("--schema")
            .arg(&schema)
            .arg("--answers")
            .arg(&answers)
            .output()?;
        assert!(!output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Validation result: invalid"));
        assert!(stdout.contains("Q2 - answer stored for a hidden question (hidden)"));
        assert!(stdout.contains("Unknown answer fields: extra"));
        Ok(())
    }

    #[test]
    fn summary_requires_a_finished_survey() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let schema = write_schema(workspace.path(), TWO_SECTIONS);
        let answers = workspace.path().join("answers.json");

        Command::cargo_bin("survey")?
            .arg("summary")
            .arg("--schema")
            .arg(&schema)
            .arg("--answers")
            .arg(&answers)
            .assert()
            .failure();

        fs::write(&answers, r#"{ "Q1": "2", "Q2": "radio" }"#)?;
        let output = Command::cargo_bin("survey")?
            .arg("summary")
            .arg("--schema")
            .arg(&schema)
            .arg("--answers")
            .arg(&answers)
            .output()?;
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Have you taken part before?: No"));
        assert!(stdout.contains("How did you hear about us?: radio"));
        Ok(())
    }

    #[test]
    fn schema_command_prints_json_schema() -> Result<(), Box<dyn std::error::Error>> {
        let output = Command::cargo_bin("survey")?.arg("schema").output()?;
        assert!(output.status.success());
        let schema: Value = serde_json::from_slice(&output.stdout)?;
        assert!(schema["properties"].get("questions").is_some());
        Ok(())
    }

    #[test]
    fn run_command_walks_the_survey() -> Result<(), Box<dyn std::error::Error>> {
        let workspace = assert_fs::TempDir::new()?;
        let schema = write_schema(workspace.path(), TWO_SECTIONS);
        let answers = workspace.path().join("answers.json");

        let output = Command::cargo_bin("survey")?
            .arg("run")
            .arg("--schema")
            .arg(&schema)
            .arg("--answers")
            .arg(&answers)
            .write_stdin("maybe\nno\na friend\n")
            .output()?;
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("== First time"));
        assert!(stdout.contains("Done ✅"));
        assert!(stdout.contains("How did you hear about us?: a friend"));
        assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid answer"));

        let stored: Value = serde_json::from_str(&fs::read_to_string(&answers)?)?;
        assert_eq!(stored, json!({ "Q1": "2", "Q2": "a friend" }));
        Ok(())
    }
}
