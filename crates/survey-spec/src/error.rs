use std::path::PathBuf;

use thiserror::Error;

/// Fatal: without a schema no visibility can be computed.
#[derive(Debug, Error)]
pub enum SchemaLoadError {
    #[error("failed to read schema from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("schema is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("schema is missing the `questions` array")]
    MissingQuestions,
    #[error("schema is structurally invalid: {0}")]
    Structure(#[source] serde_json::Error),
    #[error("duplicate section id '{0}'")]
    DuplicateSection(String),
    #[error("duplicate item id '{0}'")]
    DuplicateItem(String),
}

/// Rejection of a single answer write. The store is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAnswerError {
    #[error("question '{0}' does not exist")]
    UnknownQuestion(String),
    #[error("question '{0}' is not currently visible")]
    Hidden(String),
    #[error("item '{0}' is display-only and cannot be answered")]
    NotAnswerable(String),
    #[error("question '{0}' is in a section that is not open yet")]
    Locked(String),
    #[error("question '{question_id}' expects {expected}")]
    TypeMismatch {
        question_id: String,
        expected: &'static str,
    },
    #[error("'{value}' is not an option of question '{question_id}'")]
    UnknownOption { question_id: String, value: String },
    #[error("'{value}' is not a date (YYYY-MM-DD) for question '{question_id}'")]
    InvalidDate { question_id: String, value: String },
}

impl InvalidAnswerError {
    /// Stable machine-readable code for reports.
    pub fn code(&self) -> &'static str {
        match self {
            InvalidAnswerError::UnknownQuestion(_) => "unknown_question",
            InvalidAnswerError::Hidden(_) => "hidden",
            InvalidAnswerError::NotAnswerable(_) => "not_answerable",
            InvalidAnswerError::Locked(_) => "locked",
            InvalidAnswerError::TypeMismatch { .. } => "type_mismatch",
            InvalidAnswerError::UnknownOption { .. } => "option_mismatch",
            InvalidAnswerError::InvalidDate { .. } => "invalid_date",
        }
    }
}

/// A clause used an operator the evaluator does not know. Evaluation fails
/// closed instead of surfacing this.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported operator '{operator}' on question '{question_id}'")]
pub struct UnsupportedOperatorError {
    pub question_id: String,
    pub operator: String,
}

/// Non-fatal: the in-memory store stays authoritative.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("answer storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode answers: {0}")]
    Encode(String),
    #[error("failed to decode answers: {0}")]
    Decode(String),
}

/// Outcome of `submit_answer` when the mutation was not applied.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("survey is unavailable: {0}")]
    Terminal(String),
    #[error(transparent)]
    Invalid(#[from] InvalidAnswerError),
}

#[derive(Debug, Error)]
pub enum FinishError {
    #[error("survey is unavailable: {0}")]
    Terminal(String),
    #[error("survey is not ready to finish ({0}% of sections complete)")]
    NotReady(u8),
}
