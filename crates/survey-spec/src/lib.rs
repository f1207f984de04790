#![allow(missing_docs)]

pub mod answers;
pub mod error;
pub mod expr;
pub mod render;
pub mod session;
pub mod spec;
pub mod store;
pub mod summary;
pub mod validate;
pub mod visibility;

pub use answers::{AnswerMap, AnswerStore, AnswerValue, SetOutcome};
pub use error::{
    FinishError, InvalidAnswerError, PersistenceError, SchemaLoadError, SubmitError,
    UnsupportedOperatorError,
};
pub use expr::{Clause, Combinator, CombinatorKind, Condition, Logic, Operator, evaluate};
pub use render::{
    InputControl, RenderPayload, RenderProgress, RenderQuestion, RenderSection, RenderStatus,
    build_render_payload, input_control, render_error_json, render_json_ui, render_text,
};
pub use session::SurveySession;
pub use spec::{ChoiceOption, Item, ItemType, Section, SurveySchema};
pub use store::{
    AnswerPersistence, FileFormat, FilePersistence, InlineSchema, MemoryPersistence, SchemaFile,
    SchemaSource,
};
pub use summary::{SummaryEntry, SummarySection, SurveySummary, display_answer, summarize};
pub use validate::{ValidationError, ValidationResult, is_satisfied, normalize_answer, validate};
pub use visibility::{QuestionState, SectionState, VisibilitySnapshot, recompute};
