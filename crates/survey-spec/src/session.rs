use serde_json::Value;
use tracing::{debug, info, warn};

use crate::answers::AnswerStore;
use crate::error::{FinishError, InvalidAnswerError, SchemaLoadError, SubmitError};
use crate::spec::item::Item;
use crate::spec::schema::SurveySchema;
use crate::store::{AnswerPersistence, SchemaSource};
use crate::summary::{SurveySummary, summarize};
use crate::visibility::{VisibilitySnapshot, recompute};

#[derive(Debug)]
struct ActiveSurvey {
    schema: SurveySchema,
    answers: AnswerStore,
    snapshot: VisibilitySnapshot,
    save_pending: bool,
}

#[derive(Debug)]
enum SessionState {
    Active(Box<ActiveSurvey>),
    Failed(SchemaLoadError),
}

/// One run of a survey: owns the schema, the answer store, and the latest
/// snapshot, and writes answers back through `P` after every change.
#[derive(Debug)]
pub struct SurveySession<P: AnswerPersistence> {
    persistence: P,
    state: SessionState,
}

impl<P: AnswerPersistence> SurveySession<P> {
    /// Loads the schema and stored answers. A schema failure leaves the
    /// session in a terminal error state.
    pub fn open<S: SchemaSource + ?Sized>(source: &S, persistence: P) -> Self {
        match source.load() {
            Ok(schema) => Self::with_schema(schema, persistence),
            Err(error) => {
                warn!(%error, "survey schema unavailable");
                Self {
                    persistence,
                    state: SessionState::Failed(error),
                }
            }
        }
    }

    pub fn with_schema(schema: SurveySchema, persistence: P) -> Self {
        let loaded = match persistence.load() {
            Ok(stored) => stored.unwrap_or_default(),
            Err(error) => {
                warn!(%error, "stored answers could not be loaded; starting empty");
                AnswerStore::new()
            }
        };

        let mut answers = drop_invalid(&schema, loaded.clone());
        let snapshot = recompute(&schema, &mut answers, None);
        let mut active = ActiveSurvey {
            save_pending: answers != loaded,
            schema,
            answers,
            snapshot,
        };
        if active.save_pending {
            save(&persistence, &mut active);
        }
        info!(
            sections = active.schema.sections.len(),
            answers = active.answers.len(),
            progress = active.snapshot.progress,
            "survey opened"
        );
        Self {
            persistence,
            state: SessionState::Active(Box::new(active)),
        }
    }

    pub fn error(&self) -> Option<&SchemaLoadError> {
        match &self.state {
            SessionState::Failed(error) => Some(error),
            SessionState::Active(_) => None,
        }
    }

    pub fn schema(&self) -> Option<&SurveySchema> {
        self.active().map(|active| &active.schema)
    }

    pub fn answers(&self) -> Option<&AnswerStore> {
        self.active().map(|active| &active.answers)
    }

    pub fn snapshot(&self) -> Result<&VisibilitySnapshot, &SchemaLoadError> {
        match &self.state {
            SessionState::Active(active) => Ok(&active.snapshot),
            SessionState::Failed(error) => Err(error),
        }
    }

    /// True while the last save failed and has not been retried yet.
    pub fn save_pending(&self) -> bool {
        self.active().is_some_and(|active| active.save_pending)
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    /// Validates and stores one answer, then recomputes the snapshot.
    /// Rejected answers change nothing.
    pub fn submit_answer(
        &mut self,
        question_id: &str,
        raw: &Value,
    ) -> Result<&VisibilitySnapshot, SubmitError> {
        let active = match &mut self.state {
            SessionState::Active(active) => active,
            SessionState::Failed(error) => return Err(SubmitError::Terminal(error.to_string())),
        };

        let item = answerable_item(&active.schema, &active.snapshot, question_id)
            .map_err(|error| {
                warn!(question_id, %error, "answer rejected");
                error
            })?;
        let outcome = active.answers.set(item, raw).map_err(|error| {
            warn!(question_id, %error, "answer rejected");
            error
        })?;
        debug!(question_id, ?outcome, "answer accepted");

        active.snapshot = recompute(&active.schema, &mut active.answers, Some(&active.snapshot));
        save(&self.persistence, active);
        Ok(&active.snapshot)
    }

    pub fn clear_answer(&mut self, question_id: &str) -> Result<&VisibilitySnapshot, SubmitError> {
        self.submit_answer(question_id, &Value::Null)
    }

    /// Summary of the answers once every visible section is complete.
    pub fn finish(&self) -> Result<SurveySummary, FinishError> {
        let active = match &self.state {
            SessionState::Active(active) => active,
            SessionState::Failed(error) => return Err(FinishError::Terminal(error.to_string())),
        };
        if !active.snapshot.ready_to_finish {
            return Err(FinishError::NotReady(active.snapshot.progress));
        }
        Ok(summarize(&active.schema, &active.answers, &active.snapshot))
    }

    fn active(&self) -> Option<&ActiveSurvey> {
        match &self.state {
            SessionState::Active(active) => Some(active),
            SessionState::Failed(_) => None,
        }
    }
}

fn answerable_item<'a>(
    schema: &'a SurveySchema,
    snapshot: &VisibilitySnapshot,
    question_id: &str,
) -> Result<&'a Item, InvalidAnswerError> {
    let item = schema
        .item(question_id)
        .ok_or_else(|| InvalidAnswerError::UnknownQuestion(question_id.to_string()))?;
    if !item.kind.is_input() {
        return Err(InvalidAnswerError::NotAnswerable(question_id.to_string()));
    }
    if !snapshot.is_question_visible(question_id) {
        return Err(InvalidAnswerError::Hidden(question_id.to_string()));
    }
    let revealed = schema
        .section_of(question_id)
        .is_some_and(|section| snapshot.is_revealed(&section.id));
    if !revealed {
        return Err(InvalidAnswerError::Locked(question_id.to_string()));
    }
    Ok(item)
}

/// Re-validates restored answers against their item's type. Valid values
/// are stored in normalized form; the rest are dropped.
fn drop_invalid(schema: &SurveySchema, mut answers: AnswerStore) -> AnswerStore {
    for item in schema.items() {
        let Some(raw) = answers.get(&item.id).map(|value| value.to_json()) else {
            continue;
        };
        if let Err(error) = answers.set(item, &raw) {
            warn!(question_id = %item.id, %error, "dropping invalid stored answer");
            answers.delete(&item.id);
        }
    }
    answers
}

fn save<P: AnswerPersistence>(persistence: &P, active: &mut ActiveSurvey) {
    match persistence.save(&active.answers) {
        Ok(()) => active.save_pending = false,
        Err(error) => {
            warn!(%error, "saving answers failed; keeping in-memory state");
            active.save_pending = true;
        }
    }
}
