use serde::Serialize;
use tracing::debug;

use crate::answers::AnswerStore;
use crate::spec::schema::SurveySchema;
use crate::validate::is_satisfied;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionState {
    pub id: String,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionState {
    pub id: String,
    pub visible: bool,
    pub revealed: bool,
    pub complete: bool,
    pub questions: Vec<QuestionState>,
}

/// Derived view of one recompute pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibilitySnapshot {
    pub sections: Vec<SectionState>,
    /// Rounded percentage of visible sections that are complete.
    pub progress: u8,
    pub ready_to_finish: bool,
}

impl VisibilitySnapshot {
    pub fn section(&self, id: &str) -> Option<&SectionState> {
        self.sections.iter().find(|section| section.id == id)
    }

    pub fn is_revealed(&self, section_id: &str) -> bool {
        self.section(section_id)
            .is_some_and(|section| section.revealed)
    }

    pub fn is_question_visible(&self, question_id: &str) -> bool {
        self.sections
            .iter()
            .flat_map(|section| section.questions.iter())
            .any(|question| question.id == question_id && question.visible)
    }

    pub fn visible_sections(&self) -> impl Iterator<Item = &SectionState> {
        self.sections.iter().filter(|section| section.visible)
    }

    pub fn visible_count(&self) -> usize {
        self.visible_sections().count()
    }

    pub fn completed_count(&self) -> usize {
        self.visible_sections()
            .filter(|section| section.complete)
            .count()
    }
}

/// Recomputes visibility, completion, reveal, and progress from scratch,
/// pruning answers of every hidden question from `answers`.
///
/// `previous` is the snapshot of the prior pass; a section it revealed stays
/// revealed while it remains visible.
pub fn recompute(
    schema: &SurveySchema,
    answers: &mut AnswerStore,
    previous: Option<&VisibilitySnapshot>,
) -> VisibilitySnapshot {
    // Pruning can hide further items whose conditions referenced the pruned
    // answers, so resolve until no answer is removed. Keys only disappear,
    // which bounds the loop by the number of stored answers.
    let mut sections = loop {
        let (sections, pruned) = resolve_visibility(schema, answers);
        if pruned == 0 {
            break sections;
        }
    };

    for (state, section) in sections.iter_mut().zip(&schema.sections) {
        state.complete = section
            .items
            .iter()
            .zip(&state.questions)
            .filter(|(item, question)| {
                question.visible && item.required && item.kind.is_input()
            })
            .all(|(item, _)| is_satisfied(item, answers.get(&item.id)));
    }

    let mut prefix_complete = true;
    for state in sections.iter_mut().filter(|state| state.visible) {
        let kept = previous.is_some_and(|snapshot| snapshot.is_revealed(&state.id));
        state.revealed = prefix_complete || kept;
        if state.revealed && !kept {
            debug!(section = %state.id, "section revealed");
        }
        prefix_complete &= state.complete;
    }

    let visible = sections.iter().filter(|state| state.visible).count();
    let completed = sections
        .iter()
        .filter(|state| state.visible && state.complete)
        .count();
    let progress = if visible == 0 {
        0
    } else {
        ((completed as f64 / visible as f64) * 100.0).round() as u8
    };

    VisibilitySnapshot {
        sections,
        progress,
        ready_to_finish: visible > 0 && completed == visible,
    }
}

/// One sweep of section and question visibility in schema order. Returns
/// the states and how many answers were pruned.
fn resolve_visibility(
    schema: &SurveySchema,
    answers: &mut AnswerStore,
) -> (Vec<SectionState>, usize) {
    let mut pruned = 0;
    let mut sections = Vec::with_capacity(schema.sections.len());

    for section in &schema.sections {
        let visible = section.is_visible(answers.as_map());
        let mut questions = Vec::with_capacity(section.items.len());

        for item in &section.items {
            let item_visible = visible && item.is_visible(answers.as_map());
            if !item_visible && answers.delete(&item.id).is_some() {
                debug!(question = %item.id, section = %section.id, "pruned hidden answer");
                pruned += 1;
            }
            questions.push(QuestionState {
                id: item.id.clone(),
                visible: item_visible,
            });
        }

        sections.push(SectionState {
            id: section.id.clone(),
            visible,
            revealed: false,
            complete: false,
            questions,
        });
    }

    (sections, pruned)
}
