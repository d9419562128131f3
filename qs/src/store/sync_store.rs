//! SyncStore - questions in arrival order plus one answer slot per question

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::messages::ApplyOutcome;
use crate::domain::{Answer, AnswerOrigin, Question, QuestionView};

/// Client-side view of open questions and their answers
///
/// All methods are synchronous; callers serialize access (see [`super::StoreHandle`]).
#[derive(Debug, Default)]
pub struct SyncStore {
    /// Questions in `apply_question` order
    questions: Vec<Question>,
    known: HashSet<String>,
    /// Answer slots keyed by question id; may hold answers for questions not yet seen
    answers: HashMap<String, Answer>,
    /// Optimistic answer displaced by a newer optimistic edit, restored on rollback
    superseded: HashMap<String, Answer>,
}

impl SyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a question if its id is new
    ///
    /// Returns false (and changes nothing) when the id is already present.
    pub fn apply_question(&mut self, question: Question) -> bool {
        debug!(question_id = %question.question_id, "SyncStore::apply_question: called");
        if self.known.contains(&question.question_id) {
            debug!(question_id = %question.question_id, "SyncStore::apply_question: already present");
            return false;
        }
        self.known.insert(question.question_id.clone());
        self.questions.push(question);
        true
    }

    /// Write an answer into a question's slot, honoring origin precedence
    ///
    /// A confirmed answer is never replaced by an optimistic one. Writes of equal
    /// origin overwrite in arrival order.
    pub fn apply_answer(&mut self, question_id: &str, answer: &str, origin: AnswerOrigin) -> ApplyOutcome {
        debug!(%question_id, %origin, "SyncStore::apply_answer: called");
        let outcome = match self.answers.get(question_id) {
            None => ApplyOutcome::Stored,
            Some(existing) if existing.origin > origin => ApplyOutcome::Rejected,
            Some(_) => ApplyOutcome::Replaced,
        };

        if outcome.is_applied() {
            let previous = self
                .answers
                .insert(question_id.to_string(), Answer::new(question_id, answer, origin));
            match (origin, previous) {
                (AnswerOrigin::Optimistic, Some(previous)) => {
                    self.superseded.insert(question_id.to_string(), previous);
                }
                (AnswerOrigin::Optimistic, None) => {}
                (AnswerOrigin::Confirmed, _) => {
                    self.superseded.remove(question_id);
                }
            }
        } else {
            debug!(%question_id, "SyncStore::apply_answer: optimistic write rejected, slot is confirmed");
        }
        outcome
    }

    /// Undo an optimistic answer that was never delivered
    ///
    /// Only acts if the slot still holds exactly this optimistic value; a
    /// confirmed answer or a newer optimistic edit is left alone. The slot goes
    /// back to the optimistic answer this one displaced, or to unanswered.
    pub fn rollback_optimistic(&mut self, question_id: &str, answer: &str) -> bool {
        debug!(%question_id, "SyncStore::rollback_optimistic: called");
        let matches = self
            .answers
            .get(question_id)
            .is_some_and(|a| a.origin == AnswerOrigin::Optimistic && a.answer == answer);

        if !matches {
            // A displaced value that failed to send must not come back later
            if self.superseded.get(question_id).is_some_and(|a| a.answer == answer) {
                self.superseded.remove(question_id);
            }
            return false;
        }

        match self.superseded.remove(question_id) {
            Some(previous) => {
                debug!(%question_id, "SyncStore::rollback_optimistic: restoring previous answer");
                self.answers.insert(question_id.to_string(), previous);
            }
            None => {
                self.answers.remove(question_id);
            }
        }
        true
    }

    /// Current answer for a question id, if any
    pub fn answer(&self, question_id: &str) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    /// A single question with its resolved answer
    pub fn get(&self, question_id: &str) -> Option<QuestionView> {
        self.questions
            .iter()
            .find(|q| q.question_id == question_id)
            .map(|q| self.view(q))
    }

    /// All questions in insertion order with their resolved answers
    pub fn list(&self) -> Vec<QuestionView> {
        self.questions.iter().map(|q| self.view(q)).collect()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    fn view(&self, question: &Question) -> QuestionView {
        QuestionView {
            question: question.clone(),
            answer: self.answers.get(&question.question_id).cloned(),
        }
    }
}
