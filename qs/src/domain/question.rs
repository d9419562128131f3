//! Questions and their answer slot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::origin::AnswerOrigin;

/// A question asked by an end-user
///
/// Immutable once created; `received_at` is local bookkeeping, not wire data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    pub user_id: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl Question {
    pub fn new(question_id: &str, user_id: &str, text: &str) -> Self {
        Self {
            question_id: question_id.to_string(),
            user_id: user_id.to_string(),
            text: text.to_string(),
            received_at: Utc::now(),
        }
    }
}

/// The current answer held for a question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub answer: String,
    pub origin: AnswerOrigin,
}

impl Answer {
    pub fn new(question_id: &str, answer: &str, origin: AnswerOrigin) -> Self {
        Self {
            question_id: question_id.to_string(),
            answer: answer.to_string(),
            origin,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.origin == AnswerOrigin::Confirmed
    }
}

/// A question paired with its resolved answer, as read by the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub question: Question,
    /// `None` means unanswered
    pub answer: Option<Answer>,
}

impl QuestionView {
    pub fn is_answered(&self) -> bool {
        self.answer.is_some()
    }

    pub fn answer_text(&self) -> Option<&str> {
        self.answer.as_ref().map(|a| a.answer.as_str())
    }

    pub fn origin(&self) -> Option<AnswerOrigin> {
        self.answer.as_ref().map(|a| a.origin)
    }
}
