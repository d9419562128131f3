//! Store actor messages
//!
//! Commands, responses and change notifications for the store actor.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{AnswerOrigin, Question, QuestionView};

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Channel error")]
    ChannelError,
}

/// Response from store operations
pub type StoreResponse<T> = Result<T, StoreError>;

/// Result of applying an answer to a question's slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The slot was empty and now holds the answer
    Stored,
    /// An existing answer of equal or lower authority was overwritten
    Replaced,
    /// An optimistic write hit a confirmed answer and was ignored
    Rejected,
}

impl ApplyOutcome {
    /// Whether the slot now holds the written value
    pub fn is_applied(&self) -> bool {
        !matches!(self, ApplyOutcome::Rejected)
    }
}

/// Change notification broadcast after every accepted mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A new question was inserted
    QuestionAdded { question_id: String },
    /// A question's answer slot changed
    AnswerChanged { question_id: String, origin: AnswerOrigin },
    /// An optimistic answer was undone because it was never sent
    AnswerRolledBack { question_id: String },
}

impl StoreEvent {
    pub fn question_id(&self) -> &str {
        match self {
            StoreEvent::QuestionAdded { question_id }
            | StoreEvent::AnswerChanged { question_id, .. }
            | StoreEvent::AnswerRolledBack { question_id } => question_id,
        }
    }
}

/// Commands sent to the store actor
#[derive(Debug)]
pub enum StoreCommand {
    ApplyQuestion {
        question: Question,
        reply: oneshot::Sender<bool>,
    },
    ApplyAnswer {
        question_id: String,
        answer: String,
        origin: AnswerOrigin,
        reply: oneshot::Sender<ApplyOutcome>,
    },
    RollbackOptimistic {
        question_id: String,
        answer: String,
        reply: oneshot::Sender<bool>,
    },
    Get {
        question_id: String,
        reply: oneshot::Sender<Option<QuestionView>>,
    },
    List {
        reply: oneshot::Sender<Vec<QuestionView>>,
    },

    // Shutdown
    Shutdown,
}
