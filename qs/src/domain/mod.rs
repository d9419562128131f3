//! Domain types for questionsync
//!
//! Questions asked by end-users, the single answer slot each one carries,
//! and the wire payloads the hub pushes for them.

mod origin;
mod payload;
mod question;

pub use origin::AnswerOrigin;
pub use payload::{AnswerPayload, QuestionPayload};
pub use question::{Answer, Question, QuestionView};
