//! Wire payloads pushed by the hub and returned by the questions API
//!
//! Fields are optional at the serde layer so that a payload missing its
//! `questionId` can be reported as a protocol error instead of failing the
//! whole frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::question::Question;
use crate::error::HubError;

/// Payload of a `ReceiveQuestion` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub text: String,
}

impl QuestionPayload {
    pub fn new(question_id: &str, user_id: &str, text: &str) -> Self {
        Self {
            question_id: Some(question_id.to_string()),
            user_id: user_id.to_string(),
            text: text.to_string(),
        }
    }

    /// Parse a payload out of a hub invocation argument
    pub fn from_value(value: &Value) -> Result<Self, HubError> {
        serde_json::from_value(value.clone()).map_err(|e| HubError::Protocol(format!("ReceiveQuestion: {}", e)))
    }

    /// Validate and convert into a domain question
    pub fn into_question(self) -> Result<Question, HubError> {
        match self.question_id {
            Some(id) if !id.trim().is_empty() => Ok(Question::new(&id, &self.user_id, &self.text)),
            _ => Err(HubError::Protocol("ReceiveQuestion payload missing questionId".to_string())),
        }
    }
}

/// Payload of a `ReceiveAnswer` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(default)]
    pub answer: String,
}

impl AnswerPayload {
    pub fn new(question_id: &str, answer: &str) -> Self {
        Self {
            question_id: Some(question_id.to_string()),
            answer: answer.to_string(),
        }
    }

    /// Parse a payload out of a hub invocation argument
    pub fn from_value(value: &Value) -> Result<Self, HubError> {
        serde_json::from_value(value.clone()).map_err(|e| HubError::Protocol(format!("ReceiveAnswer: {}", e)))
    }

    /// Validate the payload, returning `(question_id, answer)`
    pub fn validate(self) -> Result<(String, String), HubError> {
        match self.question_id {
            Some(id) if !id.trim().is_empty() => Ok((id, self.answer)),
            _ => Err(HubError::Protocol("ReceiveAnswer payload missing questionId".to_string())),
        }
    }
}
