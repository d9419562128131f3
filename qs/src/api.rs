//! Questions REST API client
//!
//! Used once per session to backfill questions asked before the hub link was up.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::ApiConfig;
use crate::domain::QuestionPayload;

const GET_ALL_QUESTIONS: &str = "Questions/GetAllQuestions";

/// Errors from the questions API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Whether a later retry could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::Network(_) => true,
            ApiError::InvalidResponse(_) => false,
        }
    }
}

/// Body of the all-questions endpoint: a bare array, or wrapped in `data`
#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionsBody {
    List(Vec<QuestionPayload>),
    Wrapped { data: Vec<QuestionPayload> },
}

/// Client for the dashboard's questions endpoints
#[derive(Debug, Clone)]
pub struct QuestionsApi {
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl QuestionsApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        debug!(base_url = %config.base_url, "QuestionsApi::new: called");
        let timeout = config.timeout();
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: normalize_base(&config.base_url),
            timeout,
        })
    }

    /// Fetch every question asked so far
    pub async fn all_questions(&self) -> Result<Vec<QuestionPayload>, ApiError> {
        let url = self.endpoint(GET_ALL_QUESTIONS);
        debug!(%url, timeout = ?self.timeout, "QuestionsApi::all_questions: called");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            debug!(%status, "all_questions: API error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: text,
            });
        }

        let questions = parse_questions(&text)?;
        debug!(count = questions.len(), "all_questions: received");
        Ok(questions)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn normalize_base(base_url: &str) -> String {
    if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    }
}

fn parse_questions(body: &str) -> Result<Vec<QuestionPayload>, ApiError> {
    match serde_json::from_str::<QuestionsBody>(body) {
        Ok(QuestionsBody::List(questions)) | Ok(QuestionsBody::Wrapped { data: questions }) => Ok(questions),
        Err(e) => Err(ApiError::InvalidResponse(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let api = QuestionsApi::new(&ApiConfig::default()).unwrap();
        assert_eq!(
            api.endpoint(GET_ALL_QUESTIONS),
            "https://localhost:7000/api/v1/Questions/GetAllQuestions"
        );

        let config = ApiConfig {
            base_url: "http://api.local/v2".to_string(),
            ..Default::default()
        };
        let api = QuestionsApi::new(&config).unwrap();
        assert_eq!(api.endpoint(GET_ALL_QUESTIONS), "http://api.local/v2/Questions/GetAllQuestions");
    }

    #[test]
    fn test_parse_bare_array() {
        let body = r#"[{"questionId":"q1","userId":"u1","text":"Why?"},{"questionId":"q2","userId":"u2","text":"How?"}]"#;
        let questions = parse_questions(body).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0], QuestionPayload::new("q1", "u1", "Why?"));
    }

    #[test]
    fn test_parse_wrapped_array() {
        let body = r#"{"data":[{"questionId":"q1","userId":"u1","text":"Why?"}]}"#;
        assert_eq!(parse_questions(body).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_keeps_entries_without_id() {
        // Validation happens in the router, alongside live events
        let body = r#"[{"userId":"u1","text":"Why?"}]"#;
        let questions = parse_questions(body).unwrap();
        assert!(questions[0].question_id.is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_questions("<html>").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_status_retryability() {
        let server = ApiError::Status {
            status: 503,
            message: "down".to_string(),
        };
        assert!(server.is_retryable());

        let client = ApiError::Status {
            status: 404,
            message: "missing".to_string(),
        };
        assert!(!client.is_retryable());
    }
}
