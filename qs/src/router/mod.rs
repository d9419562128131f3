//! Event router
//!
//! Sits between the connection manager and the store. Every delivery is tagged
//! with a per-event sequence number; `ReceiveQuestion` is de-duplicated by
//! question id so each question reaches the store once, and `ReceiveAnswer` is
//! forwarded as a confirmed answer. Malformed payloads are logged and dropped.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::connection::ConnectionHandle;
use crate::domain::{AnswerOrigin, AnswerPayload, QuestionPayload};
use crate::error::HubError;
use crate::store::StoreHandle;

/// Hub event carrying a newly asked question
pub const RECEIVE_QUESTION: &str = "ReceiveQuestion";

/// Hub event carrying a confirmed answer
pub const RECEIVE_ANSWER: &str = "ReceiveAnswer";

/// One push event as seen by a router handler
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub event_name: String,
    /// Router-assigned, strictly increasing per event name, starting at 1
    pub sequence: u64,
    pub arguments: Vec<Value>,
}

/// What happened to a routed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Forwarded to the store
    Applied,
    /// Already delivered earlier; dropped
    Duplicate,
    /// Malformed; dropped
    Dropped,
}

struct Inner {
    connection: ConnectionHandle,
    store: StoreHandle,
    watermarks: Mutex<HashMap<String, u64>>,
    seen: Mutex<HashSet<String>>,
}

/// De-duplicating dispatcher from hub events into the store
#[derive(Clone)]
pub struct EventRouter {
    inner: Arc<Inner>,
}

impl EventRouter {
    pub fn new(connection: ConnectionHandle, store: StoreHandle) -> Self {
        debug!("EventRouter::new: called");
        Self {
            inner: Arc::new(Inner {
                connection,
                store,
                watermarks: Mutex::new(HashMap::new()),
                seen: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Register a handler for an event, replacing any previous one
    ///
    /// Sequence numbers continue across re-registration and reconnects.
    pub async fn register<F, Fut>(&self, event_name: &str, handler: F) -> Result<(), HubError>
    where
        F: Fn(Delivery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        debug!(%event_name, "EventRouter::register: called");
        let inner = self.inner.clone();
        let handler = Arc::new(handler);
        let name = event_name.to_string();

        self.inner
            .connection
            .on(event_name, move |arguments| {
                let inner = inner.clone();
                let handler = handler.clone();
                let event_name = name.clone();
                async move {
                    let sequence = inner.next_sequence(&event_name).await;
                    handler(Delivery {
                        event_name,
                        sequence,
                        arguments,
                    })
                    .await;
                }
            })
            .await
    }

    /// Wire `ReceiveQuestion` and `ReceiveAnswer` into the store
    pub async fn route_to_store(&self) -> Result<(), HubError> {
        debug!("EventRouter::route_to_store: called");

        let router = self.clone();
        self.register(RECEIVE_QUESTION, move |delivery| {
            let router = router.clone();
            async move {
                router.on_question(delivery).await;
            }
        })
        .await?;

        let router = self.clone();
        self.register(RECEIVE_ANSWER, move |delivery| {
            let router = router.clone();
            async move {
                router.on_answer(delivery).await;
            }
        })
        .await
    }

    /// Feed questions fetched over REST through the live question path
    ///
    /// Returns how many were new.
    pub async fn backfill(&self, questions: Vec<QuestionPayload>) -> usize {
        debug!(count = questions.len(), "EventRouter::backfill: called");
        let mut applied = 0;
        for payload in questions {
            if self.accept_question(payload).await == RouteOutcome::Applied {
                applied += 1;
            }
        }
        applied
    }

    /// Highest sequence number assigned so far for an event (0 if none)
    pub async fn watermark(&self, event_name: &str) -> u64 {
        self.inner.watermarks.lock().await.get(event_name).copied().unwrap_or(0)
    }

    async fn on_question(&self, delivery: Delivery) -> RouteOutcome {
        match first_argument(&delivery).and_then(QuestionPayload::from_value) {
            Ok(payload) => self.accept_question(payload).await,
            Err(err) => drop_malformed(&delivery, &err),
        }
    }

    async fn accept_question(&self, payload: QuestionPayload) -> RouteOutcome {
        let question = match payload.into_question() {
            Ok(question) => question,
            Err(err) => {
                warn!(error = %err, "Dropping malformed question");
                return RouteOutcome::Dropped;
            }
        };

        if !self.inner.seen.lock().await.insert(question.question_id.clone()) {
            debug!(question_id = %question.question_id, "EventRouter: duplicate question dropped");
            return RouteOutcome::Duplicate;
        }

        let question_id = question.question_id.clone();
        match self.inner.store.apply_question(question).await {
            Ok(_) => RouteOutcome::Applied,
            Err(err) => {
                warn!(%question_id, error = %err, "Store unavailable, question lost");
                self.inner.seen.lock().await.remove(&question_id);
                RouteOutcome::Dropped
            }
        }
    }

    async fn on_answer(&self, delivery: Delivery) -> RouteOutcome {
        let (question_id, answer) = match first_argument(&delivery)
            .and_then(AnswerPayload::from_value)
            .and_then(AnswerPayload::validate)
        {
            Ok(fields) => fields,
            Err(err) => return drop_malformed(&delivery, &err),
        };

        match self
            .inner
            .store
            .apply_answer(&question_id, &answer, AnswerOrigin::Confirmed)
            .await
        {
            Ok(outcome) => {
                debug!(%question_id, ?outcome, "EventRouter: confirmed answer applied");
                RouteOutcome::Applied
            }
            Err(err) => {
                warn!(%question_id, error = %err, "Store unavailable, answer lost");
                RouteOutcome::Dropped
            }
        }
    }
}

impl Inner {
    async fn next_sequence(&self, event_name: &str) -> u64 {
        let mut watermarks = self.watermarks.lock().await;
        let sequence = watermarks.entry(event_name.to_string()).or_insert(0);
        *sequence += 1;
        *sequence
    }
}

fn first_argument(delivery: &Delivery) -> Result<&Value, HubError> {
    delivery
        .arguments
        .first()
        .ok_or_else(|| HubError::Protocol(format!("{} delivered without arguments", delivery.event_name)))
}

fn drop_malformed(delivery: &Delivery, err: &HubError) -> RouteOutcome {
    warn!(
        event_name = %delivery.event_name,
        sequence = delivery.sequence,
        error = %err,
        "Dropping malformed payload"
    );
    RouteOutcome::Dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionConfig, ConnectionManager};
    use crate::hub::MemoryTransport;
    use serde_json::json;

    fn router() -> (EventRouter, StoreHandle) {
        let (transport, _hub) = MemoryTransport::pair();
        let connection = ConnectionManager::spawn(transport, ConnectionConfig::default());
        let store = StoreHandle::spawn();
        (EventRouter::new(connection, store.clone()), store)
    }

    fn delivery(event_name: &str, sequence: u64, argument: Value) -> Delivery {
        Delivery {
            event_name: event_name.to_string(),
            sequence,
            arguments: vec![argument],
        }
    }

    #[tokio::test]
    async fn test_question_reaches_store_once() {
        let (router, store) = router();
        let payload = json!({"questionId": "q1", "userId": "u1", "text": "Why?"});

        assert_eq!(
            router.on_question(delivery(RECEIVE_QUESTION, 1, payload.clone())).await,
            RouteOutcome::Applied
        );
        assert_eq!(
            router.on_question(delivery(RECEIVE_QUESTION, 2, payload)).await,
            RouteOutcome::Duplicate
        );
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_question_is_dropped() {
        let (router, store) = router();
        let outcome = router
            .on_question(delivery(RECEIVE_QUESTION, 1, json!({"userId": "u1", "text": "?"})))
            .await;
        assert_eq!(outcome, RouteOutcome::Dropped);

        let empty = Delivery {
            event_name: RECEIVE_QUESTION.to_string(),
            sequence: 2,
            arguments: Vec::new(),
        };
        assert_eq!(router.on_question(empty).await, RouteOutcome::Dropped);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answer_is_forwarded_as_confirmed() {
        let (router, store) = router();
        router
            .on_question(delivery(RECEIVE_QUESTION, 1, json!({"questionId": "q1", "userId": "u1", "text": "?"})))
            .await;

        let outcome = router
            .on_answer(delivery(RECEIVE_ANSWER, 1, json!({"questionId": "q1", "answer": "42"})))
            .await;
        assert_eq!(outcome, RouteOutcome::Applied);

        let view = store.get("q1").await.unwrap().unwrap();
        assert_eq!(view.answer_text(), Some("42"));
        assert_eq!(view.origin(), Some(AnswerOrigin::Confirmed));
    }

    #[tokio::test]
    async fn test_malformed_answer_is_dropped() {
        let (router, _store) = router();
        let outcome = router.on_answer(delivery(RECEIVE_ANSWER, 1, json!({"answer": "42"}))).await;
        assert_eq!(outcome, RouteOutcome::Dropped);
        let outcome = router.on_answer(delivery(RECEIVE_ANSWER, 2, json!("not an object"))).await;
        assert_eq!(outcome, RouteOutcome::Dropped);
    }

    #[tokio::test]
    async fn test_backfill_shares_dedup_with_live_path() {
        let (router, store) = router();
        router
            .on_question(delivery(RECEIVE_QUESTION, 1, json!({"questionId": "q1", "userId": "u1", "text": "?"})))
            .await;

        let applied = router
            .backfill(vec![
                QuestionPayload::new("q1", "u1", "?"),
                QuestionPayload::new("q2", "u2", "!"),
                QuestionPayload::new("q2", "u2", "!"),
            ])
            .await;
        assert_eq!(applied, 1);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sequence_is_per_event() {
        let (router, _store) = router();
        assert_eq!(router.inner.next_sequence(RECEIVE_QUESTION).await, 1);
        assert_eq!(router.inner.next_sequence(RECEIVE_QUESTION).await, 2);
        assert_eq!(router.inner.next_sequence(RECEIVE_ANSWER).await, 1);
        assert_eq!(router.watermark(RECEIVE_QUESTION).await, 2);
        assert_eq!(router.watermark("Unknown").await, 0);
    }
}
