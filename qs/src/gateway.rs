//! Outbound command gateway
//!
//! Admin actions go through here: the answer is written to the store
//! optimistically, then `SendAnswer` is invoked on the hub. If the hub never
//! receives it the optimistic write is rolled back to whatever the slot showed
//! before.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::connection::ConnectionHandle;
use crate::domain::AnswerOrigin;
use crate::error::HubError;
use crate::store::StoreHandle;

/// Hub method that publishes an answer
pub const SEND_ANSWER: &str = "SendAnswer";

/// Sends admin commands to the hub
#[derive(Clone)]
pub struct CommandGateway {
    connection: ConnectionHandle,
    store: StoreHandle,
}

impl CommandGateway {
    pub fn new(connection: ConnectionHandle, store: StoreHandle) -> Self {
        Self { connection, store }
    }

    /// Answer a question
    ///
    /// Returns once the transport has written `SendAnswer`; the confirmed copy
    /// arrives later through `ReceiveAnswer`. One send attempt, no retry.
    pub async fn submit_answer(&self, question_id: &str, user_id: &str, answer: &str) -> Result<(), HubError> {
        debug!(%question_id, %user_id, "CommandGateway::submit_answer: called");

        let outcome = self
            .store
            .apply_answer(question_id, answer, AnswerOrigin::Optimistic)
            .await?;
        if !outcome.is_applied() {
            // Slot already confirmed; the hub still decides the final value
            debug!(%question_id, "CommandGateway::submit_answer: optimistic write rejected");
        }

        let arguments = vec![json!(question_id), json!(user_id), json!(answer)];
        match self.connection.send(SEND_ANSWER, arguments).await {
            Ok(()) => {
                info!(%question_id, "Answer sent");
                Ok(())
            }
            Err(err) => {
                warn!(%question_id, error = %err, "Answer not sent, rolling back");
                if outcome.is_applied() {
                    self.store.rollback_optimistic(question_id, answer).await?;
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionConfig, ConnectionManager};
    use crate::domain::Question;
    use crate::hub::{HubMessage, MemoryHub, MemoryTransport};

    async fn setup() -> (CommandGateway, ConnectionHandle, StoreHandle, MemoryHub) {
        let (transport, hub) = MemoryTransport::pair();
        let config = ConnectionConfig::default().with_join_commands(Vec::new());
        let connection = ConnectionManager::spawn(transport, config);
        let store = StoreHandle::spawn();
        store.apply_question(Question::new("q1", "u1", "Why?")).await.unwrap();
        (
            CommandGateway::new(connection.clone(), store.clone()),
            connection,
            store,
            hub,
        )
    }

    #[tokio::test]
    async fn test_submit_answer_writes_optimistic_and_sends() {
        let (gateway, connection, store, mut hub) = setup().await;
        connection.connect().await.unwrap();
        let mut peer = hub.next_peer().await.unwrap();

        gateway.submit_answer("q1", "u1", "Because").await.unwrap();

        let view = store.get("q1").await.unwrap().unwrap();
        assert_eq!(view.answer_text(), Some("Because"));
        assert_eq!(view.origin(), Some(AnswerOrigin::Optimistic));
        assert_eq!(
            peer.next_sent().await.unwrap(),
            HubMessage::invocation(SEND_ANSWER, vec![json!("q1"), json!("u1"), json!("Because")])
        );
    }

    #[tokio::test]
    async fn test_submit_answer_while_disconnected_rolls_back() {
        let (gateway, _connection, store, _hub) = setup().await;

        let err = gateway.submit_answer("q1", "u1", "Because").await.unwrap_err();
        assert_eq!(err, HubError::ChannelUnavailable);
        assert!(!store.get("q1").await.unwrap().unwrap().is_answered());
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back() {
        let (gateway, connection, store, mut hub) = setup().await;
        connection.connect().await.unwrap();
        let peer = hub.next_peer().await.unwrap();
        peer.fail_writes();

        let err = gateway.submit_answer("q1", "u1", "Because").await.unwrap_err();
        assert_eq!(err, HubError::ChannelUnavailable);
        assert!(store.get("q1").await.unwrap().unwrap().answer.is_none());
    }

    #[tokio::test]
    async fn test_failed_edit_restores_sent_answer() {
        let (gateway, connection, store, mut hub) = setup().await;
        connection.connect().await.unwrap();
        let mut peer = hub.next_peer().await.unwrap();

        gateway.submit_answer("q1", "u1", "x").await.unwrap();
        assert_eq!(peer.next_sent().await.unwrap().target(), Some(SEND_ANSWER));
        peer.fail_writes();

        let err = gateway.submit_answer("q1", "u1", "y").await.unwrap_err();
        assert_eq!(err, HubError::ChannelUnavailable);

        let view = store.get("q1").await.unwrap().unwrap();
        assert_eq!(view.answer_text(), Some("x"));
        assert_eq!(view.origin(), Some(AnswerOrigin::Optimistic));
    }

    #[tokio::test]
    async fn test_failed_send_keeps_confirmed_answer() {
        let (gateway, _connection, store, _hub) = setup().await;
        store.apply_answer("q1", "Official", AnswerOrigin::Confirmed).await.unwrap();

        assert!(gateway.submit_answer("q1", "u1", "Mine").await.is_err());
        let view = store.get("q1").await.unwrap().unwrap();
        assert_eq!(view.answer_text(), Some("Official"));
        assert_eq!(view.origin(), Some(AnswerOrigin::Confirmed));
    }
}
