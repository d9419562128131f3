//! Admin session wiring
//!
//! Builds the connection manager, store, router and gateway for one admin and
//! hands out their handles. Everything is constructor-injected; there is no
//! process-wide session.

use eyre::{Context, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::QuestionsApi;
use crate::config::Config;
use crate::connection::{ConnectionConfig, ConnectionHandle, ConnectionManager, ConnectionState};
use crate::domain::QuestionView;
use crate::error::HubError;
use crate::gateway::CommandGateway;
use crate::hub::{Transport, WebSocketTransport};
use crate::router::EventRouter;
use crate::store::StoreHandle;

/// One admin's live view of the question channel
pub struct AdminSession {
    id: Uuid,
    connection: ConnectionHandle,
    store: StoreHandle,
    router: EventRouter,
    gateway: CommandGateway,
    api: Option<QuestionsApi>,
}

impl AdminSession {
    /// Session over a real hub, as configured
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = WebSocketTransport::new(&config.hub).context("Failed to set up hub transport")?;
        let api = QuestionsApi::new(&config.api).context("Failed to set up questions API client")?;
        Ok(Self::new(transport, ConnectionConfig::from(&config.hub), Some(api)))
    }

    /// Session over any transport; `api` is optional so offline sessions skip backfill
    pub fn new<T: Transport>(transport: T, config: ConnectionConfig, api: Option<QuestionsApi>) -> Self {
        let id = Uuid::now_v7();
        debug!(%id, transport = transport.name(), "AdminSession::new: called");

        let connection = ConnectionManager::spawn(transport, config);
        let store = StoreHandle::spawn();
        let router = EventRouter::new(connection.clone(), store.clone());
        let gateway = CommandGateway::new(connection.clone(), store.clone());

        Self {
            id,
            connection,
            store,
            router,
            gateway,
            api,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn gateway(&self) -> &CommandGateway {
        &self.gateway
    }

    /// Route hub events into the store, backfill history, then connect
    ///
    /// History is in the store before the first live event can arrive, so the
    /// list keeps its asked-before order. Only a rejected handshake is an error;
    /// a failed backfill is logged.
    pub async fn start(&self) -> Result<ConnectionState> {
        debug!(id = %self.id, "AdminSession::start: called");
        self.router
            .route_to_store()
            .await
            .context("Failed to register hub events")?;

        if let Err(e) = self.backfill().await {
            warn!(id = %self.id, error = %e, "History backfill failed");
        }

        let state = self.connection.connect().await.context("Failed to connect to hub")?;
        info!(id = %self.id, %state, "Admin session started");
        Ok(state)
    }

    /// Load questions asked before this session; returns how many were new
    pub async fn backfill(&self) -> Result<usize> {
        let Some(api) = &self.api else {
            debug!("AdminSession::backfill: no API configured");
            return Ok(0);
        };
        let questions = match api.all_questions().await {
            Ok(questions) => questions,
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "Question fetch failed, retrying once");
                api.all_questions().await.context("Failed to fetch questions")?
            }
            Err(e) => return Err(e).context("Failed to fetch questions"),
        };
        let applied = self.router.backfill(questions).await;
        info!(applied, "Backfilled questions");
        Ok(applied)
    }

    /// Answer a question through the gateway
    pub async fn submit_answer(&self, question_id: &str, user_id: &str, answer: &str) -> Result<(), HubError> {
        self.gateway.submit_answer(question_id, user_id, answer).await
    }

    /// Questions in arrival order with their resolved answers
    pub async fn questions(&self) -> Result<Vec<QuestionView>> {
        self.store.list().await.context("Store unavailable")
    }

    /// Disconnect and stop both actors
    pub async fn shutdown(self) -> Result<()> {
        debug!(id = %self.id, "AdminSession::shutdown: called");
        self.connection.disconnect().await.context("Failed to disconnect")?;
        self.connection.shutdown().await.context("Failed to stop connection manager")?;
        self.store.shutdown().await.context("Failed to stop store")?;
        info!(id = %self.id, "Admin session stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{MemoryTransport, TransportError};
    use serde_json::json;
    use std::time::Duration;

    fn config() -> ConnectionConfig {
        ConnectionConfig::default().with_retry_delays(vec![Duration::ZERO])
    }

    #[tokio::test]
    async fn test_start_routes_events_into_store() {
        let (transport, mut hub) = MemoryTransport::pair();
        let session = AdminSession::new(transport, config(), None);

        assert_eq!(session.start().await.unwrap(), ConnectionState::Connected);
        let mut peer = hub.next_peer().await.unwrap();
        assert_eq!(peer.next_sent().await.unwrap().target(), Some("JoinAdmin"));

        let mut events = session.store().subscribe_events();
        peer.invoke("ReceiveQuestion", json!({"questionId": "q1", "userId": "u1", "text": "Why?"}))
            .await;
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();

        let questions = session.questions().await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question.text, "Why?");
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_surfaces_rejection() {
        let (transport, hub) = MemoryTransport::pair();
        hub.fail_next(TransportError::Rejected("Unauthorized".to_string())).await;
        let session = AdminSession::new(transport, config(), None);

        let err = session.start().await.unwrap_err();
        assert!(format!("{:?}", err).contains("Unauthorized"));
        assert_eq!(session.connection().state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_backfill_without_api_is_noop() {
        let (transport, _hub) = MemoryTransport::pair();
        let session = AdminSession::new(transport, config(), None);
        assert_eq!(session.backfill().await.unwrap(), 0);
    }
}
