//! StoreHandle - actor that owns the SyncStore
//!
//! Processes commands one at a time, so each mutation is atomic with respect to
//! every other writer.

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use super::messages::{ApplyOutcome, StoreCommand, StoreError, StoreEvent, StoreResponse};
use super::sync_store::SyncStore;
use crate::domain::{AnswerOrigin, Question, QuestionView};

/// Handle to send commands to the store actor
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
    /// Broadcast sender for change notifications
    event_tx: broadcast::Sender<StoreEvent>,
}

impl StoreHandle {
    /// Spawn a store actor over an empty store
    pub fn spawn() -> Self {
        Self::spawn_with(SyncStore::new())
    }

    /// Spawn a store actor over an existing store
    pub fn spawn_with(store: SyncStore) -> Self {
        debug!(questions = store.len(), "StoreHandle::spawn_with: called");
        let (tx, rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(256);

        tokio::spawn(actor_loop(store, rx, event_tx.clone()));

        info!("Store actor spawned");
        Self { tx, event_tx }
    }

    /// Subscribe to change notifications (for UI refresh)
    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    /// Insert a question if new; returns whether it was inserted
    pub async fn apply_question(&self, question: Question) -> StoreResponse<bool> {
        debug!(question_id = %question.question_id, "StoreHandle::apply_question: called");
        let (reply, reply_rx) = oneshot::channel();
        self.send(StoreCommand::ApplyQuestion { question, reply }).await?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)
    }

    /// Write an answer with the given origin
    pub async fn apply_answer(&self, question_id: &str, answer: &str, origin: AnswerOrigin) -> StoreResponse<ApplyOutcome> {
        debug!(%question_id, %origin, "StoreHandle::apply_answer: called");
        let (reply, reply_rx) = oneshot::channel();
        self.send(StoreCommand::ApplyAnswer {
            question_id: question_id.to_string(),
            answer: answer.to_string(),
            origin,
            reply,
        })
        .await?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)
    }

    /// Undo an optimistic answer if the slot still holds it
    pub async fn rollback_optimistic(&self, question_id: &str, answer: &str) -> StoreResponse<bool> {
        debug!(%question_id, "StoreHandle::rollback_optimistic: called");
        let (reply, reply_rx) = oneshot::channel();
        self.send(StoreCommand::RollbackOptimistic {
            question_id: question_id.to_string(),
            answer: answer.to_string(),
            reply,
        })
        .await?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)
    }

    /// Get one question with its resolved answer
    pub async fn get(&self, question_id: &str) -> StoreResponse<Option<QuestionView>> {
        debug!(%question_id, "StoreHandle::get: called");
        let (reply, reply_rx) = oneshot::channel();
        self.send(StoreCommand::Get {
            question_id: question_id.to_string(),
            reply,
        })
        .await?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)
    }

    /// List all questions in insertion order
    pub async fn list(&self) -> StoreResponse<Vec<QuestionView>> {
        debug!("StoreHandle::list: called");
        let (reply, reply_rx) = oneshot::channel();
        self.send(StoreCommand::List { reply }).await?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)
    }

    /// Stop the actor
    pub async fn shutdown(&self) -> StoreResponse<()> {
        debug!("StoreHandle::shutdown: called");
        self.send(StoreCommand::Shutdown).await
    }

    async fn send(&self, cmd: StoreCommand) -> StoreResponse<()> {
        self.tx.send(cmd).await.map_err(|_| StoreError::ChannelError)
    }
}

/// Main actor loop
async fn actor_loop(mut store: SyncStore, mut rx: mpsc::Receiver<StoreCommand>, event_tx: broadcast::Sender<StoreEvent>) {
    debug!("Store actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::ApplyQuestion { question, reply } => {
                let question_id = question.question_id.clone();
                let inserted = store.apply_question(question);
                if inserted {
                    // Ignore send errors (no subscribers is OK)
                    let _ = event_tx.send(StoreEvent::QuestionAdded { question_id });
                }
                let _ = reply.send(inserted);
            }

            StoreCommand::ApplyAnswer {
                question_id,
                answer,
                origin,
                reply,
            } => {
                let outcome = store.apply_answer(&question_id, &answer, origin);
                if outcome.is_applied() {
                    let _ = event_tx.send(StoreEvent::AnswerChanged { question_id, origin });
                }
                let _ = reply.send(outcome);
            }

            StoreCommand::RollbackOptimistic {
                question_id,
                answer,
                reply,
            } => {
                let removed = store.rollback_optimistic(&question_id, &answer);
                if removed {
                    let _ = event_tx.send(StoreEvent::AnswerRolledBack { question_id });
                }
                let _ = reply.send(removed);
            }

            StoreCommand::Get { question_id, reply } => {
                let _ = reply.send(store.get(&question_id));
            }

            StoreCommand::List { reply } => {
                let _ = reply.send(store.list());
            }

            StoreCommand::Shutdown => {
                info!("Store actor shutting down");
                break;
            }
        }
    }

    debug!("Store actor stopped");
}
