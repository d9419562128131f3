//! questionsync - live question/answer synchronization
//!
//! End-users ask questions over a persistent hub channel; administrators answer
//! them in near-real-time and every admin session sees the answer fan-out. This
//! crate is the client-side core of that channel.
//!
//! # Core Concepts
//!
//! - **One channel, many events**: a single duplex link per session, reconnected
//!   automatically, with one handler slot per event name
//! - **Exactly-once into the store**: redelivered questions are dropped by id
//! - **Confirmed beats optimistic**: local answers show immediately and are
//!   replaced (never regressed) by the hub's broadcast
//! - **Actors, not locks**: the connection manager and the store each own their
//!   state on a single task
//!
//! # Modules
//!
//! - [`connection`] - Connection manager and its handle
//! - [`router`] - De-duplicating event router
//! - [`store`] - Synchronization store
//! - [`gateway`] - Outbound admin commands
//! - [`hub`] - Wire protocol and transports
//! - [`api`] - REST backfill client
//! - [`session`] - Wiring for one admin session
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod api;
pub mod cli;
pub mod config;
pub mod connection;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod router;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use api::{ApiError, QuestionsApi};
pub use config::{ApiConfig, Config, HubConfig};
pub use connection::{ConnectionConfig, ConnectionHandle, ConnectionManager, ConnectionState};
pub use domain::{Answer, AnswerOrigin, AnswerPayload, Question, QuestionPayload, QuestionView};
pub use error::HubError;
pub use gateway::{CommandGateway, SEND_ANSWER};
pub use hub::{HubMessage, MemoryHub, MemoryPeer, MemoryTransport, Transport, TransportError, WebSocketTransport};
pub use router::{Delivery, EventRouter, RECEIVE_ANSWER, RECEIVE_QUESTION, RouteOutcome};
pub use session::AdminSession;
pub use store::{ApplyOutcome, StoreError, StoreEvent, StoreHandle, SyncStore};
