//! Connection manager for the hub push channel
//!
//! Owns the lifecycle of one duplex link to the hub:
//! - **connect/disconnect:** idempotent open, scoped teardown
//! - **reconnect:** automatic, following the configured retry delays
//! - **on/off:** one handler slot per event name, replaced on re-registration
//!
//! State transitions are published on a watch channel so the router and UI can
//! follow connectivity without polling.

mod config;
mod manager;
mod messages;
mod state;

pub use config::ConnectionConfig;
pub use manager::{ConnectionHandle, ConnectionManager};
pub use messages::{ConnectionCommand, EventHandler};
pub use state::ConnectionState;
