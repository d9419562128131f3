//! Message types for the connection manager

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::oneshot;

use super::state::ConnectionState;
use crate::error::HubError;
use crate::hub::HubMessage;

/// Handler for a named push event; receives the invocation arguments
///
/// Handlers run one at a time on the manager task, in delivery order.
pub type EventHandler = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Requests to the connection manager task
pub enum ConnectionCommand {
    /// Open the channel unless one already exists
    Connect {
        reply: oneshot::Sender<Result<ConnectionState, HubError>>,
    },

    /// Tear down the channel and release all subscriptions
    Disconnect { reply: oneshot::Sender<()> },

    /// Register (or replace) the handler for an event name
    On {
        event_name: String,
        handler: EventHandler,
        reply: oneshot::Sender<()>,
    },

    /// Clear the handler for an event name
    Off {
        event_name: String,
        reply: oneshot::Sender<bool>,
    },

    /// Write a message to the active link; replied once the transport has written it
    Send {
        message: HubMessage,
        reply: oneshot::Sender<Result<(), HubError>>,
    },

    /// Names of events with a registered handler
    Subscriptions { reply: oneshot::Sender<Vec<String>> },

    /// Stop the manager task
    Shutdown,
}

impl ConnectionCommand {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionCommand::Connect { .. } => "Connect",
            ConnectionCommand::Disconnect { .. } => "Disconnect",
            ConnectionCommand::On { .. } => "On",
            ConnectionCommand::Off { .. } => "Off",
            ConnectionCommand::Send { .. } => "Send",
            ConnectionCommand::Subscriptions { .. } => "Subscriptions",
            ConnectionCommand::Shutdown => "Shutdown",
        }
    }
}
