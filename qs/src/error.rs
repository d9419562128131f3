//! Error types surfaced by the synchronization core

use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by the connection manager, router and gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// The hub rejected the initial handshake (auth failure, protocol mismatch).
    /// Fatal: never retried automatically.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A command was attempted while the channel was not connected
    #[error("Channel unavailable")]
    ChannelUnavailable,

    /// An inbound payload could not be interpreted
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The owning actor task is gone
    #[error("Channel error")]
    ChannelError,
}

impl HubError {
    /// Whether this error should be shown to the operator
    ///
    /// Only handshake rejection and unavailable-channel failures are user visible;
    /// everything else is handled inside the core.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, HubError::Connection(_) | HubError::ChannelUnavailable)
    }
}

impl From<StoreError> for HubError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ChannelError => HubError::ChannelError,
        }
    }
}
