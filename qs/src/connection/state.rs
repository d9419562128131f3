//! Connection state machine values

use serde::{Deserialize, Serialize};

/// Lifecycle state of the hub connection
///
/// `Disconnected -> Connecting -> Connected -> Reconnecting -> Connected`, with
/// `Disconnected` reached again only by teardown, handshake rejection, or
/// exhausted retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    /// Whether a link exists or is being established
    pub fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}
