//! Transport seam between the connection manager and the wire
//!
//! A transport opens one duplex link per connection attempt and completes the
//! protocol handshake before handing it over. The link is a pair of channels:
//! decoded inbound messages, and outbound frames that are acknowledged once the
//! transport has written them. The link is considered dropped when the inbound
//! channel closes.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::protocol::HubMessage;
use crate::error::HubError;

/// Errors from opening a transport link
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The hub refused the session; retrying will not help
    #[error("Handshake rejected: {0}")]
    Rejected(String),

    /// The hub could not be reached or the handshake did not complete
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Rejected(_))
    }
}

/// An outbound message plus the acknowledgement the writer fires after sending it
#[derive(Debug)]
pub struct OutboundFrame {
    pub message: HubMessage,
    pub ack: oneshot::Sender<Result<(), HubError>>,
}

impl OutboundFrame {
    pub fn new(message: HubMessage) -> (Self, oneshot::Receiver<Result<(), HubError>>) {
        let (ack, ack_rx) = oneshot::channel();
        (Self { message, ack }, ack_rx)
    }
}

/// An open, handshaken link to the hub
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::Sender<OutboundFrame>,
    pub inbound: mpsc::Receiver<HubMessage>,
}

/// Opens links to the hub
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a link and complete the handshake
    async fn open(&self) -> Result<TransportLink, TransportError>;

    /// Name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_fatality() {
        assert!(TransportError::Rejected("401".to_string()).is_fatal());
        assert!(!TransportError::Unavailable("refused".to_string()).is_fatal());
    }

    #[tokio::test]
    async fn test_outbound_frame_ack() {
        let (frame, ack_rx) = OutboundFrame::new(HubMessage::Ping);
        frame.ack.send(Ok(())).unwrap();
        assert_eq!(ack_rx.await.unwrap(), Ok(()));
    }
}
