//! In-process transport
//!
//! [`MemoryTransport`] plays the client side; [`MemoryHub`] plays the hub. Each
//! successful `open` produces a [`MemoryPeer`] on the hub side that can push
//! messages, observe what the client sent, and drop the link to simulate a
//! transport failure. Used by tests and offline demos.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::debug;

use super::protocol::HubMessage;
use super::transport::{OutboundFrame, Transport, TransportError, TransportLink};
use crate::error::HubError;

/// Channel capacity for each direction of a link
const LINK_CAPACITY: usize = 64;

struct Shared {
    /// Outcomes for upcoming `open` calls; empty means accept
    script: Mutex<VecDeque<TransportError>>,
    opens: AtomicUsize,
    /// `open` waits here while false
    gate: watch::Sender<bool>,
    peers_tx: mpsc::UnboundedSender<MemoryPeer>,
}

/// Client side of the in-process hub
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

/// Hub side of the in-process transport
pub struct MemoryHub {
    shared: Arc<Shared>,
    peers_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryTransport {
    /// Create a connected transport/hub pair
    pub fn pair() -> (MemoryTransport, MemoryHub) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            script: Mutex::new(VecDeque::new()),
            opens: AtomicUsize::new(0),
            gate: watch::Sender::new(true),
            peers_tx,
        });
        (
            MemoryTransport {
                shared: shared.clone(),
            },
            MemoryHub { shared, peers_rx },
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self) -> Result<TransportLink, TransportError> {
        let attempt = self.shared.opens.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(attempt, "MemoryTransport::open: called");

        self.shared
            .gate
            .subscribe()
            .wait_for(|open| *open)
            .await
            .map_err(|_| TransportError::Unavailable("Memory hub dropped".to_string()))?;

        if let Some(err) = self.shared.script.lock().await.pop_front() {
            debug!(attempt, %err, "MemoryTransport::open: scripted failure");
            return Err(err);
        }

        let (out_tx, mut out_rx) = mpsc::channel::<OutboundFrame>(LINK_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel(LINK_CAPACITY);
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let fail_writes = Arc::new(AtomicBool::new(false));

        let writer_fail = fail_writes.clone();
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if writer_fail.load(Ordering::SeqCst) {
                    let _ = frame.ack.send(Err(HubError::ChannelUnavailable));
                    continue;
                }
                let _ = sent_tx.send(frame.message);
                let _ = frame.ack.send(Ok(()));
            }
        });

        let peer = MemoryPeer {
            inbound: in_tx,
            sent: sent_rx,
            fail_writes,
        };
        self.shared
            .peers_tx
            .send(peer)
            .map_err(|_| TransportError::Unavailable("Memory hub dropped".to_string()))?;

        Ok(TransportLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

impl MemoryHub {
    /// Make the next `open` call fail with the given error
    pub async fn fail_next(&self, err: TransportError) {
        self.shared.script.lock().await.push_back(err);
    }

    /// Park `open` calls until [`release_opens`](Self::release_opens)
    ///
    /// Calls are still counted on entry, so a held attempt shows up in
    /// [`open_count`](Self::open_count).
    pub fn hold_opens(&self) {
        self.shared.gate.send_replace(false);
    }

    /// Let parked and future `open` calls proceed
    pub fn release_opens(&self) {
        self.shared.gate.send_replace(true);
    }

    /// Number of `open` calls so far, successful or not
    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Wait for the next successfully opened link
    pub async fn next_peer(&mut self) -> Option<MemoryPeer> {
        self.peers_rx.recv().await
    }
}

/// Hub end of one open link
///
/// Dropping the peer closes the link from the hub side.
pub struct MemoryPeer {
    inbound: mpsc::Sender<HubMessage>,
    sent: mpsc::UnboundedReceiver<HubMessage>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryPeer {
    /// Push a message to the client; false if the client side is gone
    pub async fn push(&self, message: HubMessage) -> bool {
        self.inbound.send(message).await.is_ok()
    }

    /// Push an invocation with a single argument
    pub async fn invoke(&self, target: &str, argument: Value) -> bool {
        self.push(HubMessage::invocation(target, vec![argument])).await
    }

    /// Next message the client wrote to this link
    pub async fn next_sent(&mut self) -> Option<HubMessage> {
        self.sent.recv().await
    }

    /// Make the link refuse further writes from the client
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Whether the client side has released the link
    pub fn is_closed(&self) -> bool {
        self.inbound.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_open_creates_peer() {
        let (transport, mut hub) = MemoryTransport::pair();
        let mut link = transport.open().await.unwrap();
        let mut peer = hub.next_peer().await.unwrap();
        assert_eq!(hub.open_count(), 1);

        assert!(peer.invoke("ReceiveQuestion", json!({"questionId": "q1"})).await);
        let msg = link.inbound.recv().await.unwrap();
        assert_eq!(msg.target(), Some("ReceiveQuestion"));

        let (frame, ack) = OutboundFrame::new(HubMessage::invocation("JoinAdmin", vec![]));
        link.outbound.send(frame).await.unwrap();
        assert_eq!(ack.await.unwrap(), Ok(()));
        assert_eq!(peer.next_sent().await.unwrap().target(), Some("JoinAdmin"));
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let (transport, hub) = MemoryTransport::pair();
        hub.fail_next(TransportError::Rejected("Unauthorized".to_string())).await;

        let err = transport.open().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(transport.open().await.is_ok());
        assert_eq!(hub.open_count(), 2);
    }

    #[tokio::test]
    async fn test_held_open_waits_for_release() {
        let (transport, mut hub) = MemoryTransport::pair();
        hub.hold_opens();

        let pending = tokio::spawn(async move { transport.open().await.map(|_| ()) });
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!pending.is_finished());
        assert_eq!(hub.open_count(), 1);

        hub.release_opens();
        assert!(pending.await.unwrap().is_ok());
        assert!(hub.next_peer().await.is_some());
    }

    #[tokio::test]
    async fn test_dropping_peer_closes_inbound() {
        let (transport, mut hub) = MemoryTransport::pair();
        let mut link = transport.open().await.unwrap();
        let peer = hub.next_peer().await.unwrap();
        drop(peer);
        assert!(link.inbound.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_writes_are_not_acked() {
        let (transport, mut hub) = MemoryTransport::pair();
        let link = transport.open().await.unwrap();
        let peer = hub.next_peer().await.unwrap();
        peer.fail_writes();

        let (frame, ack) = OutboundFrame::new(HubMessage::Ping);
        link.outbound.send(frame).await.unwrap();
        assert_eq!(ack.await.unwrap(), Err(HubError::ChannelUnavailable));
    }
}
