//! Hub wire protocol and transports
//!
//! - [`protocol`] - JSON message framing and handshake
//! - [`transport`] - the `Transport` seam used by the connection manager
//! - [`websocket`] - negotiate + WebSocket transport for a real hub
//! - [`memory`] - in-process transport for tests and demos

pub mod memory;
pub mod protocol;
pub mod transport;
pub mod websocket;

pub use memory::{MemoryHub, MemoryPeer, MemoryTransport};
pub use protocol::{HandshakeRequest, HandshakeResponse, HubMessage, RECORD_SEPARATOR};
pub use transport::{OutboundFrame, Transport, TransportError, TransportLink};
pub use websocket::WebSocketTransport;
