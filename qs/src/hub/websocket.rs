//! WebSocket transport: thin client over `tokio-tungstenite`
//!
//! Opening a link is three steps: an HTTP negotiate call that yields a
//! connection token, the WebSocket upgrade, and the protocol handshake. After
//! that a pump task owns the socket, writing outbound frames, sending keep-alive
//! pings, and closing the link when the hub goes silent past the server timeout.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::error::Error as WsError;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::protocol::{HandshakeRequest, HandshakeResponse, HubMessage, RECORD_SEPARATOR, decode_frames, split_frames};
use super::transport::{OutboundFrame, Transport, TransportError, TransportLink};
use crate::config::HubConfig;
use crate::error::HubError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Channel capacity for each direction of a link
const LINK_CAPACITY: usize = 256;

/// Body of the negotiate response (only the fields this client uses)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NegotiateResponse {
    connection_token: Option<String>,
    connection_id: Option<String>,
    error: Option<String>,
}

/// Transport that speaks the hub protocol over a WebSocket
pub struct WebSocketTransport {
    hub_url: String,
    access_token: Option<String>,
    handshake_timeout: Duration,
    keep_alive_interval: Duration,
    server_timeout: Duration,
    http: reqwest::Client,
}

impl WebSocketTransport {
    /// Build a transport from hub configuration
    pub fn new(config: &HubConfig) -> Result<Self, TransportError> {
        debug!(url = %config.url, "WebSocketTransport::new: called");
        let http = reqwest::Client::builder()
            .timeout(config.handshake_timeout())
            .build()
            .map_err(|e| TransportError::Unavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            hub_url: config.url.trim_end_matches('/').to_string(),
            access_token: config.access_token(),
            handshake_timeout: config.handshake_timeout(),
            keep_alive_interval: config.keep_alive_interval(),
            server_timeout: config.server_timeout(),
            http,
        })
    }

    async fn negotiate(&self) -> Result<NegotiateResponse, TransportError> {
        let url = format!("{}/negotiate?negotiateVersion=1", self.hub_url);
        debug!(%url, "WebSocketTransport::negotiate: called");

        let mut request = self.http.post(&url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Unavailable(format!("Negotiate failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportError::Rejected(format!("Negotiate returned {}", status)));
        }
        if !status.is_success() {
            return Err(TransportError::Unavailable(format!("Negotiate returned {}", status)));
        }

        let body: NegotiateResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Unavailable(format!("Bad negotiate response: {}", e)))?;

        if let Some(error) = &body.error {
            return Err(TransportError::Rejected(error.clone()));
        }
        debug!(connection_id = ?body.connection_id, "WebSocketTransport::negotiate: accepted");
        Ok(body)
    }

    /// WebSocket URL for a negotiated connection
    fn socket_url(&self, connection_token: Option<&str>) -> Result<Url, TransportError> {
        let mut url =
            Url::parse(&self.hub_url).map_err(|e| TransportError::Rejected(format!("Invalid hub URL: {}", e)))?;

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => return Err(TransportError::Rejected(format!("Unsupported URL scheme: {}", other))),
        };
        url.set_scheme(scheme)
            .map_err(|_| TransportError::Rejected(format!("Cannot use scheme {}", scheme)))?;

        {
            let mut query = url.query_pairs_mut();
            if let Some(token) = connection_token {
                query.append_pair("id", token);
            }
            if let Some(token) = &self.access_token {
                query.append_pair("access_token", token);
            }
        }
        Ok(url)
    }

    /// Send the handshake and wait for the hub's verdict
    ///
    /// Returns any messages that arrived in the same payload as the response.
    async fn handshake(&self, ws: &mut WsStream) -> Result<Vec<HubMessage>, TransportError> {
        let request = HandshakeRequest::default()
            .encode()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        ws.send(Message::text(request))
            .await
            .map_err(|e| TransportError::Unavailable(format!("Handshake send failed: {}", e)))?;

        let payload = tokio::time::timeout(self.handshake_timeout, read_text(ws))
            .await
            .map_err(|_| TransportError::Unavailable("Handshake timed out".to_string()))??;

        let mut frames = split_frames(&payload);
        let first = frames
            .next()
            .ok_or_else(|| TransportError::Unavailable("Empty handshake response".to_string()))?;
        let response = HandshakeResponse::parse(first).map_err(|e| TransportError::Unavailable(e.to_string()))?;
        if let Some(error) = response.error {
            return Err(TransportError::Rejected(error));
        }

        let rest: String = frames.map(|f| format!("{}{}", f, RECORD_SEPARATOR)).collect();
        Ok(decode_frames(&rest).into_iter().filter_map(Result::ok).collect())
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self) -> Result<TransportLink, TransportError> {
        debug!(hub_url = %self.hub_url, "WebSocketTransport::open: called");
        let negotiated = self.negotiate().await?;
        let url = self.socket_url(negotiated.connection_token.as_deref())?;

        let (mut ws, _) = connect_async(url.as_str()).await.map_err(map_ws_error)?;
        let early = self.handshake(&mut ws).await?;
        info!(hub_url = %self.hub_url, "Hub handshake complete");

        let (out_tx, out_rx) = mpsc::channel(LINK_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel(LINK_CAPACITY);
        for message in early {
            let _ = in_tx.send(message).await;
        }

        tokio::spawn(pump_loop(ws, out_rx, in_tx, self.keep_alive_interval, self.server_timeout));

        Ok(TransportLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

fn map_ws_error(err: WsError) -> TransportError {
    match err {
        WsError::Http(response) => {
            let status = response.status();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                TransportError::Rejected(format!("WebSocket upgrade returned {}", status))
            } else {
                TransportError::Unavailable(format!("WebSocket upgrade returned {}", status))
            }
        }
        other => TransportError::Unavailable(format!("WebSocket connect failed: {}", other)),
    }
}

/// Read until the next text payload, skipping control frames
async fn read_text(ws: &mut WsStream) -> Result<String, TransportError> {
    while let Some(message) = ws.next().await {
        match message {
            Ok(Message::Text(text)) => return Ok(text.as_str().to_string()),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => return Err(TransportError::Unavailable(format!("Read failed: {}", e))),
        }
    }
    Err(TransportError::Unavailable("Socket closed during handshake".to_string()))
}

/// Own the socket until either side goes away
async fn pump_loop(
    ws: WsStream,
    mut out_rx: mpsc::Receiver<OutboundFrame>,
    in_tx: mpsc::Sender<HubMessage>,
    keep_alive_interval: Duration,
    server_timeout: Duration,
) {
    debug!("pump_loop: started");
    let (mut sink, mut stream) = ws.split();
    let mut keep_alive = tokio::time::interval(keep_alive_interval);
    keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut deadline = Instant::now() + server_timeout;

    loop {
        tokio::select! {
            frame = out_rx.recv() => {
                let Some(frame) = frame else {
                    debug!("pump_loop: client released link");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                let result = sink
                    .send(Message::text(frame.message.encode()))
                    .await
                    .map_err(|_| HubError::ChannelUnavailable);
                let failed = result.is_err();
                let _ = frame.ack.send(result);
                if failed {
                    warn!("pump_loop: write failed, dropping link");
                    break;
                }
            }

            _ = keep_alive.tick() => {
                if sink.send(Message::text(HubMessage::Ping.encode())).await.is_err() {
                    warn!("pump_loop: keep-alive write failed, dropping link");
                    break;
                }
            }

            _ = tokio::time::sleep_until(deadline) => {
                warn!(?server_timeout, "pump_loop: no message from hub within server timeout");
                break;
            }

            message = stream.next() => {
                deadline = Instant::now() + server_timeout;
                match message {
                    Some(Ok(Message::Text(text))) => {
                        for decoded in decode_frames(text.as_str()) {
                            match decoded {
                                Ok(HubMessage::Ping) => {}
                                Ok(message) => {
                                    if in_tx.send(message).await.is_err() {
                                        debug!("pump_loop: inbound receiver gone");
                                        return;
                                    }
                                }
                                Err(e) => warn!(error = %e, "pump_loop: dropping undecodable frame"),
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "pump_loop: hub closed socket");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "pump_loop: read failed");
                        break;
                    }
                    None => {
                        debug!("pump_loop: stream ended");
                        break;
                    }
                }
            }
        }
    }

    debug!("pump_loop: stopped");
}
