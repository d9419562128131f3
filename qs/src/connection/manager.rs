//! ConnectionManager task and its cloneable handle

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::config::ConnectionConfig;
use super::messages::{ConnectionCommand, EventHandler};
use super::state::ConnectionState;
use crate::error::HubError;
use crate::hub::{HubMessage, OutboundFrame, Transport, TransportError, TransportLink};

type Attempt = BoxFuture<'static, Result<TransportLink, TransportError>>;

/// Owns the hub link, its state, and the handler registry
///
/// Runs as a single task; every command, inbound message, and connection
/// attempt outcome is processed to completion before the next one.
pub struct ConnectionManager<T: Transport> {
    transport: Arc<T>,
    config: ConnectionConfig,
    rx: mpsc::Receiver<ConnectionCommand>,
    state_tx: watch::Sender<ConnectionState>,
    handlers: HashMap<String, EventHandler>,
    link: Option<TransportLink>,
    /// In-flight open (including its backoff delay); dropping it cancels the attempt
    attempt: Option<Attempt>,
    /// Index into `config.retry_delays` for the next retry
    retry: usize,
    /// Whether the in-flight attempt is the first one after `connect()`
    initial: bool,
    /// Callers of `connect()` waiting for the handshake outcome
    waiters: Vec<oneshot::Sender<Result<ConnectionState, HubError>>>,
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager over the given transport, plus the first handle to it
    pub fn new(transport: T, config: ConnectionConfig) -> (Self, ConnectionHandle) {
        debug!(transport = transport.name(), "ConnectionManager::new: called");
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let handle = ConnectionHandle { tx, state_rx };
        let manager = Self {
            transport: Arc::new(transport),
            config,
            rx,
            state_tx,
            handlers: HashMap::new(),
            link: None,
            attempt: None,
            retry: 0,
            initial: false,
            waiters: Vec::new(),
        };
        (manager, handle)
    }

    /// Create a manager and run it on a new task, returning its handle
    pub fn spawn(transport: T, config: ConnectionConfig) -> ConnectionHandle {
        let (manager, handle) = Self::new(transport, config);
        tokio::spawn(manager.run());
        handle
    }

    /// Run the manager task until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!(transport = self.transport.name(), "ConnectionManager started");

        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(ConnectionCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },

                message = next_message(&mut self.link) => self.handle_inbound(message).await,

                outcome = next_outcome(&mut self.attempt) => self.handle_outcome(outcome).await,
            }
        }

        self.teardown();
        info!("ConnectionManager stopped");
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&mut self, next: ConnectionState) {
        let prev = self.state_tx.send_replace(next);
        if prev != next {
            info!(from = %prev, to = %next, "Connection state changed");
        }
    }

    async fn handle_command(&mut self, cmd: ConnectionCommand) {
        debug!(kind = cmd.kind(), "ConnectionManager::handle_command: called");
        match cmd {
            ConnectionCommand::Connect { reply } => self.connect(reply),

            ConnectionCommand::Disconnect { reply } => {
                self.teardown();
                let _ = reply.send(());
            }

            ConnectionCommand::On {
                event_name,
                handler,
                reply,
            } => {
                if self.handlers.insert(event_name.clone(), handler).is_some() {
                    debug!(%event_name, "ConnectionManager: replaced existing handler");
                } else {
                    debug!(%event_name, "ConnectionManager: registered handler");
                }
                let _ = reply.send(());
            }

            ConnectionCommand::Off { event_name, reply } => {
                let removed = self.handlers.remove(&event_name).is_some();
                debug!(%event_name, removed, "ConnectionManager: cleared handler");
                let _ = reply.send(removed);
            }

            ConnectionCommand::Send { message, reply } => self.send(message, reply).await,

            ConnectionCommand::Subscriptions { reply } => {
                let mut names: Vec<String> = self.handlers.keys().cloned().collect();
                names.sort();
                let _ = reply.send(names);
            }

            // Handled by the run loop
            ConnectionCommand::Shutdown => {}
        }
    }

    fn connect(&mut self, reply: oneshot::Sender<Result<ConnectionState, HubError>>) {
        match self.state() {
            ConnectionState::Disconnected => {
                self.set_state(ConnectionState::Connecting);
                self.initial = true;
                self.retry = 0;
                self.attempt = Some(self.open_after(Duration::ZERO));
                self.waiters.push(reply);
            }
            // First handshake still pending: report its outcome
            ConnectionState::Connecting => self.waiters.push(reply),
            state => {
                debug!(%state, "ConnectionManager::connect: already active");
                let _ = reply.send(Ok(state));
            }
        }
    }

    fn open_after(&self, delay: Duration) -> Attempt {
        let transport = self.transport.clone();
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            transport.open().await
        }
        .boxed()
    }

    async fn handle_outcome(&mut self, outcome: Result<TransportLink, TransportError>) {
        self.attempt = None;
        let initial = std::mem::replace(&mut self.initial, false);

        match outcome {
            Ok(link) => {
                let outbound = link.outbound.clone();
                self.link = Some(link);
                self.retry = 0;
                self.set_state(ConnectionState::Connected);
                join_commands(outbound, self.config.join_commands.clone()).await;
                self.notify_waiters(Ok(ConnectionState::Connected));
            }

            Err(err) if err.is_fatal() => {
                warn!(error = %err, initial, "Hub rejected handshake");
                self.set_state(ConnectionState::Disconnected);
                self.notify_waiters(Err(HubError::Connection(err.to_string())));
            }

            Err(err) => {
                warn!(error = %err, initial, retry = self.retry, "Hub connection attempt failed");
                self.set_state(ConnectionState::Reconnecting);
                self.schedule_retry();
                if initial {
                    // Reconnecting, or Disconnected when there are no retries
                    let state = self.state();
                    self.notify_waiters(Ok(state));
                }
            }
        }
    }

    fn schedule_retry(&mut self) {
        match self.config.retry_delay(self.retry) {
            Some(delay) => {
                self.retry += 1;
                debug!(retry = self.retry, ?delay, "ConnectionManager::schedule_retry: scheduled");
                self.attempt = Some(self.open_after(delay));
            }
            None => {
                info!(retries = self.retry, "Reconnect retries exhausted");
                self.retry = 0;
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    async fn handle_inbound(&mut self, message: Option<HubMessage>) {
        let Some(message) = message else {
            self.link_dropped(true);
            return;
        };

        match message {
            HubMessage::Invocation { target, arguments, .. } => {
                let handler = self.handlers.get(&target).cloned();
                match handler {
                    Some(handler) => handler(arguments).await,
                    None => debug!(%target, "ConnectionManager: no handler registered, dropping"),
                }
            }
            HubMessage::Close { error, allow_reconnect } => {
                info!(?error, allow_reconnect, "Hub sent close");
                self.link_dropped(allow_reconnect);
            }
            HubMessage::Completion {
                invocation_id,
                error: Some(error),
            } => warn!(%invocation_id, %error, "Hub reported invocation failure"),
            other => debug!(kind = other.kind(), "ConnectionManager: ignoring message"),
        }
    }

    fn link_dropped(&mut self, reconnect: bool) {
        self.link = None;
        if reconnect {
            warn!("Hub link dropped, reconnecting");
            self.retry = 0;
            self.set_state(ConnectionState::Reconnecting);
            self.schedule_retry();
        } else {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    async fn send(&mut self, message: HubMessage, reply: oneshot::Sender<Result<(), HubError>>) {
        let outbound = match &self.link {
            Some(link) if self.state().is_connected() => link.outbound.clone(),
            _ => {
                debug!(target = ?message.target(), "ConnectionManager::send: not connected");
                let _ = reply.send(Err(HubError::ChannelUnavailable));
                return;
            }
        };

        // The transport acknowledges through the caller's reply
        let frame = OutboundFrame { message, ack: reply };
        if let Err(mpsc::error::SendError(frame)) = outbound.send(frame).await {
            let _ = frame.ack.send(Err(HubError::ChannelUnavailable));
        }
    }

    /// Drop link, cancel any attempt, clear handlers, settle in Disconnected
    fn teardown(&mut self) {
        debug!("ConnectionManager::teardown: called");
        self.attempt = None;
        self.link = None;
        self.handlers.clear();
        self.retry = 0;
        self.initial = false;
        self.set_state(ConnectionState::Disconnected);
        self.notify_waiters(Ok(ConnectionState::Disconnected));
    }

    fn notify_waiters(&mut self, result: Result<ConnectionState, HubError>) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }
    }
}

/// Invoke each join command on a fresh link, waiting for its write
async fn join_commands(outbound: mpsc::Sender<OutboundFrame>, commands: Vec<String>) {
    for target in commands {
        debug!(%target, "join_commands: invoking");
        let (frame, ack) = OutboundFrame::new(HubMessage::invocation(&target, Vec::new()));
        if outbound.send(frame).await.is_err() {
            warn!(%target, "Join command not sent, link already closed");
            return;
        }
        match ack.await {
            Ok(Ok(())) => {}
            _ => warn!(%target, "Join command write failed"),
        }
    }
}

/// Next message on the link; pends forever when there is no link
async fn next_message(link: &mut Option<TransportLink>) -> Option<HubMessage> {
    match link {
        Some(link) => link.inbound.recv().await,
        None => std::future::pending().await,
    }
}

/// Outcome of the in-flight attempt; pends forever when there is none
async fn next_outcome(attempt: &mut Option<Attempt>) -> Result<TransportLink, TransportError> {
    match attempt {
        Some(attempt) => attempt.await,
        None => std::future::pending().await,
    }
}

/// Cloneable handle to a running [`ConnectionManager`]
#[derive(Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<ConnectionCommand>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    /// Open the channel; returns the state reached
    ///
    /// Idempotent: an active channel is returned as is. Transient failures still
    /// return `Ok` with the state after the retry was scheduled (`Reconnecting`,
    /// or `Disconnected` with no retries left); only a rejected handshake is an
    /// error.
    pub async fn connect(&self) -> Result<ConnectionState, HubError> {
        debug!("ConnectionHandle::connect: called");
        let (reply, reply_rx) = oneshot::channel();
        self.request(ConnectionCommand::Connect { reply }).await?;
        reply_rx.await.map_err(|_| HubError::ChannelError)?
    }

    /// Tear down the channel and release every subscription
    pub async fn disconnect(&self) -> Result<(), HubError> {
        debug!("ConnectionHandle::disconnect: called");
        let (reply, reply_rx) = oneshot::channel();
        self.request(ConnectionCommand::Disconnect { reply }).await?;
        reply_rx.await.map_err(|_| HubError::ChannelError)
    }

    /// Register the handler for an event, replacing any previous one
    pub async fn on<F, Fut>(&self, event_name: &str, handler: F) -> Result<(), HubError>
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        debug!(%event_name, "ConnectionHandle::on: called");
        let handler: EventHandler = Arc::new(move |args| handler(args).boxed());
        let (reply, reply_rx) = oneshot::channel();
        self.request(ConnectionCommand::On {
            event_name: event_name.to_string(),
            handler,
            reply,
        })
        .await?;
        reply_rx.await.map_err(|_| HubError::ChannelError)
    }

    /// Clear the handler for an event; returns whether one was registered
    pub async fn off(&self, event_name: &str) -> Result<bool, HubError> {
        debug!(%event_name, "ConnectionHandle::off: called");
        let (reply, reply_rx) = oneshot::channel();
        self.request(ConnectionCommand::Off {
            event_name: event_name.to_string(),
            reply,
        })
        .await?;
        reply_rx.await.map_err(|_| HubError::ChannelError)
    }

    /// Invoke a hub method; returns once the transport has written it
    pub async fn send(&self, target: &str, arguments: Vec<Value>) -> Result<(), HubError> {
        debug!(%target, "ConnectionHandle::send: called");
        let (reply, reply_rx) = oneshot::channel();
        self.request(ConnectionCommand::Send {
            message: HubMessage::invocation(target, arguments),
            reply,
        })
        .await?;
        // A writer that dies without acknowledging never sent the frame
        reply_rx.await.map_err(|_| HubError::ChannelUnavailable)?
    }

    /// Event names that currently have a handler
    pub async fn subscriptions(&self) -> Result<Vec<String>, HubError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request(ConnectionCommand::Subscriptions { reply }).await?;
        reply_rx.await.map_err(|_| HubError::ChannelError)
    }

    /// Stop the manager task
    pub async fn shutdown(&self) -> Result<(), HubError> {
        debug!("ConnectionHandle::shutdown: called");
        self.request(ConnectionCommand::Shutdown).await
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch connection state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Wait until the connection reaches the given state
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<(), HubError> {
        let mut rx = self.state_rx.clone();
        rx.wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| HubError::ChannelError)
    }

    async fn request(&self, cmd: ConnectionCommand) -> Result<(), HubError> {
        self.tx.send(cmd).await.map_err(|_| HubError::ChannelError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{MemoryHub, MemoryTransport};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(2);

    fn fast_config() -> ConnectionConfig {
        ConnectionConfig::default().with_retry_delays(vec![Duration::ZERO, Duration::from_millis(10)])
    }

    fn spawn_manager(config: ConnectionConfig) -> (ConnectionHandle, MemoryHub) {
        let (transport, hub) = MemoryTransport::pair();
        (ConnectionManager::spawn(transport, config), hub)
    }

    async fn wait_state(handle: &ConnectionHandle, state: ConnectionState) {
        tokio::time::timeout(WAIT, handle.wait_for_state(state))
            .await
            .expect("timed out waiting for state")
            .unwrap();
    }

    /// Wait until the hub has seen `count` open calls
    async fn wait_opens(hub: &MemoryHub, count: usize) {
        tokio::time::timeout(WAIT, async {
            while hub.open_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for open");
    }

    #[tokio::test]
    async fn test_connect_reaches_connected_and_joins() {
        let (handle, mut hub) = spawn_manager(fast_config());
        assert_eq!(handle.state(), ConnectionState::Disconnected);

        assert_eq!(handle.connect().await.unwrap(), ConnectionState::Connected);
        let mut peer = hub.next_peer().await.unwrap();
        assert_eq!(peer.next_sent().await.unwrap().target(), Some("JoinAdmin"));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (handle, hub) = spawn_manager(fast_config());
        handle.connect().await.unwrap();
        assert_eq!(handle.connect().await.unwrap(), ConnectionState::Connected);
        assert_eq!(hub.open_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_handshake_is_fatal() {
        let (handle, hub) = spawn_manager(fast_config());
        hub.fail_next(TransportError::Rejected("Unauthorized".to_string())).await;

        let err = handle.connect().await.unwrap_err();
        assert!(matches!(err, HubError::Connection(_)));
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(hub.open_count(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_does_not_raise() {
        let (handle, mut hub) = spawn_manager(fast_config());
        hub.fail_next(TransportError::Unavailable("refused".to_string())).await;

        assert_eq!(handle.connect().await.unwrap(), ConnectionState::Reconnecting);
        wait_state(&handle, ConnectionState::Connected).await;
        assert!(hub.next_peer().await.is_some());
        assert_eq!(hub.open_count(), 2);
    }

    #[tokio::test]
    async fn test_connect_with_no_retries_reports_disconnected() {
        let (handle, hub) = spawn_manager(fast_config().with_retry_delays(Vec::new()));
        hub.fail_next(TransportError::Unavailable("refused".to_string())).await;

        assert_eq!(handle.connect().await.unwrap(), ConnectionState::Disconnected);
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(hub.open_count(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_connects_share_one_attempt() {
        let (handle, mut hub) = spawn_manager(fast_config());
        hub.hold_opens();

        let first = tokio::spawn({
            let handle = handle.clone();
            async move { handle.connect().await }
        });
        wait_opens(&hub, 1).await;
        let second = tokio::spawn({
            let handle = handle.clone();
            async move { handle.connect().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second.is_finished());

        hub.release_opens();
        assert_eq!(first.await.unwrap().unwrap(), ConnectionState::Connected);
        assert_eq!(second.await.unwrap().unwrap(), ConnectionState::Connected);
        assert!(hub.next_peer().await.is_some());
        assert_eq!(hub.open_count(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_releases_pending_connect() {
        let (handle, hub) = spawn_manager(fast_config());
        hub.hold_opens();

        let pending = tokio::spawn({
            let handle = handle.clone();
            async move { handle.connect().await }
        });
        wait_opens(&hub, 1).await;
        handle.disconnect().await.unwrap();

        let state = tokio::time::timeout(WAIT, pending).await.unwrap().unwrap().unwrap();
        assert_eq!(state, ConnectionState::Disconnected);

        // The abandoned attempt never produces a link
        hub.release_opens();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(hub.open_count(), 1);
    }

    #[tokio::test]
    async fn test_rejection_while_reconnecting_settles_disconnected() {
        let (handle, mut hub) = spawn_manager(fast_config());
        handle.connect().await.unwrap();
        let peer = hub.next_peer().await.unwrap();
        hub.fail_next(TransportError::Rejected("Unauthorized".to_string())).await;

        drop(peer);
        wait_state(&handle, ConnectionState::Disconnected).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert_eq!(hub.open_count(), 2);

        // Still usable afterwards
        assert_eq!(handle.connect().await.unwrap(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_retries_exhausted_settles_disconnected() {
        let (handle, hub) = spawn_manager(fast_config());
        for _ in 0..3 {
            hub.fail_next(TransportError::Unavailable("refused".to_string())).await;
        }

        handle.connect().await.unwrap();
        wait_state(&handle, ConnectionState::Disconnected).await;
        // initial attempt plus one per retry delay
        assert_eq!(hub.open_count(), 3);
    }

    #[tokio::test]
    async fn test_on_replaces_previous_handler() {
        let (handle, mut hub) = spawn_manager(fast_config());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        handle
            .on("ReceiveQuestion", move |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await
            .unwrap();
        let counter = second.clone();
        handle
            .on("ReceiveQuestion", move |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await
            .unwrap();

        let (done_tx, mut done_rx) = mpsc::channel(1);
        handle
            .on("Marker", move |_| {
                let done_tx = done_tx.clone();
                async move {
                    let _ = done_tx.send(()).await;
                }
            })
            .await
            .unwrap();

        handle.connect().await.unwrap();
        let peer = hub.next_peer().await.unwrap();
        peer.invoke("ReceiveQuestion", json!({"questionId": "q1"})).await;
        peer.invoke("Marker", json!({})).await;
        tokio::time::timeout(WAIT, done_rx.recv()).await.unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(handle.subscriptions().await.unwrap(), vec!["Marker", "ReceiveQuestion"]);
    }

    #[tokio::test]
    async fn test_off_clears_handler() {
        let (handle, _hub) = spawn_manager(fast_config());
        handle.on("ReceiveAnswer", |_| async {}).await.unwrap();
        assert!(handle.off("ReceiveAnswer").await.unwrap());
        assert!(!handle.off("ReceiveAnswer").await.unwrap());
        assert!(handle.subscriptions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_link_drop_reconnects_and_rejoins() {
        let (handle, mut hub) = spawn_manager(fast_config());
        handle.connect().await.unwrap();
        let peer = hub.next_peer().await.unwrap();
        let mut states = handle.subscribe_state();
        states.mark_unchanged();

        drop(peer);
        wait_state(&handle, ConnectionState::Connected).await;
        let mut second = hub.next_peer().await.unwrap();
        assert_eq!(second.next_sent().await.unwrap().target(), Some("JoinAdmin"));
        assert!(states.has_changed().unwrap());
        assert_eq!(hub.open_count(), 2);
    }

    #[tokio::test]
    async fn test_close_with_reconnect_reconnects() {
        let (handle, mut hub) = spawn_manager(fast_config());
        handle.connect().await.unwrap();
        let peer = hub.next_peer().await.unwrap();

        peer.push(HubMessage::Close {
            error: None,
            allow_reconnect: true,
        })
        .await;
        let mut second = tokio::time::timeout(WAIT, hub.next_peer()).await.unwrap().unwrap();
        assert_eq!(second.next_sent().await.unwrap().target(), Some("JoinAdmin"));
        wait_state(&handle, ConnectionState::Connected).await;
        assert!(peer.is_closed());
        assert_eq!(hub.open_count(), 2);
    }

    #[tokio::test]
    async fn test_close_without_reconnect_disconnects() {
        let (handle, mut hub) = spawn_manager(fast_config());
        handle.connect().await.unwrap();
        let peer = hub.next_peer().await.unwrap();

        peer.push(HubMessage::Close {
            error: Some("Server shutting down".to_string()),
            allow_reconnect: false,
        })
        .await;
        wait_state(&handle, ConnectionState::Disconnected).await;
        assert_eq!(hub.open_count(), 1);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let (handle, _hub) = spawn_manager(fast_config());
        let err = handle.send("SendAnswer", vec![json!("q1")]).await.unwrap_err();
        assert_eq!(err, HubError::ChannelUnavailable);
    }

    #[tokio::test]
    async fn test_send_is_acknowledged() {
        let (handle, mut hub) = spawn_manager(fast_config().with_join_commands(Vec::new()));
        handle.connect().await.unwrap();
        let mut peer = hub.next_peer().await.unwrap();

        handle
            .send("SendAnswer", vec![json!("q1"), json!("u1"), json!("42")])
            .await
            .unwrap();
        let sent = peer.next_sent().await.unwrap();
        assert_eq!(sent.target(), Some("SendAnswer"));
    }

    #[tokio::test]
    async fn test_disconnect_clears_subscriptions_and_cancels_retry() {
        let config = ConnectionConfig::default().with_retry_delays(vec![Duration::from_secs(60)]);
        let (handle, hub) = spawn_manager(config);
        handle.on("ReceiveQuestion", |_| async {}).await.unwrap();
        hub.fail_next(TransportError::Unavailable("refused".to_string())).await;

        assert_eq!(handle.connect().await.unwrap(), ConnectionState::Reconnecting);
        handle.disconnect().await.unwrap();

        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert!(handle.subscriptions().await.unwrap().is_empty());
        assert_eq!(hub.open_count(), 1);
    }

    #[tokio::test]
    async fn test_no_handler_fires_after_disconnect() {
        let (handle, mut hub) = spawn_manager(fast_config());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        handle
            .on("ReceiveQuestion", move |_| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await
            .unwrap();
        handle.connect().await.unwrap();
        let peer = hub.next_peer().await.unwrap();

        handle.disconnect().await.unwrap();
        assert!(peer.is_closed());
        assert!(!peer.invoke("ReceiveQuestion", json!({"questionId": "q1"})).await);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
