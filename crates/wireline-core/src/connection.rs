//! Connection lifecycle for one logical session
//!
//! [`ConnectionManager`] owns the session's state machine and is the sole
//! producer of [`Event`]s. It drives a select loop over the transport,
//! classifies decoded frames, folds key rotations into the credential store,
//! and books undecryptable messages against the shared retry ledger. It
//! never reconnects on its own: it reports the close cause and leaves
//! reconnection policy to the caller.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ChannelConfig, RetryConfig};
use crate::errors::{ClientError, Result};
use crate::events::{
    ConnectionStatus, ConnectionUpdate, CredentialsUpdate, DisconnectReason, Event,
};
use crate::retry::RetryLedger;
use crate::store::CredentialStore;
use crate::transport::{BoxCodec, BoxTransport, Inbound, Outbound, TransportRead};
use crate::types::{ChatId, MessageId, SessionKeyId};

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Why the connection reached `Closed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseCause {
    /// Remote invalidated the session; `open` is refused from here on
    LoggedOut,
    /// Anything else; the caller may open again
    Recoverable(DisconnectReason),
}

impl CloseCause {
    fn from_reason(reason: DisconnectReason) -> Self {
        match reason {
            DisconnectReason::LoggedOut => CloseCause::LoggedOut,
            other => CloseCause::Recoverable(other),
        }
    }

    fn as_reason(&self) -> DisconnectReason {
        match self {
            CloseCause::LoggedOut => DisconnectReason::LoggedOut,
            CloseCause::Recoverable(reason) => reason.clone(),
        }
    }
}

impl std::fmt::Display for CloseCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_reason().fmt(f)
    }
}

/// Lifecycle state of the logical session's connection
///
/// Exactly one instance exists per session, owned exclusively by the
/// [`ConnectionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed(CloseCause),
}

impl ConnectionState {
    /// State name for logging and error context
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "Idle",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Open",
            ConnectionState::Closing => "Closing",
            ConnectionState::Closed(CloseCause::LoggedOut) => "Closed(LoggedOut)",
            ConnectionState::Closed(CloseCause::Recoverable(_)) => "Closed(Recoverable)",
        }
    }
}

// ----------------------------------------------------------------------------
// Event Stream
// ----------------------------------------------------------------------------

/// Ordered stream of events produced by one `open` call
///
/// Events travel through the stream one read cycle at a time, so everything
/// a cycle produced is available together; a consumer draining greedily can
/// never split a cycle across two batches. The stream ends when the
/// connection closes; the final event is always a connection-update carrying
/// the close cause.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Vec<Event>>,
    buffered: VecDeque<Event>,
}

impl EventStream {
    /// Wait for the next event; `None` once the connection has closed
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.buffered.pop_front() {
                return Some(event);
            }
            match self.rx.recv().await {
                Some(cycle) => self.buffered.extend(cycle),
                None => return None,
            }
        }
    }

    /// Take an event only if one is already available
    pub fn try_next(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.buffered.pop_front() {
                return Some(event);
            }
            match self.rx.try_recv() {
                Ok(cycle) => self.buffered.extend(cycle),
                Err(_) => return None,
            }
        }
    }
}

impl futures::Stream for EventStream {
    type Item = Event;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Event>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.buffered.pop_front() {
                return std::task::Poll::Ready(Some(event));
            }
            match this.rx.poll_recv(cx) {
                std::task::Poll::Ready(Some(cycle)) => this.buffered.extend(cycle),
                std::task::Poll::Ready(None) => return std::task::Poll::Ready(None),
                std::task::Poll::Pending => return std::task::Poll::Pending,
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Connection Manager
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct SendRequest {
    outbound: Outbound,
    ack: oneshot::Sender<Result<()>>,
}

/// Owner of one logical session's connection lifecycle
#[derive(Debug)]
pub struct ConnectionManager {
    credentials: Arc<CredentialStore>,
    retries: Arc<RetryLedger>,
    channels: ChannelConfig,
    retry: RetryConfig,
    state: Arc<Mutex<ConnectionState>>,
    outbound_tx: Option<mpsc::Sender<SendRequest>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    loop_handle: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Create a manager for one logical session
    ///
    /// The retry ledger is accepted by reference on purpose: it outlives any
    /// single connection, so counts survive reconnects.
    pub fn new(
        credentials: Arc<CredentialStore>,
        retries: Arc<RetryLedger>,
        channels: ChannelConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            credentials,
            retries,
            channels,
            retry,
            state: Arc::new(Mutex::new(ConnectionState::Idle)),
            outbound_tx: None,
            shutdown_tx: None,
            loop_handle: None,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Open a connection over the given transport and codec
    ///
    /// Allowed from `Idle` and from a recoverable close. After a logged-out
    /// close every call fails with [`ClientError::SessionInvalidated`].
    pub fn open(&mut self, transport: BoxTransport, codec: BoxCodec) -> Result<EventStream> {
        {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            match &*state {
                ConnectionState::Closed(CloseCause::LoggedOut) => {
                    return Err(ClientError::SessionInvalidated);
                }
                ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Closing => {
                    return Err(ClientError::config(format!(
                        "cannot open from state {}",
                        state.name()
                    )));
                }
                ConnectionState::Idle | ConnectionState::Closed(CloseCause::Recoverable(_)) => {}
            }
        }

        self.credentials.with(|creds| creds.validate())?;
        self.set_state(ConnectionState::Connecting);

        let (event_tx, event_rx) = mpsc::channel(self.channels.event_buffer_size);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.channels.outbound_buffer_size);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let connection_loop = ConnectionLoop {
            transport,
            codec,
            credentials: self.credentials.clone(),
            retries: self.retries.clone(),
            max_retry_requests: self.retry.max_retry_requests,
            state: self.state.clone(),
            events: event_tx,
            outbound_rx,
            shutdown_rx,
        };

        self.outbound_tx = Some(outbound_tx);
        self.shutdown_tx = Some(shutdown_tx);
        self.loop_handle = Some(tokio::spawn(connection_loop.run()));

        Ok(EventStream {
            rx: event_rx,
            buffered: VecDeque::new(),
        })
    }

    /// Send an application payload over the open connection
    pub async fn send(&self, payload: Vec<u8>) -> Result<()> {
        let state = self.state();
        if state != ConnectionState::Open {
            return Err(ClientError::not_open(state.name()));
        }
        let tx = self
            .outbound_tx
            .as_ref()
            .ok_or_else(|| ClientError::not_open(state.name()))?;

        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(SendRequest {
            outbound: Outbound::Payload(payload),
            ack: ack_tx,
        })
        .await
        .map_err(|_| ClientError::channel("connection loop is gone"))?;

        ack_rx
            .await
            .map_err(|_| ClientError::channel("connection loop dropped the send ack"))?
    }

    /// Close the connection and wait for the loop to finish
    ///
    /// Unblocks any pending transport read; safe to call in any state.
    pub async fn close(&mut self) {
        if let Some(shutdown) = self.shutdown_tx.take() {
            let _ = shutdown.send(true);
        }
        if let Some(handle) = self.loop_handle.take() {
            let _ = handle.await;
        }
        self.outbound_tx = None;
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }
}

// ----------------------------------------------------------------------------
// Connection Loop
// ----------------------------------------------------------------------------

/// The read/write task behind one `open` call
struct ConnectionLoop {
    transport: BoxTransport,
    codec: BoxCodec,
    credentials: Arc<CredentialStore>,
    retries: Arc<RetryLedger>,
    max_retry_requests: u32,
    state: Arc<Mutex<ConnectionState>>,
    events: mpsc::Sender<Vec<Event>>,
    outbound_rx: mpsc::Receiver<SendRequest>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ConnectionLoop {
    async fn run(mut self) {
        let _ = self
            .emit(vec![Event::ConnectionUpdate(ConnectionUpdate {
                status: ConnectionStatus::Connecting,
                cause: None,
            })])
            .await;

        let cause = self.drive().await;
        self.finish(cause).await;
    }

    async fn drive(&mut self) -> CloseCause {
        loop {
            tokio::select! {
                // A changed() error means the manager itself was dropped;
                // either way this is a local close.
                _ = self.shutdown_rx.changed() => {
                    self.set_state(ConnectionState::Closing);
                    let _ = self
                        .emit(vec![Event::ConnectionUpdate(ConnectionUpdate {
                            status: ConnectionStatus::Closing,
                            cause: None,
                        })])
                        .await;
                    return CloseCause::Recoverable(DisconnectReason::ClosedByCaller);
                }

                request = self.outbound_rx.recv() => {
                    match request {
                        Some(request) => {
                            if let Some(cause) = self.handle_outbound(request).await {
                                return cause;
                            }
                        }
                        // All senders gone: the manager handle was dropped
                        None => {
                            self.set_state(ConnectionState::Closing);
                            return CloseCause::Recoverable(DisconnectReason::ClosedByCaller);
                        }
                    }
                }

                read = self.transport.read() => {
                    match read {
                        Ok(TransportRead::Data(frame)) => {
                            if let Some(cause) = self.process_cycle(&frame).await {
                                return cause;
                            }
                        }
                        Ok(TransportRead::Closed(reason)) => {
                            return CloseCause::from_reason(reason);
                        }
                        Err(err) => {
                            return CloseCause::Recoverable(DisconnectReason::ConnectionLost {
                                reason: err.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }

    /// Process one transport read cycle
    ///
    /// Returns the close cause if this cycle ended the connection.
    async fn process_cycle(&mut self, frame: &[u8]) -> Option<CloseCause> {
        let items = match self.codec.decode(frame).await {
            Ok(items) => items,
            Err(err) => {
                warn!(error = %err, "frame decode failed");
                return Some(CloseCause::Recoverable(DisconnectReason::ConnectionLost {
                    reason: format!("frame decode failed: {err}"),
                }));
            }
        };

        let mut cycle: Vec<Event> = Vec::new();
        let mut rotated: Vec<SessionKeyId> = Vec::new();
        let mut logged_out = false;

        for item in items {
            match item {
                Inbound::KeyRotation(keys) => {
                    rotated.extend(self.credentials.apply_rotation(keys));
                }
                Inbound::HandshakeComplete => {
                    if self.current_state() == ConnectionState::Connecting {
                        self.set_state(ConnectionState::Open);
                        info!("connection open");
                        cycle.push(Event::ConnectionUpdate(ConnectionUpdate {
                            status: ConnectionStatus::Open,
                            cause: None,
                        }));
                    }
                }
                Inbound::Event(event) => cycle.push(event),
                Inbound::Undecryptable {
                    chat_id,
                    message_id,
                } => {
                    if let Some(cause) = self.handle_undecryptable(chat_id, message_id).await {
                        return Some(cause);
                    }
                }
                Inbound::LoggedOut => {
                    logged_out = true;
                    break;
                }
            }
        }

        // Rotated key material must reach consumers before anything else
        // from this cycle: a consumer persisting credentials on the update
        // never stores state older than what the cycle just used.
        if !rotated.is_empty() {
            cycle.insert(
                0,
                Event::CredentialsUpdate(CredentialsUpdate { rotated }),
            );
        }

        // The whole cycle goes out as one unit so consumers batching
        // greedily never observe half a cycle.
        if self.emit(cycle).await.is_err() {
            return Some(CloseCause::Recoverable(DisconnectReason::ConnectionLost {
                reason: "event stream dropped".into(),
            }));
        }

        if logged_out {
            Some(CloseCause::LoggedOut)
        } else {
            None
        }
    }

    /// Book an undecryptable message and request a resend while under budget
    async fn handle_undecryptable(
        &mut self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Option<CloseCause> {
        let count = self.retries.increment(&message_id);
        if count > self.max_retry_requests {
            warn!(%chat_id, %message_id, count, "retry budget exhausted, dropping message");
            return None;
        }

        debug!(%chat_id, %message_id, count, "requesting message retry");
        let frame = match self
            .codec
            .encode(Outbound::RetryRequest {
                message_id: message_id.clone(),
                count,
            })
            .await
        {
            Ok(frame) => frame,
            Err(err) => {
                warn!(%message_id, error = %err, "failed to encode retry request");
                return None;
            }
        };

        match self.transport.write(&frame).await {
            Ok(()) => None,
            Err(err) => Some(CloseCause::Recoverable(DisconnectReason::ConnectionLost {
                reason: err.to_string(),
            })),
        }
    }

    async fn handle_outbound(&mut self, request: SendRequest) -> Option<CloseCause> {
        let state = self.current_state();
        if state != ConnectionState::Open {
            let _ = request.ack.send(Err(ClientError::not_open(state.name())));
            return None;
        }

        let frame = match self.codec.encode(request.outbound).await {
            Ok(frame) => frame,
            // An encode failure spoils the request, not the link
            Err(err) => {
                let _ = request.ack.send(Err(err));
                return None;
            }
        };

        match self.transport.write(&frame).await {
            Ok(()) => {
                let _ = request.ack.send(Ok(()));
                None
            }
            Err(err) => {
                let reason = err.to_string();
                let _ = request.ack.send(Err(err));
                Some(CloseCause::Recoverable(DisconnectReason::ConnectionLost {
                    reason,
                }))
            }
        }
    }

    async fn finish(&mut self, cause: CloseCause) {
        self.set_state(ConnectionState::Closed(cause.clone()));

        // Errors in the state machine surface as a final connection-update
        // event; the policy loop is the one place deciding what happens next.
        let _ = self
            .emit(vec![Event::ConnectionUpdate(ConnectionUpdate {
                status: ConnectionStatus::Closed,
                cause: Some(cause.as_reason()),
            })])
            .await;

        info!(cause = %cause, "connection closed");
    }

    async fn emit(&self, cycle: Vec<Event>) -> core::result::Result<(), ()> {
        if cycle.is_empty() {
            return Ok(());
        }
        self.events.send(cycle).await.map_err(|_| ())
    }

    fn current_state(&self) -> ConnectionState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_state(&self, next: ConnectionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use crate::testing::{memory_transport, ScriptCodec};

    fn manager() -> ConnectionManager {
        let blob = Arc::new(MemoryBlobStore::new());
        let credentials = Arc::new(CredentialStore::load(blob, "auth/creds"));
        ConnectionManager::new(
            credentials,
            Arc::new(RetryLedger::new()),
            ChannelConfig::default(),
            RetryConfig::default(),
        )
    }

    #[tokio::test]
    async fn open_emits_connecting_then_open_on_handshake() {
        let mut manager = manager();
        let (transport, script) = memory_transport();
        let mut stream = manager
            .open(Box::new(transport), Box::new(ScriptCodec::new()))
            .unwrap();

        script.deliver(vec![Inbound::HandshakeComplete]);

        let first = stream.next().await.unwrap();
        assert!(matches!(
            first,
            Event::ConnectionUpdate(ConnectionUpdate {
                status: ConnectionStatus::Connecting,
                ..
            })
        ));
        let second = stream.next().await.unwrap();
        assert!(matches!(
            second,
            Event::ConnectionUpdate(ConnectionUpdate {
                status: ConnectionStatus::Open,
                ..
            })
        ));
        assert_eq!(manager.state(), ConnectionState::Open);

        manager.close().await;
    }

    #[tokio::test]
    async fn open_while_running_is_rejected() {
        let mut manager = manager();
        let (transport, _script) = memory_transport();
        let _stream = manager
            .open(Box::new(transport), Box::new(ScriptCodec::new()))
            .unwrap();

        let (transport2, _script2) = memory_transport();
        let err = manager
            .open(Box::new(transport2), Box::new(ScriptCodec::new()))
            .unwrap_err();
        assert!(matches!(err, ClientError::Configuration { .. }));

        manager.close().await;
    }

    #[tokio::test]
    async fn logged_out_close_is_terminal() {
        let mut manager = manager();
        let (transport, script) = memory_transport();
        let mut stream = manager
            .open(Box::new(transport), Box::new(ScriptCodec::new()))
            .unwrap();

        script.deliver(vec![Inbound::HandshakeComplete, Inbound::LoggedOut]);
        while stream.next().await.is_some() {}

        assert_eq!(manager.state(), ConnectionState::Closed(CloseCause::LoggedOut));

        let (transport2, _script2) = memory_transport();
        let err = manager
            .open(Box::new(transport2), Box::new(ScriptCodec::new()))
            .unwrap_err();
        assert!(matches!(err, ClientError::SessionInvalidated));
    }

    #[tokio::test]
    async fn send_outside_open_fails_fast() {
        let manager = manager();
        let err = manager.send(vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Transport(crate::errors::TransportError::NotOpen { .. })
        ));
    }

    #[tokio::test]
    async fn close_unblocks_a_pending_read() {
        let mut manager = manager();
        let (transport, _script) = memory_transport();
        let mut stream = manager
            .open(Box::new(transport), Box::new(ScriptCodec::new()))
            .unwrap();

        // No data ever arrives; close must still complete promptly.
        manager.close().await;
        while stream.next().await.is_some() {}
        assert!(matches!(manager.state(), ConnectionState::Closed(_)));
    }
}
