//! Client runtime
//!
//! Wires the credential store, retry ledger, mirror and dispatcher around a
//! connection manager, and drives open/dispatch/close cycles under a
//! [`ReconnectPolicy`]. The same ledger and store instances are handed to
//! every connection, so protocol state survives reconnects.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use wireline_core::{
    BoxCodec, BoxTransport, ClientConfig, CloseCause, ConnectionManager, ConnectionState,
    CredentialStore, DisconnectReason, EventDispatcher, EventHandler, MirrorHandle, Result,
    RetryLedger,
};

use crate::handlers::{CredentialsSaver, MirrorBinding};
use crate::policy::{ReconnectPolicy, StandardPolicy};

// ----------------------------------------------------------------------------
// Connector Trait
// ----------------------------------------------------------------------------

/// Produces a fresh transport/codec pair for each connection attempt
#[async_trait]
pub trait Connector: Send {
    async fn connect(&mut self) -> Result<(BoxTransport, BoxCodec)>;
}

// ----------------------------------------------------------------------------
// Client Runtime
// ----------------------------------------------------------------------------

/// Owner of one logical session's collaborators and its policy loop
pub struct ClientRuntime {
    credentials: Arc<CredentialStore>,
    retries: Arc<RetryLedger>,
    mirror: MirrorHandle,
    connector: Box<dyn Connector>,
    policy: Box<dyn ReconnectPolicy>,
    dispatcher: EventDispatcher,
    connection: ConnectionManager,
}

impl ClientRuntime {
    /// Build a runtime around externally owned state
    ///
    /// The credential store and retry ledger are taken by `Arc` so callers
    /// keep control of their lifetime (and can share them across restarts).
    /// A credentials-persisting handler is subscribed from the start.
    pub fn new(
        config: ClientConfig,
        credentials: Arc<CredentialStore>,
        retries: Arc<RetryLedger>,
        connector: Box<dyn Connector>,
    ) -> Self {
        let connection = ConnectionManager::new(
            credentials.clone(),
            retries.clone(),
            config.channels.clone(),
            config.retry.clone(),
        );

        let mut dispatcher = EventDispatcher::new();
        dispatcher.subscribe(CredentialsSaver::new(credentials.clone()));

        Self {
            credentials,
            retries,
            mirror: MirrorHandle::absent(),
            connector,
            policy: Box::new(StandardPolicy::default()),
            dispatcher,
            connection,
        }
    }

    /// Attach a mirror; it is kept current from every batch
    pub fn with_mirror(mut self, mirror: MirrorHandle) -> Self {
        self.mirror = mirror.clone();
        self.dispatcher.subscribe(MirrorBinding::new(mirror));
        self
    }

    /// Replace the reconnect policy
    pub fn with_policy<P: ReconnectPolicy + 'static>(mut self, policy: P) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Subscribe an application handler alongside the built-in ones
    pub fn subscribe<H: EventHandler + 'static>(&mut self, handler: H) {
        self.dispatcher.subscribe(handler);
    }

    pub fn mirror(&self) -> &MirrorHandle {
        &self.mirror
    }

    pub fn retries(&self) -> &Arc<RetryLedger> {
        &self.retries
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// State of the current (or last) connection
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Send an application payload over the open connection
    pub async fn send(&self, payload: Vec<u8>) -> Result<()> {
        self.connection.send(payload).await
    }

    /// Drive connect → dispatch → close cycles until the policy stops
    ///
    /// Returns the final close cause. A logged-out close always stops the
    /// loop; any other cause is put to the policy.
    pub async fn run(&mut self) -> Result<CloseCause> {
        loop {
            let (transport, codec) = self.connector.connect().await?;
            let mut stream = self.connection.open(transport, codec)?;
            self.dispatcher.run(&mut stream).await;

            let cause = match self.connection.state() {
                ConnectionState::Closed(cause) => cause,
                other => {
                    warn!(state = other.name(), "event stream ended outside Closed");
                    CloseCause::Recoverable(DisconnectReason::ConnectionLost {
                        reason: format!("stream ended in state {}", other.name()),
                    })
                }
            };

            match self.policy.decide(&cause) {
                Some(delay) => {
                    info!(cause = %cause, delay_ms = delay.as_millis() as u64, "reconnecting");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    info!(cause = %cause, "policy chose not to reconnect");
                    return Ok(cause);
                }
            }
        }
    }

    /// Close the active connection, if any
    pub async fn close(&mut self) {
        self.connection.close().await;
    }
}
