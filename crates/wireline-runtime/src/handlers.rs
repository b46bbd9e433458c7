//! Built-in event handlers
//!
//! The runtime wires two consumers into every dispatcher: one that persists
//! credentials whenever key material changed, and one that keeps the mirror
//! current. Application handlers subscribe alongside these.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use wireline_core::{
    CredentialStore, EventBatch, EventCategory, EventHandler, MirrorHandle, Result,
};

// ----------------------------------------------------------------------------
// Credentials Saver
// ----------------------------------------------------------------------------

/// Persists the credential store on every credentials-update
///
/// A failed save is logged and retried on the next update; it never fails
/// the batch.
pub struct CredentialsSaver {
    store: Arc<CredentialStore>,
}

impl CredentialsSaver {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for CredentialsSaver {
    fn name(&self) -> &str {
        "credentials-saver"
    }

    async fn handle_batch(&mut self, batch: &EventBatch) -> Result<()> {
        if !batch.contains(EventCategory::CredentialsUpdate) {
            return Ok(());
        }
        match self.store.persist() {
            Ok(()) => debug!("credentials persisted"),
            Err(err) => {
                warn!(error = %err, "failed to persist credentials; retrying on next update");
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Mirror Binding
// ----------------------------------------------------------------------------

/// Applies every batch to the mirror
pub struct MirrorBinding {
    mirror: MirrorHandle,
}

impl MirrorBinding {
    pub fn new(mirror: MirrorHandle) -> Self {
        Self { mirror }
    }
}

#[async_trait]
impl EventHandler for MirrorBinding {
    fn name(&self) -> &str {
        "mirror"
    }

    async fn handle_batch(&mut self, batch: &EventBatch) -> Result<()> {
        self.mirror.apply_batch(batch);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
