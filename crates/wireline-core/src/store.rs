//! Durable credential storage
//!
//! [`BlobStore`] is the abstract load/save contract this crate expects from
//! its persistence collaborator; the concrete format and location belong to
//! the implementation. [`CredentialStore`] layers the consistency contract on
//! top: loads degrade to a fresh session, saves never expose a half-written
//! record to a concurrent reader.

use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::errors::{PersistenceError, Result};
use crate::types::SessionKeyId;

// ----------------------------------------------------------------------------
// Blob Store Trait
// ----------------------------------------------------------------------------

/// Abstract key-value blob store
///
/// `write` must atomically replace the previous blob: a concurrent `read`
/// observes either the old bytes or the new bytes, never a mixture.
pub trait BlobStore: Send + Sync {
    /// Read a blob; `Ok(None)` when nothing was stored at `path`
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Atomically replace the blob at `path`
    fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Remove the blob at `path`; absent blobs are not an error
    fn remove(&self, path: &str) -> Result<()>;
}

// ----------------------------------------------------------------------------
// Memory Blob Store
// ----------------------------------------------------------------------------

/// In-memory blob store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<std::collections::BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        Ok(blobs.get(path).cloned())
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        blobs.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        blobs.remove(path);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Credential Store
// ----------------------------------------------------------------------------

/// Durable holder of the session credentials
///
/// Loaded once at startup, mutated incrementally by the connection layer,
/// persisted on demand (on every credentials-update event). The interior
/// lock guarantees a save in progress is never observable half-written by a
/// concurrent load, and no lock is held across blob I/O for longer than the
/// serialization itself.
pub struct CredentialStore {
    blob: Arc<dyn BlobStore>,
    path: String,
    creds: RwLock<Credentials>,
}

impl CredentialStore {
    /// Load credentials from the blob store, or start a fresh session
    ///
    /// Missing or unreadable state is not fatal: a brand-new session is
    /// always a valid recovery path for this kind of client.
    pub fn load(blob: Arc<dyn BlobStore>, path: impl Into<String>) -> Self {
        let path = path.into();
        let creds = match blob.read(&path) {
            Ok(Some(bytes)) => match bincode::deserialize::<Credentials>(&bytes) {
                Ok(creds) => {
                    debug!(path = %path, "loaded persisted credentials");
                    creds
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "persisted credentials are corrupt, starting fresh session");
                    Credentials::fresh()
                }
            },
            Ok(None) => {
                debug!(path = %path, "no persisted credentials, starting fresh session");
                Credentials::fresh()
            }
            Err(err) => {
                warn!(path = %path, error = %err, "failed to read persisted credentials, starting fresh session");
                Credentials::fresh()
            }
        };

        Self {
            blob,
            path,
            creds: RwLock::new(creds),
        }
    }

    /// Create a store around already-built credentials (tests, migrations)
    pub fn with_credentials(
        blob: Arc<dyn BlobStore>,
        path: impl Into<String>,
        creds: Credentials,
    ) -> Self {
        Self {
            blob,
            path: path.into(),
            creds: RwLock::new(creds),
        }
    }

    /// Run a closure against the current credentials under the read lock
    pub fn with<R>(&self, f: impl FnOnce(&Credentials) -> R) -> R {
        let creds = self.creds.read().unwrap_or_else(|e| e.into_inner());
        f(&creds)
    }

    /// Clone the current credentials
    pub fn snapshot(&self) -> Credentials {
        self.with(Credentials::clone)
    }

    /// Apply a set of session-key rotations, returning the rotated ids
    pub fn apply_rotation(
        &self,
        rotations: impl IntoIterator<Item = (SessionKeyId, Vec<u8>)>,
    ) -> Vec<SessionKeyId> {
        let mut creds = self.creds.write().unwrap_or_else(|e| e.into_inner());
        let mut rotated = Vec::new();
        for (id, material) in rotations {
            creds.rotate_session_key(id.clone(), material);
            rotated.push(id);
        }
        rotated
    }

    /// Persist the current credentials to the blob store
    ///
    /// Serializes under the read lock, then hands the finished bytes to the
    /// blob store's atomic replace. Failures are returned for the caller to
    /// log; the next credentials-update or snapshot retries.
    pub fn persist(&self) -> Result<()> {
        let bytes = self.with(|creds| bincode::serialize(creds))
            .map_err(PersistenceError::from)?;
        self.blob.write(&self.path, &bytes)
    }

    /// Discard the session: fresh credentials, persisted blob removed
    ///
    /// Only called on explicit logout.
    pub fn reset(&self) -> Result<()> {
        {
            let mut creds = self.creds.write().unwrap_or_else(|e| e.into_inner());
            *creds = Credentials::fresh();
        }
        self.blob.remove(&self.path)
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
