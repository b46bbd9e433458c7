//! Periodic mirror snapshots
//!
//! The mirror is persisted on a fixed interval, never synchronously with
//! individual mutations. A failed write is logged and retried on the next
//! tick; a final flush runs on shutdown. Restart semantics are last write
//! wins.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use wireline_core::{BlobStore, MirrorHandle, SnapshotConfig};

// ----------------------------------------------------------------------------
// Snapshot Task
// ----------------------------------------------------------------------------

/// Interval-driven snapshot writer for a mirror
pub struct SnapshotTask {
    mirror: MirrorHandle,
    blob: Arc<dyn BlobStore>,
    path: String,
    config: SnapshotConfig,
    shutdown_rx: watch::Receiver<bool>,
}

/// Handle to a running snapshot task
pub struct SnapshotHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SnapshotTask {
    /// Spawn the snapshot task; returns a handle for graceful shutdown
    pub fn spawn(
        mirror: MirrorHandle,
        blob: Arc<dyn BlobStore>,
        path: impl Into<String>,
        config: SnapshotConfig,
    ) -> SnapshotHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = SnapshotTask {
            mirror,
            blob,
            path: path.into(),
            config,
            shutdown_rx,
        };
        SnapshotHandle {
            shutdown_tx,
            join: tokio::spawn(task.run()),
        }
    }

    async fn run(mut self) {
        if !self.config.enabled || !self.mirror.is_active() {
            debug!("snapshot task idle (disabled or no mirror)");
            // Still wait for shutdown so the handle behaves uniformly
            let _ = self.shutdown_rx.changed().await;
            return;
        }

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; the first write should land one
        // full interval after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.flush(),
                _ = self.shutdown_rx.changed() => {
                    self.flush();
                    break;
                }
            }
        }
    }

    fn flush(&self) {
        match self.mirror.persist_to(self.blob.as_ref(), &self.path) {
            Ok(()) => debug!(path = %self.path, "mirror snapshot written"),
            Err(err) => {
                warn!(path = %self.path, error = %err, "mirror snapshot failed; retrying next interval");
            }
        }
    }
}

impl SnapshotHandle {
    /// Stop the task after one final flush
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}
