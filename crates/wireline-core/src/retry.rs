//! Process-wide message retry ledger
//!
//! Tracks how many times delivery or decryption of a given message has been
//! retried. The ledger is owned by the process and handed to each connection
//! by reference, so a fresh connection after a reconnect observes the same
//! counts as before. Without that, a decrypt failure after reconnect would
//! look like a first attempt and could retry forever.

use dashmap::DashMap;

use crate::types::MessageId;

// ----------------------------------------------------------------------------
// Retry Ledger
// ----------------------------------------------------------------------------

/// Per-message retry counters, independent of any connection instance
///
/// Counts are monotonically non-decreasing per message id. Entries are never
/// evicted automatically; lifetime is the caller's responsibility (`reset`
/// on success, `clear` on logout, or nothing at all).
#[derive(Debug, Default)]
pub struct RetryLedger {
    counts: DashMap<MessageId, u32>,
}

impl RetryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump the retry count for a message, returning the new count
    ///
    /// Atomic per key; concurrent in-flight decrypt attempts for the same
    /// message never lose an increment.
    pub fn increment(&self, id: &MessageId) -> u32 {
        let mut entry = self.counts.entry(id.clone()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Current retry count for a message (zero when never retried)
    pub fn get(&self, id: &MessageId) -> u32 {
        self.counts.get(id).map(|count| *count).unwrap_or(0)
    }

    /// Forget a message's count (e.g. after successful delivery)
    pub fn reset(&self, id: &MessageId) {
        self.counts.remove(id);
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.counts.clear();
    }

    /// Number of messages currently tracked
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
