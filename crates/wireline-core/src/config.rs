//! Client configuration
//!
//! Consolidates the tunables of the connection, dispatch and snapshot layers
//! into one structure handed to the runtime.

use core::time::Duration;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the session's internal channels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Buffer for events flowing connection → dispatcher
    pub event_buffer_size: usize,
    /// Buffer for outbound send requests flowing caller → connection loop
    pub outbound_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 128,   // network events can be bursty
            outbound_buffer_size: 32, // sends are caller-paced
        }
    }
}

// ----------------------------------------------------------------------------
// Retry Configuration
// ----------------------------------------------------------------------------

/// Limits for the undecryptable-message retry path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retry requests sent for one message before giving up on it
    pub max_retry_requests: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry_requests: 5,
        }
    }
}

// ----------------------------------------------------------------------------
// Snapshot Configuration
// ----------------------------------------------------------------------------

/// Periodic mirror persistence
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Whether the snapshot task runs at all
    pub enabled: bool,
    /// Interval between snapshot writes
    pub interval: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(10),
        }
    }
}

// ----------------------------------------------------------------------------
// Client Configuration
// ----------------------------------------------------------------------------

/// Top-level configuration for one logical session
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub channels: ChannelConfig,
    pub retry: RetryConfig,
    pub snapshot: SnapshotConfig,
}

impl ClientConfig {
    /// Configuration suited to tests: small buffers, fast snapshots
    pub fn testing() -> Self {
        Self {
            channels: ChannelConfig {
                event_buffer_size: 16,
                outbound_buffer_size: 8,
            },
            retry: RetryConfig {
                max_retry_requests: 3,
            },
            snapshot: SnapshotConfig {
                enabled: true,
                interval: Duration::from_millis(50),
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ClientConfig::default();
        assert!(config.channels.event_buffer_size > 0);
        assert!(config.retry.max_retry_requests > 0);
        assert_eq!(config.snapshot.interval, Duration::from_secs(10));
    }

    #[test]
    fn testing_profile_shrinks_buffers() {
        let config = ClientConfig::testing();
        assert!(config.channels.event_buffer_size <= 16);
        assert!(config.snapshot.interval < Duration::from_secs(1));
    }
}
