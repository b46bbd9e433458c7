//! Reconnection policy
//!
//! The connection manager reports why it closed; deciding what to do about
//! it lives here, behind a trait, so a different retry/backoff strategy can
//! be swapped in without touching the state machine.

use core::time::Duration;

use wireline_core::CloseCause;

// ----------------------------------------------------------------------------
// Reconnect Policy Trait
// ----------------------------------------------------------------------------

/// Decides whether (and when) to open again after a close
pub trait ReconnectPolicy: Send {
    /// `Some(delay)` to reconnect after the delay, `None` to stop
    fn decide(&mut self, cause: &CloseCause) -> Option<Duration>;
}

// ----------------------------------------------------------------------------
// Standard Policy
// ----------------------------------------------------------------------------

/// Reconnect after a fixed delay unless the session was logged out
#[derive(Debug, Clone)]
pub struct StandardPolicy {
    pub delay: Duration,
}

impl StandardPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Reconnect without waiting (tests, aggressive clients)
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }
}

impl Default for StandardPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
        }
    }
}

impl ReconnectPolicy for StandardPolicy {
    fn decide(&mut self, cause: &CloseCause) -> Option<Duration> {
        match cause {
            CloseCause::LoggedOut => None,
            CloseCause::Recoverable(_) => Some(self.delay),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
