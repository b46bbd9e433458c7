//! Error types for the Wireline client core
//!
//! Each concern carries its own error enum (auth, transport, persistence,
//! consistency) and the top-level [`ClientError`] unifies them for callers.
//! Errors inside the connection state machine are surfaced to consumers as
//! connection-update events; the enums here cover the direct call paths.

use crate::types::{ChatId, LabelId};

// ----------------------------------------------------------------------------
// Authentication Errors
// ----------------------------------------------------------------------------

/// Credential problems that fail a single `open` attempt
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no credentials available")]
    MissingCredentials,
    #[error("credentials are corrupt: {reason}")]
    CorruptCredentials { reason: String },
    #[error("handshake rejected by remote: {reason}")]
    HandshakeRejected { reason: String },
}

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Transport-level failures; all of these are recoverable closes
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String },
    #[error("write failed: {reason}")]
    WriteFailed { reason: String },
    #[error("connection is not open (state: {state})")]
    NotOpen { state: String },
    #[error("network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ----------------------------------------------------------------------------
// Persistence Errors
// ----------------------------------------------------------------------------

/// Blob store read/write failures
///
/// Load failures degrade to a fresh state; save failures are logged and
/// retried on the next scheduled write. Neither crashes the process.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: String, reason: String },
    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },
    #[error("stored data at {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("serialization failed: {0}")]
    Codec(#[from] bincode::Error),
}

// ----------------------------------------------------------------------------
// Consistency Errors
// ----------------------------------------------------------------------------

/// Mirror asked to touch a reference it cannot resolve
///
/// These are logged and the operation is treated as a no-op over an implicit
/// empty set; they are never propagated out of the mirror.
#[derive(Debug, thiserror::Error)]
pub enum ConsistencyError {
    #[error("unknown chat {chat_id}")]
    UnknownChat { chat_id: ChatId },
    #[error("unknown label {label_id}")]
    UnknownLabel { label_id: LabelId },
}

// ----------------------------------------------------------------------------
// Unified Client Error
// ----------------------------------------------------------------------------

/// Top-level error type for the Wireline client core
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The session was invalidated by a remote logout; terminal
    #[error("session invalidated by remote logout")]
    SessionInvalidated,

    #[error("consistency error: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Protocol frame could not be decoded or encoded
    #[error("codec error: {reason}")]
    Codec { reason: String },

    /// Internal channel communication failure
    #[error("channel error: {message}")]
    Channel { message: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl ClientError {
    /// Create a corrupt-credentials error with a reason
    pub fn corrupt_credentials<R: Into<String>>(reason: R) -> Self {
        ClientError::Auth(AuthError::CorruptCredentials {
            reason: reason.into(),
        })
    }

    /// Create a connection-lost transport error
    pub fn connection_lost<R: Into<String>>(reason: R) -> Self {
        ClientError::Transport(TransportError::ConnectionLost {
            reason: reason.into(),
        })
    }

    /// Create a not-open transport error from a state name
    pub fn not_open<S: Into<String>>(state: S) -> Self {
        ClientError::Transport(TransportError::NotOpen {
            state: state.into(),
        })
    }

    /// Create a codec error with a reason
    pub fn codec<R: Into<String>>(reason: R) -> Self {
        ClientError::Codec {
            reason: reason.into(),
        }
    }

    /// Create a channel error with a message
    pub fn channel<M: Into<String>>(message: M) -> Self {
        ClientError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config<R: Into<String>>(reason: R) -> Self {
        ClientError::Configuration {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, ClientError>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_errors_convert_into_client_error() {
        let err: ClientError = AuthError::MissingCredentials.into();
        assert!(matches!(err, ClientError::Auth(_)));

        let err: ClientError = TransportError::ConnectionLost {
            reason: "reset by peer".into(),
        }
        .into();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[test]
    fn constructors_produce_expected_variants() {
        assert!(matches!(
            ClientError::not_open("Idle"),
            ClientError::Transport(TransportError::NotOpen { .. })
        ));
        assert!(matches!(
            ClientError::corrupt_credentials("zero key"),
            ClientError::Auth(AuthError::CorruptCredentials { .. })
        ));
    }

    #[test]
    fn display_includes_context() {
        let err = ClientError::connection_lost("socket reset");
        assert!(err.to_string().contains("socket reset"));
    }
}
