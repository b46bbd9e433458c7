//! Wireline Core
//!
//! Connection lifecycle and event delivery for a client of a stateful,
//! session-based, end-to-end-encrypted messaging protocol running over a
//! persistent duplex transport. This crate keeps one logical session alive
//! across transport failures without losing or duplicating protocol state:
//! credentials, retry counters and the local mirror of remote entities all
//! survive reconnects in a well-defined order.
//!
//! The wire framing, handshake crypto, and concrete persistence formats are
//! collaborators behind the [`transport::Transport`], [`transport::FrameCodec`]
//! and [`store::BlobStore`] capabilities; reconnection policy belongs to the
//! caller (see the runtime crate).

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod connection;
pub mod credentials;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod mirror;
pub mod model;
pub mod retry;
pub mod store;
pub mod testing;
pub mod transport;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{ChannelConfig, ClientConfig, RetryConfig, SnapshotConfig};
pub use connection::{CloseCause, ConnectionManager, ConnectionState, EventStream};
pub use credentials::Credentials;
pub use dispatch::{EventDispatcher, EventHandler};
pub use errors::{
    AuthError, ClientError, ConsistencyError, PersistenceError, Result, TransportError,
};
pub use events::{
    ConnectionStatus, ConnectionUpdate, CredentialsUpdate, DisconnectReason, Event, EventBatch,
    EventCategory, HistorySync, MessageUpsert, UpsertKind,
};
pub use mirror::{LabelSelection, MirrorHandle, MirrorSnapshot, MirrorStore};
pub use retry::RetryLedger;
pub use store::{BlobStore, CredentialStore, MemoryBlobStore};
pub use transport::{
    BoxCodec, BoxTransport, FrameCodec, Inbound, Outbound, Transport, TransportRead,
};
pub use types::{ChatId, ContactId, LabelId, MessageId, SessionKeyId, Timestamp};
