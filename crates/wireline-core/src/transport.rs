//! Transport and frame-codec capabilities
//!
//! The wire framing and cryptographic handshake live outside this crate;
//! these traits pin down the interface the connection layer depends on. A
//! [`Transport`] moves opaque byte frames over a persistent duplex link; a
//! [`FrameCodec`] turns those frames into classified [`Inbound`] items and
//! encodes [`Outbound`] requests back into bytes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::events::{DisconnectReason, Event};
use crate::types::{ChatId, MessageId, SessionKeyId};

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Outcome of one transport read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransportRead {
    /// One frame of opaque bytes
    Data(Vec<u8>),
    /// The link ended; the reason decides whether reconnecting is allowed
    Closed(DisconnectReason),
}

/// Persistent duplex byte transport
///
/// `read` must be cancel-safe: the connection loop races it against local
/// shutdown and outbound requests, and a cancelled read must not lose or
/// tear a frame.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Wait for the next frame or the end of the link
    async fn read(&mut self) -> Result<TransportRead>;

    /// Write one frame; resolves once the transport has accepted it
    async fn write(&mut self, frame: &[u8]) -> Result<()>;
}

// ----------------------------------------------------------------------------
// Classified Frames
// ----------------------------------------------------------------------------

/// What one decoded frame contributed to the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inbound {
    /// Handshake finished; the connection is usable for traffic
    HandshakeComplete,
    /// Session-key material rotated; must be folded into the credentials
    KeyRotation(Vec<(SessionKeyId, Vec<u8>)>),
    /// A message could not be decrypted; retry bookkeeping applies
    Undecryptable {
        chat_id: ChatId,
        message_id: MessageId,
    },
    /// A fully classified protocol notification
    Event(Event),
    /// The remote invalidated this session
    LoggedOut,
}

/// Requests the connection layer encodes onto the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outbound {
    /// An application payload handed to `send`
    Payload(Vec<u8>),
    /// Ask the sender to re-encrypt and resend a message
    RetryRequest { message_id: MessageId, count: u32 },
}

// ----------------------------------------------------------------------------
// Frame Codec Trait
// ----------------------------------------------------------------------------

/// Decrypting/classifying codec between transport frames and session items
///
/// Implementations own the handshake and message crypto. A codec is created
/// per connection attempt and may keep handshake state across `decode`
/// calls.
#[async_trait]
pub trait FrameCodec: Send + Sync {
    /// Decode one transport frame into zero or more classified items
    ///
    /// Item order within the returned vector is the order the items were
    /// observed on the wire and is preserved all the way to consumers.
    async fn decode(&mut self, frame: &[u8]) -> Result<Vec<Inbound>>;

    /// Encode an outbound request into one transport frame
    async fn encode(&mut self, outbound: Outbound) -> Result<Vec<u8>>;
}

/// Boxed transport, as handed to the connection layer
pub type BoxTransport = Box<dyn Transport>;

/// Boxed codec, as handed to the connection layer
pub type BoxCodec = Box<dyn FrameCodec>;
