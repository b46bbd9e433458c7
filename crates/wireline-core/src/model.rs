//! Mirrored entity model
//!
//! These are the local projections of remote entities (chats, contacts,
//! messages, labels) plus the delta shapes carried by update events. Entities
//! are identified by stable string ids; the mirror applies events to them
//! idempotently.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::types::{ChatId, ContactId, LabelId, MessageId, Timestamp};

// ----------------------------------------------------------------------------
// Chat
// ----------------------------------------------------------------------------

/// A conversation, holding an ordered set of label ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub name: Option<String>,
    /// Ordered set of labels attached to this chat; insertion order is
    /// preserved and duplicates are never stored
    pub label_ids: SmallVec<[LabelId; 4]>,
    pub unread_count: u32,
    pub conversation_timestamp: Option<Timestamp>,
}

impl Chat {
    /// Create an empty chat shell for an id seen before any metadata
    pub fn stub(id: ChatId) -> Self {
        Self {
            id,
            name: None,
            label_ids: SmallVec::new(),
            unread_count: 0,
            conversation_timestamp: None,
        }
    }
}

// ----------------------------------------------------------------------------
// Contact
// ----------------------------------------------------------------------------

/// A contact known to the session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: Option<String>,
    /// Short display name pushed by the remote side
    pub notify: Option<String>,
    pub img_url: Option<String>,
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// Delivery progression of a message; later states never regress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeliveryState {
    Pending,
    Sent,
    Delivered,
    Read,
    Played,
}

/// A message belonging to exactly one chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub from_me: bool,
    pub sender: Option<ContactId>,
    pub text: Option<String>,
    pub timestamp: Timestamp,
    pub status: DeliveryState,
    /// Current reactions, at most one per sender
    pub reactions: Vec<Reaction>,
}

// ----------------------------------------------------------------------------
// Label
// ----------------------------------------------------------------------------

/// A label that chats can be tagged with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub name: Option<String>,
    pub color: Option<u32>,
    pub predefined_id: Option<u32>,
    pub deleted: bool,
}

impl Label {
    /// Placeholder for a label id the mirror has not seen yet
    ///
    /// Dangling references resolve to this shell instead of failing the read.
    pub fn unknown(id: LabelId) -> Self {
        Self {
            id,
            name: None,
            color: None,
            predefined_id: None,
            deleted: false,
        }
    }
}

// ----------------------------------------------------------------------------
// Update Deltas
// ----------------------------------------------------------------------------

/// Partial chat update; `None` fields are left untouched
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatDelta {
    pub id: ChatId,
    pub name: Option<String>,
    pub unread_count: Option<u32>,
    pub conversation_timestamp: Option<Timestamp>,
}

/// Partial contact update
///
/// `img_url` distinguishes "untouched" (`None`) from "removed"
/// (`Some(None)`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContactDelta {
    pub id: ContactId,
    pub name: Option<String>,
    pub notify: Option<String>,
    pub img_url: Option<Option<String>>,
}

/// Partial message update (status change, edit, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDelta {
    pub chat_id: ChatId,
    pub id: MessageId,
    pub status: Option<DeliveryState>,
    pub text: Option<String>,
}

/// Delivery receipt for a message from one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub recipient: ContactId,
    pub status: DeliveryState,
    pub timestamp: Timestamp,
}

/// A reaction to a message; `emoji: None` retracts the sender's reaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub sender: ContactId,
    pub emoji: Option<String>,
}

/// Presence state of a participant within a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresenceKind {
    Available,
    Unavailable,
    Composing,
    Recording,
    Paused,
}

/// Presence notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub chat_id: ChatId,
    pub participant: ContactId,
    pub kind: PresenceKind,
}

/// Incoming call notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEvent {
    pub id: String,
    pub from: ContactId,
    pub timestamp: Timestamp,
    pub status: CallStatus,
}

/// Lifecycle of an incoming call offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallStatus {
    Offer,
    Ringing,
    Rejected,
    Timeout,
    Terminated,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
