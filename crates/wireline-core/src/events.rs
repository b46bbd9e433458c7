//! Protocol events and the batch they are delivered in
//!
//! The connection layer classifies everything it receives into [`Event`]
//! values, one exhaustive enum instead of a name-keyed map, so consumers get
//! compile-time coverage checking when they match on categories. Events are
//! immutable once emitted; an [`EventBatch`] preserves arrival order across
//! categories.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::model::{
    CallEvent, Chat, ChatDelta, Contact, ContactDelta, Message, MessageDelta, Presence, Reaction,
    Receipt,
};
use crate::types::{ChatId, SessionKeyId};

// ----------------------------------------------------------------------------
// Event Payloads
// ----------------------------------------------------------------------------

/// Externally visible connection status carried by connection-update events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Closing => "closing",
            ConnectionStatus::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why the transport connection ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Remote invalidated the session; no reconnect may follow
    LoggedOut,
    /// Transport-level failure; reconnecting is allowed
    ConnectionLost { reason: String },
    /// The local side closed the connection
    ClosedByCaller,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::LoggedOut => f.write_str("logged out"),
            DisconnectReason::ConnectionLost { reason } => {
                write!(f, "connection lost: {reason}")
            }
            DisconnectReason::ClosedByCaller => f.write_str("closed by caller"),
        }
    }
}

/// Connection lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    pub status: ConnectionStatus,
    /// Populated on `Closed`; tells the policy layer whether to reconnect
    pub cause: Option<DisconnectReason>,
}

/// Key material changed; consumers persisting credentials must save now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsUpdate {
    /// Session-key records rotated in this cycle
    pub rotated: Vec<SessionKeyId>,
}

/// Bulk state pushed by the remote after connecting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySync {
    pub chats: Vec<Chat>,
    pub contacts: Vec<Contact>,
    pub messages: Vec<Message>,
    /// Whether this sync chunk brings the mirror fully current
    pub is_latest: bool,
}

/// Whether upserted messages are live notifications or backfill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertKind {
    Notify,
    Append,
}

/// New or replayed messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUpsert {
    pub kind: UpsertKind,
    pub messages: Vec<Message>,
}

// ----------------------------------------------------------------------------
// Event
// ----------------------------------------------------------------------------

/// A typed protocol notification
///
/// One variant per delivery category; payloads are immutable after emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    ConnectionUpdate(ConnectionUpdate),
    CredentialsUpdate(CredentialsUpdate),
    HistorySync(HistorySync),
    MessageUpsert(MessageUpsert),
    MessageUpdate(Vec<MessageDelta>),
    ReceiptUpdate(Vec<Receipt>),
    Reaction(Vec<Reaction>),
    PresenceUpdate(Presence),
    ChatUpdate(Vec<ChatDelta>),
    ChatDelete(Vec<ChatId>),
    ContactUpdate(Vec<ContactDelta>),
    Call(CallEvent),
}

/// Discriminant of [`Event`], for logging and grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    ConnectionUpdate,
    CredentialsUpdate,
    HistorySync,
    MessageUpsert,
    MessageUpdate,
    ReceiptUpdate,
    Reaction,
    PresenceUpdate,
    ChatUpdate,
    ChatDelete,
    ContactUpdate,
    Call,
}

impl Event {
    /// Category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            Event::ConnectionUpdate(_) => EventCategory::ConnectionUpdate,
            Event::CredentialsUpdate(_) => EventCategory::CredentialsUpdate,
            Event::HistorySync(_) => EventCategory::HistorySync,
            Event::MessageUpsert(_) => EventCategory::MessageUpsert,
            Event::MessageUpdate(_) => EventCategory::MessageUpdate,
            Event::ReceiptUpdate(_) => EventCategory::ReceiptUpdate,
            Event::Reaction(_) => EventCategory::Reaction,
            Event::PresenceUpdate(_) => EventCategory::PresenceUpdate,
            Event::ChatUpdate(_) => EventCategory::ChatUpdate,
            Event::ChatDelete(_) => EventCategory::ChatDelete,
            Event::ContactUpdate(_) => EventCategory::ContactUpdate,
            Event::Call(_) => EventCategory::Call,
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventCategory::ConnectionUpdate => "connection-update",
            EventCategory::CredentialsUpdate => "credentials-update",
            EventCategory::HistorySync => "history-sync",
            EventCategory::MessageUpsert => "message-upsert",
            EventCategory::MessageUpdate => "message-update",
            EventCategory::ReceiptUpdate => "receipt-update",
            EventCategory::Reaction => "reaction",
            EventCategory::PresenceUpdate => "presence-update",
            EventCategory::ChatUpdate => "chat-update",
            EventCategory::ChatDelete => "chat-delete",
            EventCategory::ContactUpdate => "contact-update",
            EventCategory::Call => "call",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Event Batch
// ----------------------------------------------------------------------------

/// Ordered sequence of events delivered to consumers in one dispatch cycle
///
/// Insertion order is the arrival order from the transport and is preserved
/// to consumers; the batch never reorders across categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    events: Vec<Event>,
}

impl EventBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Append an event, preserving arrival order
    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate events in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Iterate events of one category, in arrival order
    pub fn of(&self, category: EventCategory) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.category() == category)
    }

    /// True if the batch contains at least one event of the category
    pub fn contains(&self, category: EventCategory) -> bool {
        self.events.iter().any(|e| e.category() == category)
    }

    /// Connection updates in this batch, in arrival order
    pub fn connection_updates(&self) -> impl Iterator<Item = &ConnectionUpdate> {
        self.events.iter().filter_map(|e| match e {
            Event::ConnectionUpdate(update) => Some(update),
            _ => None,
        })
    }

    /// Credentials updates in this batch, in arrival order
    pub fn credentials_updates(&self) -> impl Iterator<Item = &CredentialsUpdate> {
        self.events.iter().filter_map(|e| match e {
            Event::CredentialsUpdate(update) => Some(update),
            _ => None,
        })
    }

    /// Message upserts in this batch, in arrival order
    pub fn message_upserts(&self) -> impl Iterator<Item = &MessageUpsert> {
        self.events.iter().filter_map(|e| match e {
            Event::MessageUpsert(upsert) => Some(upsert),
            _ => None,
        })
    }
}

impl From<Vec<Event>> for EventBatch {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl IntoIterator for EventBatch {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a EventBatch {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
