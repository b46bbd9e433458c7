//! Local mirror of remote entities
//!
//! [`MirrorStore`] keeps an eventually-consistent in-memory projection of
//! chats, contacts, messages and labels, fed by event batches. Applying the
//! same event twice leaves the store unchanged (idempotence per entity id).
//! Label management is set-algebra over each chat's ordered label-id set.
//! Persistence is a separate, periodic snapshot; it is never synchronized
//! with individual mutations.

use std::sync::{Arc, RwLock};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::errors::{ConsistencyError, PersistenceError, Result};
use crate::events::{Event, EventBatch};
use crate::model::{
    Chat, ChatDelta, Contact, ContactDelta, Label, Message, MessageDelta, PresenceKind, Reaction,
    Receipt,
};
use crate::store::BlobStore;
use crate::types::{ChatId, ContactId, LabelId, MessageId};

// ----------------------------------------------------------------------------
// Label Selection
// ----------------------------------------------------------------------------

/// Which labels a removal targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSelection {
    Ids(Vec<LabelId>),
    All,
}

impl From<Vec<LabelId>> for LabelSelection {
    fn from(ids: Vec<LabelId>) -> Self {
        LabelSelection::Ids(ids)
    }
}

// ----------------------------------------------------------------------------
// Mirror Store
// ----------------------------------------------------------------------------

/// In-memory projection of remote entities
#[derive(Debug, Default)]
pub struct MirrorStore {
    chats: HashMap<ChatId, Chat>,
    contacts: HashMap<ContactId, Contact>,
    messages: HashMap<ChatId, Vec<Message>>,
    labels: HashMap<LabelId, Label>,
    presences: HashMap<ChatId, HashMap<ContactId, PresenceKind>>,
}

impl MirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Event application
    // ------------------------------------------------------------------

    /// Apply every event of a batch, in batch order
    pub fn apply_batch(&mut self, batch: &EventBatch) {
        for event in batch {
            self.apply(event);
        }
    }

    /// Apply one event; applying the same event twice is a no-op
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::HistorySync(sync) => {
                debug!(
                    chats = sync.chats.len(),
                    contacts = sync.contacts.len(),
                    messages = sync.messages.len(),
                    is_latest = sync.is_latest,
                    "applying history sync"
                );
                for chat in &sync.chats {
                    self.chats.insert(chat.id.clone(), chat.clone());
                }
                for contact in &sync.contacts {
                    self.contacts.insert(contact.id.clone(), contact.clone());
                }
                for message in &sync.messages {
                    self.upsert_message(message.clone());
                }
            }
            Event::MessageUpsert(upsert) => {
                for message in &upsert.messages {
                    self.upsert_message(message.clone());
                }
            }
            Event::MessageUpdate(deltas) => {
                for delta in deltas {
                    self.apply_message_delta(delta);
                }
            }
            Event::ReceiptUpdate(receipts) => {
                for receipt in receipts {
                    self.apply_receipt(receipt);
                }
            }
            Event::Reaction(reactions) => {
                for reaction in reactions {
                    self.apply_reaction(reaction);
                }
            }
            Event::PresenceUpdate(presence) => {
                self.presences
                    .entry(presence.chat_id.clone())
                    .or_default()
                    .insert(presence.participant.clone(), presence.kind);
            }
            Event::ChatUpdate(deltas) => {
                for delta in deltas {
                    self.apply_chat_delta(delta);
                }
            }
            Event::ChatDelete(chat_ids) => {
                for chat_id in chat_ids {
                    self.chats.remove(chat_id);
                    self.messages.remove(chat_id);
                    self.presences.remove(chat_id);
                }
            }
            Event::ContactUpdate(deltas) => {
                for delta in deltas {
                    self.apply_contact_delta(delta);
                }
            }
            // Connection, credential and call notifications are not mirrored
            Event::ConnectionUpdate(_) | Event::CredentialsUpdate(_) | Event::Call(_) => {}
        }
    }

    fn upsert_message(&mut self, message: Message) {
        self.chats
            .entry(message.chat_id.clone())
            .or_insert_with(|| Chat::stub(message.chat_id.clone()));

        let messages = self.messages.entry(message.chat_id.clone()).or_default();
        match messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => messages.push(message),
        }
    }

    fn apply_message_delta(&mut self, delta: &MessageDelta) {
        let Some(message) = self
            .messages
            .get_mut(&delta.chat_id)
            .and_then(|msgs| msgs.iter_mut().find(|m| m.id == delta.id))
        else {
            debug!(chat = %delta.chat_id, message = %delta.id, "message update for unknown message, ignoring");
            return;
        };
        if let Some(status) = delta.status {
            // Delivery status never regresses
            message.status = message.status.max(status);
        }
        if let Some(text) = &delta.text {
            message.text = Some(text.clone());
        }
    }

    fn apply_receipt(&mut self, receipt: &Receipt) {
        let Some(message) = self
            .messages
            .get_mut(&receipt.chat_id)
            .and_then(|msgs| msgs.iter_mut().find(|m| m.id == receipt.message_id))
        else {
            debug!(chat = %receipt.chat_id, message = %receipt.message_id, "receipt for unknown message, ignoring");
            return;
        };
        message.status = message.status.max(receipt.status);
    }

    fn apply_reaction(&mut self, reaction: &Reaction) {
        let Some(message) = self
            .messages
            .get_mut(&reaction.chat_id)
            .and_then(|msgs| msgs.iter_mut().find(|m| m.id == reaction.message_id))
        else {
            debug!(chat = %reaction.chat_id, message = %reaction.message_id, "reaction for unknown message, ignoring");
            return;
        };
        // At most one reaction per sender; None retracts it
        message.reactions.retain(|r| r.sender != reaction.sender);
        if reaction.emoji.is_some() {
            message.reactions.push(reaction.clone());
        }
    }

    fn apply_chat_delta(&mut self, delta: &ChatDelta) {
        let chat = self
            .chats
            .entry(delta.id.clone())
            .or_insert_with(|| Chat::stub(delta.id.clone()));
        if let Some(name) = &delta.name {
            chat.name = Some(name.clone());
        }
        if let Some(unread) = delta.unread_count {
            chat.unread_count = unread;
        }
        if let Some(ts) = delta.conversation_timestamp {
            chat.conversation_timestamp = Some(ts);
        }
    }

    fn apply_contact_delta(&mut self, delta: &ContactDelta) {
        let contact = self
            .contacts
            .entry(delta.id.clone())
            .or_insert_with(|| Contact {
                id: delta.id.clone(),
                ..Contact::default()
            });
        if let Some(name) = &delta.name {
            contact.name = Some(name.clone());
        }
        if let Some(notify) = &delta.notify {
            contact.notify = Some(notify.clone());
        }
        if let Some(img_url) = &delta.img_url {
            contact.img_url = img_url.clone();
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// All labels known to the mirror, ordered by id
    pub fn labels(&self) -> Vec<Label> {
        let mut labels: Vec<Label> = self.labels.values().cloned().collect();
        labels.sort_by(|a, b| a.id.cmp(&b.id));
        labels
    }

    /// Ids of all labels known to the mirror, ordered
    pub fn label_ids(&self) -> Vec<LabelId> {
        let mut ids: Vec<LabelId> = self.labels.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Record a label definition
    pub fn upsert_label(&mut self, label: Label) {
        self.labels.insert(label.id.clone(), label);
    }

    pub fn chat(&self, chat_id: &ChatId) -> Option<&Chat> {
        self.chats.get(chat_id)
    }

    pub fn contact(&self, contact_id: &ContactId) -> Option<&Contact> {
        self.contacts.get(contact_id)
    }

    pub fn message(&self, chat_id: &ChatId, message_id: &MessageId) -> Option<&Message> {
        self.messages
            .get(chat_id)
            .and_then(|msgs| msgs.iter().find(|m| &m.id == message_id))
    }

    /// Messages of a chat in arrival order
    pub fn chat_messages(&self, chat_id: &ChatId) -> &[Message] {
        self.messages
            .get(chat_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn chat_count(&self) -> usize {
        self.chats.len()
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Label ids attached to a chat, in attachment order
    ///
    /// Unknown chats read as the empty set.
    pub fn chat_label_ids(&self, chat_id: &ChatId) -> Vec<LabelId> {
        self.chats
            .get(chat_id)
            .map(|chat| chat.label_ids.to_vec())
            .unwrap_or_default()
    }

    /// Labels attached to a chat; dangling ids resolve to unknown shells
    pub fn chat_labels(&self, chat_id: &ChatId) -> Vec<Label> {
        self.chat_label_ids(chat_id)
            .into_iter()
            .map(|id| {
                self.labels
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| Label::unknown(id))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Label mutations
    // ------------------------------------------------------------------

    /// Replace a chat's label set; returns the resulting set
    ///
    /// The chat is created as a stub if unknown. Ids without a known label
    /// definition are kept (they may arrive later) but reported.
    pub fn set_chat_label_ids(&mut self, chat_id: &ChatId, label_ids: Vec<LabelId>) -> Vec<LabelId> {
        self.warn_dangling(&label_ids);
        let chat = self
            .chats
            .entry(chat_id.clone())
            .or_insert_with(|| Chat::stub(chat_id.clone()));

        let mut next: SmallVec<[LabelId; 4]> = SmallVec::new();
        for id in label_ids {
            if !next.contains(&id) {
                next.push(id);
            }
        }
        chat.label_ids = next;
        chat.label_ids.to_vec()
    }

    /// Union labels into a chat's set; returns the resulting set
    pub fn add_chat_label_ids(&mut self, chat_id: &ChatId, label_ids: Vec<LabelId>) -> Vec<LabelId> {
        self.warn_dangling(&label_ids);
        let chat = self
            .chats
            .entry(chat_id.clone())
            .or_insert_with(|| Chat::stub(chat_id.clone()));

        for id in label_ids {
            if !chat.label_ids.contains(&id) {
                chat.label_ids.push(id);
            }
        }
        chat.label_ids.to_vec()
    }

    /// Subtract labels from a chat's set (or clear it); returns the result
    ///
    /// Clearing a chat that never had labels is a successful no-op.
    pub fn del_chat_label_ids(
        &mut self,
        chat_id: &ChatId,
        selection: impl Into<LabelSelection>,
    ) -> Vec<LabelId> {
        let Some(chat) = self.chats.get_mut(chat_id) else {
            let err = ConsistencyError::UnknownChat {
                chat_id: chat_id.clone(),
            };
            debug!(error = %err, "label removal on unknown chat is a no-op");
            return Vec::new();
        };

        match selection.into() {
            LabelSelection::All => chat.label_ids.clear(),
            LabelSelection::Ids(ids) => {
                chat.label_ids.retain(|id| !ids.contains(id));
            }
        }
        chat.label_ids.to_vec()
    }

    fn warn_dangling(&self, label_ids: &[LabelId]) {
        for id in label_ids {
            if !self.labels.contains_key(id) {
                let err = ConsistencyError::UnknownLabel {
                    label_id: id.clone(),
                };
                warn!(error = %err, "label reference does not resolve yet");
            }
        }
    }

    // ------------------------------------------------------------------
    // Snapshot persistence
    // ------------------------------------------------------------------

    /// Serialize the durable portion of the mirror
    ///
    /// Presence is transient and deliberately left out.
    pub fn to_snapshot(&self) -> MirrorSnapshot {
        let mut chats: Vec<Chat> = self.chats.values().cloned().collect();
        chats.sort_by(|a, b| a.id.cmp(&b.id));
        let mut contacts: Vec<Contact> = self.contacts.values().cloned().collect();
        contacts.sort_by(|a, b| a.id.cmp(&b.id));
        let mut messages: Vec<Message> = Vec::new();
        let mut chat_ids: Vec<&ChatId> = self.messages.keys().collect();
        chat_ids.sort();
        for chat_id in chat_ids {
            messages.extend(self.messages[chat_id].iter().cloned());
        }
        MirrorSnapshot {
            chats,
            contacts,
            messages,
            labels: self.labels(),
        }
    }

    /// Rebuild a mirror from a snapshot
    pub fn from_snapshot(snapshot: MirrorSnapshot) -> Self {
        let mut store = MirrorStore::new();
        for label in snapshot.labels {
            store.labels.insert(label.id.clone(), label);
        }
        for chat in snapshot.chats {
            store.chats.insert(chat.id.clone(), chat);
        }
        for contact in snapshot.contacts {
            store.contacts.insert(contact.id.clone(), contact);
        }
        for message in snapshot.messages {
            store.upsert_message(message);
        }
        store
    }

    /// Load the last snapshot from a blob store, tolerating absence
    pub fn hydrate(blob: &dyn BlobStore, path: &str) -> Self {
        match blob.read(path) {
            Ok(Some(bytes)) => match bincode::deserialize::<MirrorSnapshot>(&bytes) {
                Ok(snapshot) => {
                    debug!(path, "hydrated mirror from snapshot");
                    Self::from_snapshot(snapshot)
                }
                Err(err) => {
                    warn!(path, error = %err, "mirror snapshot is corrupt, starting empty");
                    Self::new()
                }
            },
            Ok(None) => Self::new(),
            Err(err) => {
                warn!(path, error = %err, "failed to read mirror snapshot, starting empty");
                Self::new()
            }
        }
    }

    /// Write the current snapshot to a blob store (last write wins)
    pub fn persist_to(&self, blob: &dyn BlobStore, path: &str) -> Result<()> {
        let bytes =
            bincode::serialize(&self.to_snapshot()).map_err(PersistenceError::from)?;
        blob.write(path, &bytes)
    }
}

/// Durable portion of the mirror
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorSnapshot {
    pub chats: Vec<Chat>,
    pub contacts: Vec<Contact>,
    pub messages: Vec<Message>,
    pub labels: Vec<Label>,
}

// ----------------------------------------------------------------------------
// Mirror Handle
// ----------------------------------------------------------------------------

/// Capability handle over an optional mirror
///
/// Call sites never branch on "is there a store": an absent handle answers
/// queries with empty sets and treats mutations as no-ops.
#[derive(Clone, Default)]
pub struct MirrorHandle {
    inner: Option<Arc<RwLock<MirrorStore>>>,
}

impl MirrorHandle {
    /// Wrap an active mirror
    pub fn active(store: MirrorStore) -> Self {
        Self {
            inner: Some(Arc::new(RwLock::new(store))),
        }
    }

    /// A handle with no mirror behind it
    pub fn absent() -> Self {
        Self { inner: None }
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    /// Read access; `None` when absent
    pub fn read<R>(&self, f: impl FnOnce(&MirrorStore) -> R) -> Option<R> {
        self.inner.as_ref().map(|store| {
            let guard = store.read().unwrap_or_else(|e| e.into_inner());
            f(&guard)
        })
    }

    /// Write access; `None` when absent
    pub fn write<R>(&self, f: impl FnOnce(&mut MirrorStore) -> R) -> Option<R> {
        self.inner.as_ref().map(|store| {
            let mut guard = store.write().unwrap_or_else(|e| e.into_inner());
            f(&mut guard)
        })
    }

    /// Apply a batch if a mirror is present
    pub fn apply_batch(&self, batch: &EventBatch) {
        self.write(|store| store.apply_batch(batch));
    }

    pub fn labels(&self) -> Vec<Label> {
        self.read(MirrorStore::labels).unwrap_or_default()
    }

    pub fn label_ids(&self) -> Vec<LabelId> {
        self.read(MirrorStore::label_ids).unwrap_or_default()
    }

    pub fn chat_label_ids(&self, chat_id: &ChatId) -> Vec<LabelId> {
        self.read(|store| store.chat_label_ids(chat_id))
            .unwrap_or_default()
    }

    pub fn chat_labels(&self, chat_id: &ChatId) -> Vec<Label> {
        self.read(|store| store.chat_labels(chat_id))
            .unwrap_or_default()
    }

    pub fn set_chat_label_ids(&self, chat_id: &ChatId, label_ids: Vec<LabelId>) -> Vec<LabelId> {
        self.write(|store| store.set_chat_label_ids(chat_id, label_ids))
            .unwrap_or_default()
    }

    pub fn add_chat_label_ids(&self, chat_id: &ChatId, label_ids: Vec<LabelId>) -> Vec<LabelId> {
        self.write(|store| store.add_chat_label_ids(chat_id, label_ids))
            .unwrap_or_default()
    }

    pub fn del_chat_label_ids(
        &self,
        chat_id: &ChatId,
        selection: impl Into<LabelSelection>,
    ) -> Vec<LabelId> {
        let selection = selection.into();
        self.write(|store| store.del_chat_label_ids(chat_id, selection))
            .unwrap_or_default()
    }

    /// Snapshot the mirror to a blob store; absent handles succeed trivially
    pub fn persist_to(&self, blob: &dyn BlobStore, path: &str) -> Result<()> {
        match self.read(|store| store.persist_to(blob, path)) {
            Some(result) => result,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for MirrorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MessageUpsert, UpsertKind};
    use crate::model::DeliveryState;
    use crate::store::MemoryBlobStore;
    use crate::testing::text_message;
    use proptest::prelude::*;

    fn upsert_event(messages: Vec<Message>) -> Event {
        Event::MessageUpsert(MessageUpsert {
            kind: UpsertKind::Notify,
            messages,
        })
    }

    fn label(id: &str, name: &str) -> Label {
        Label {
            id: LabelId::new(id),
            name: Some(name.to_string()),
            color: Some(1),
            predefined_id: None,
            deleted: false,
        }
    }

    fn ids(raw: &[&str]) -> Vec<LabelId> {
        raw.iter().map(|s| LabelId::new(*s)).collect()
    }

    #[test]
    fn applying_the_same_upsert_twice_is_idempotent() {
        let mut store = MirrorStore::new();
        let event = upsert_event(vec![text_message("chat-1", "m-1", "hello")]);

        store.apply(&event);
        let once = store.chat_messages(&ChatId::new("chat-1")).to_vec();
        store.apply(&event);
        let twice = store.chat_messages(&ChatId::new("chat-1")).to_vec();

        assert_eq!(once.len(), 1);
        assert_eq!(once, twice);
    }

    #[test]
    fn set_replaces_regardless_of_prior_state() {
        let mut store = MirrorStore::new();
        let chat = ChatId::new("chat-1");
        store.upsert_label(label("1", "work"));
        store.upsert_label(label("2", "family"));

        store.set_chat_label_ids(&chat, ids(&["9", "8"]));
        let result = store.set_chat_label_ids(&chat, ids(&["1", "2"]));
        assert_eq!(result, ids(&["1", "2"]));
        assert_eq!(store.chat_label_ids(&chat), ids(&["1", "2"]));
    }

    #[test]
    fn add_unions_and_del_subtracts() {
        let mut store = MirrorStore::new();
        let chat = ChatId::new("chat-1");

        assert_eq!(store.add_chat_label_ids(&chat, ids(&["A"])), ids(&["A"]));
        assert_eq!(
            store.add_chat_label_ids(&chat, ids(&["B"])),
            ids(&["A", "B"])
        );
        assert_eq!(store.del_chat_label_ids(&chat, ids(&["A"])), ids(&["B"]));
    }

    #[test]
    fn del_all_on_unlabeled_chat_is_a_successful_noop() {
        let mut store = MirrorStore::new();
        let chat = ChatId::new("never-seen");
        assert_eq!(store.del_chat_label_ids(&chat, LabelSelection::All), vec![]);

        // Known chat without labels clears to empty as well
        store.apply(&upsert_event(vec![text_message("chat-1", "m", "x")]));
        assert_eq!(
            store.del_chat_label_ids(&ChatId::new("chat-1"), LabelSelection::All),
            vec![]
        );
    }

    #[test]
    fn dangling_label_ids_resolve_to_unknown_shells() {
        let mut store = MirrorStore::new();
        let chat = ChatId::new("chat-1");
        store.upsert_label(label("1", "work"));
        store.set_chat_label_ids(&chat, ids(&["1", "404"]));

        let labels = store.chat_labels(&chat);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].name.as_deref(), Some("work"));
        assert_eq!(labels[1].id, LabelId::new("404"));
        assert!(labels[1].name.is_none());
    }

    #[test]
    fn receipts_only_move_status_forward() {
        let mut store = MirrorStore::new();
        let mut message = text_message("c", "m", "hi");
        message.status = DeliveryState::Read;
        store.apply(&upsert_event(vec![message]));

        store.apply(&Event::ReceiptUpdate(vec![Receipt {
            chat_id: ChatId::new("c"),
            message_id: MessageId::new("m"),
            recipient: ContactId::new("peer"),
            status: DeliveryState::Delivered,
            timestamp: crate::types::Timestamp::now(),
        }]));

        assert_eq!(
            store
                .message(&ChatId::new("c"), &MessageId::new("m"))
                .unwrap()
                .status,
            DeliveryState::Read
        );
    }

    #[test]
    fn reactions_replace_per_sender_and_retract_on_none() {
        let mut store = MirrorStore::new();
        store.apply(&upsert_event(vec![text_message("c", "m", "hi")]));
        let chat = ChatId::new("c");
        let msg = MessageId::new("m");

        let mut reaction = Reaction {
            chat_id: chat.clone(),
            message_id: msg.clone(),
            sender: ContactId::new("peer"),
            emoji: Some("+1".into()),
        };
        store.apply(&Event::Reaction(vec![reaction.clone()]));
        reaction.emoji = Some("heart".into());
        store.apply(&Event::Reaction(vec![reaction.clone()]));

        let reactions = &store.message(&chat, &msg).unwrap().reactions;
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].emoji.as_deref(), Some("heart"));

        reaction.emoji = None;
        store.apply(&Event::Reaction(vec![reaction]));
        assert!(store.message(&chat, &msg).unwrap().reactions.is_empty());
    }

    #[test]
    fn chat_delete_drops_messages_too() {
        let mut store = MirrorStore::new();
        store.apply(&upsert_event(vec![text_message("c", "m", "hi")]));
        store.apply(&Event::ChatDelete(vec![ChatId::new("c")]));

        assert!(store.chat(&ChatId::new("c")).is_none());
        assert!(store.chat_messages(&ChatId::new("c")).is_empty());
    }

    #[test]
    fn snapshot_round_trips_through_a_blob_store() {
        let blob = MemoryBlobStore::new();
        let mut store = MirrorStore::new();
        store.upsert_label(label("1", "work"));
        store.apply(&upsert_event(vec![text_message("c", "m", "hi")]));
        store.set_chat_label_ids(&ChatId::new("c"), ids(&["1"]));
        store.persist_to(&blob, "mirror").unwrap();

        let restored = MirrorStore::hydrate(&blob, "mirror");
        assert_eq!(restored.chat_label_ids(&ChatId::new("c")), ids(&["1"]));
        assert_eq!(restored.chat_messages(&ChatId::new("c")).len(), 1);
        assert_eq!(restored.labels().len(), 1);
    }

    #[test]
    fn hydrate_tolerates_absence_and_corruption() {
        let blob = MemoryBlobStore::new();
        let empty = MirrorStore::hydrate(&blob, "mirror");
        assert_eq!(empty.chat_count(), 0);

        blob.write("mirror", b"garbage").unwrap();
        let still_empty = MirrorStore::hydrate(&blob, "mirror");
        assert_eq!(still_empty.chat_count(), 0);
    }

    #[test]
    fn absent_handle_answers_with_sentinels() {
        let handle = MirrorHandle::absent();
        let chat = ChatId::new("c");

        assert!(!handle.is_active());
        assert!(handle.labels().is_empty());
        assert!(handle.chat_label_ids(&chat).is_empty());
        assert!(handle.set_chat_label_ids(&chat, ids(&["1"])).is_empty());
        assert!(handle.del_chat_label_ids(&chat, LabelSelection::All).is_empty());
        handle.apply_batch(&EventBatch::new());
        assert!(handle
            .persist_to(&MemoryBlobStore::new(), "mirror")
            .is_ok());
    }

    proptest! {
        #[test]
        fn set_then_get_returns_exactly_the_deduped_input(
            raw in proptest::collection::vec("[a-z0-9]{1,6}", 0..12)
        ) {
            let mut store = MirrorStore::new();
            let chat = ChatId::new("chat");
            let input: Vec<LabelId> = raw.iter().map(|s| LabelId::new(s.as_str())).collect();

            let mut expected: Vec<LabelId> = Vec::new();
            for id in &input {
                if !expected.contains(id) {
                    expected.push(id.clone());
                }
            }

            let result = store.set_chat_label_ids(&chat, input);
            prop_assert_eq!(&result, &expected);
            prop_assert_eq!(store.chat_label_ids(&chat), expected);
        }

        #[test]
        fn del_removes_exactly_the_selected_ids(
            initial in proptest::collection::vec("[a-z]{1,4}", 0..10),
            removed in proptest::collection::vec("[a-z]{1,4}", 0..10)
        ) {
            let mut store = MirrorStore::new();
            let chat = ChatId::new("chat");
            let initial: Vec<LabelId> = initial.iter().map(|s| LabelId::new(s.as_str())).collect();
            let removed: Vec<LabelId> = removed.iter().map(|s| LabelId::new(s.as_str())).collect();

            store.set_chat_label_ids(&chat, initial.clone());
            let result = store.del_chat_label_ids(&chat, removed.clone());

            for id in &removed {
                prop_assert!(!result.contains(id));
            }
            for id in &result {
                prop_assert!(initial.contains(id));
            }
        }
    }
}
