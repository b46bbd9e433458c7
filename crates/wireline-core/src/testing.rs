//! In-memory test doubles for the transport and codec capabilities
//!
//! [`MemoryTransport`] is driven from the outside through a
//! [`TransportScript`] handle; [`ScriptCodec`] moves classified items as
//! bincode frames. Together they let tests feed a connection exact inbound
//! cycles and inspect everything it wrote, without a network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::{ClientError, Result};
use crate::events::DisconnectReason;
use crate::model::{DeliveryState, Message};
use crate::transport::{FrameCodec, Inbound, Outbound, Transport, TransportRead};
use crate::types::{ChatId, MessageId, Timestamp};

// ----------------------------------------------------------------------------
// Memory Transport
// ----------------------------------------------------------------------------

/// Transport double fed by a [`TransportScript`]
pub struct MemoryTransport {
    reads: mpsc::UnboundedReceiver<TransportRead>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

/// Driver handle for a [`MemoryTransport`]
#[derive(Clone)]
pub struct TransportScript {
    reads: mpsc::UnboundedSender<TransportRead>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

/// Create a connected transport double and its script handle
pub fn memory_transport() -> (MemoryTransport, TransportScript) {
    let (read_tx, read_rx) = mpsc::unbounded_channel();
    let writes = Arc::new(Mutex::new(Vec::new()));
    (
        MemoryTransport {
            reads: read_rx,
            writes: writes.clone(),
        },
        TransportScript {
            reads: read_tx,
            writes,
        },
    )
}

impl TransportScript {
    /// Deliver one read cycle of classified items, framed for [`ScriptCodec`]
    pub fn deliver(&self, items: Vec<Inbound>) {
        let frame = bincode::serialize(&items).expect("inbound script items must serialize");
        let _ = self.reads.send(TransportRead::Data(frame));
    }

    /// Deliver one raw frame
    pub fn deliver_raw(&self, frame: Vec<u8>) {
        let _ = self.reads.send(TransportRead::Data(frame));
    }

    /// End the link with the given reason
    pub fn close(&self, reason: DisconnectReason) {
        let _ = self.reads.send(TransportRead::Closed(reason));
    }

    /// Raw frames the connection wrote so far
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Written frames decoded back into outbound requests
    ///
    /// Frames that are not [`ScriptCodec`]-encoded outbound values are
    /// skipped.
    pub fn written_outbound(&self) -> Vec<Outbound> {
        self.writes()
            .iter()
            .filter_map(|frame| bincode::deserialize(frame).ok())
            .collect()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn read(&mut self) -> Result<TransportRead> {
        match self.reads.recv().await {
            Some(read) => Ok(read),
            // Script handle dropped without an explicit close
            None => Ok(TransportRead::Closed(DisconnectReason::ConnectionLost {
                reason: "transport script dropped".into(),
            })),
        }
    }

    async fn write(&mut self, frame: &[u8]) -> Result<()> {
        self.writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame.to_vec());
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Script Codec
// ----------------------------------------------------------------------------

/// Codec double: frames are bincode-encoded item vectors
#[derive(Debug, Default)]
pub struct ScriptCodec;

impl ScriptCodec {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FrameCodec for ScriptCodec {
    async fn decode(&mut self, frame: &[u8]) -> Result<Vec<Inbound>> {
        bincode::deserialize(frame).map_err(|err| ClientError::codec(err.to_string()))
    }

    async fn encode(&mut self, outbound: Outbound) -> Result<Vec<u8>> {
        bincode::serialize(&outbound).map_err(|err| ClientError::codec(err.to_string()))
    }
}

// ----------------------------------------------------------------------------
// Fixture Helpers
// ----------------------------------------------------------------------------

/// Build a plain incoming text message for fixtures
pub fn text_message(chat_id: &str, message_id: &str, text: &str) -> Message {
    Message {
        id: MessageId::new(message_id),
        chat_id: ChatId::new(chat_id),
        from_me: false,
        sender: None,
        text: Some(text.to_string()),
        timestamp: Timestamp::now(),
        status: DeliveryState::Delivered,
        reactions: Vec::new(),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_frames_round_trip_through_the_codec() {
        let (mut transport, script) = memory_transport();
        let mut codec = ScriptCodec::new();

        script.deliver(vec![Inbound::HandshakeComplete]);
        let read = transport.read().await.unwrap();
        let frame = match read {
            TransportRead::Data(frame) => frame,
            other => panic!("expected data, got {other:?}"),
        };
        let items = codec.decode(&frame).await.unwrap();
        assert_eq!(items, vec![Inbound::HandshakeComplete]);
    }

    #[tokio::test]
    async fn writes_are_recorded_and_decodable() {
        let (mut transport, script) = memory_transport();
        let mut codec = ScriptCodec::new();

        let frame = codec
            .encode(Outbound::Payload(vec![1, 2, 3]))
            .await
            .unwrap();
        transport.write(&frame).await.unwrap();

        assert_eq!(
            script.written_outbound(),
            vec![Outbound::Payload(vec![1, 2, 3])]
        );
    }

    #[tokio::test]
    async fn dropped_script_reads_as_recoverable_close() {
        let (mut transport, script) = memory_transport();
        drop(script);
        let read = transport.read().await.unwrap();
        assert!(matches!(
            read,
            TransportRead::Closed(DisconnectReason::ConnectionLost { .. })
        ));
    }
}
