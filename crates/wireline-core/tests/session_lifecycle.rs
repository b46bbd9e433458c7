//! Session lifecycle behavior across connections
//!
//! Exercises the connection manager against scripted transports: retry
//! bookkeeping that survives restarts, credentials-update ordering within a
//! cycle, and close-cause reporting.

use std::sync::Arc;

use wireline_core::testing::{memory_transport, text_message, ScriptCodec, TransportScript};
use wireline_core::{
    ChannelConfig, ChatId, CloseCause, ConnectionManager, ConnectionState, ConnectionStatus,
    CredentialStore, DisconnectReason, Event, EventCategory, EventStream, Inbound, MemoryBlobStore,
    MessageId, MessageUpsert, Outbound, RetryConfig, RetryLedger, SessionKeyId, UpsertKind,
};

fn new_manager(
    credentials: Arc<CredentialStore>,
    ledger: Arc<RetryLedger>,
) -> ConnectionManager {
    ConnectionManager::new(
        credentials,
        ledger,
        ChannelConfig::default(),
        RetryConfig::default(),
    )
}

fn fresh_credentials() -> Arc<CredentialStore> {
    Arc::new(CredentialStore::load(
        Arc::new(MemoryBlobStore::new()),
        "auth/creds",
    ))
}

async fn drain(stream: &mut EventStream) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

fn undecryptable(message_id: &str) -> Inbound {
    Inbound::Undecryptable {
        chat_id: ChatId::new("chat-1"),
        message_id: MessageId::new(message_id),
    }
}

fn retry_counts(script: &TransportScript) -> Vec<u32> {
    script
        .written_outbound()
        .into_iter()
        .filter_map(|outbound| match outbound {
            Outbound::RetryRequest { count, .. } => Some(count),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn retry_counts_survive_connection_restarts() {
    let credentials = fresh_credentials();
    let ledger = Arc::new(RetryLedger::new());
    let message = MessageId::new("m-1");

    // First connection sees one failed decrypt
    let mut first = new_manager(credentials.clone(), ledger.clone());
    let (transport, script1) = memory_transport();
    let mut stream = first
        .open(Box::new(transport), Box::new(ScriptCodec::new()))
        .unwrap();
    script1.deliver(vec![Inbound::HandshakeComplete]);
    script1.deliver(vec![undecryptable("m-1")]);
    script1.close(DisconnectReason::ConnectionLost {
        reason: "network reset".into(),
    });
    drain(&mut stream).await;

    assert_eq!(ledger.get(&message), 1);
    assert_eq!(retry_counts(&script1), vec![1]);

    // A brand-new manager after the reconnect observes the same count:
    // the second failure for the same message is attempt two, not one.
    let mut second = new_manager(credentials, ledger.clone());
    let (transport, script2) = memory_transport();
    let mut stream = second
        .open(Box::new(transport), Box::new(ScriptCodec::new()))
        .unwrap();
    script2.deliver(vec![Inbound::HandshakeComplete]);
    script2.deliver(vec![undecryptable("m-1")]);
    script2.close(DisconnectReason::ConnectionLost {
        reason: "network reset".into(),
    });
    drain(&mut stream).await;

    assert_eq!(ledger.get(&message), 2);
    assert_eq!(retry_counts(&script2), vec![2]);
}

#[tokio::test]
async fn retry_requests_stop_once_the_budget_is_spent() {
    let credentials = fresh_credentials();
    let ledger = Arc::new(RetryLedger::new());
    let mut manager = ConnectionManager::new(
        credentials,
        ledger.clone(),
        ChannelConfig::default(),
        RetryConfig {
            max_retry_requests: 2,
        },
    );

    let (transport, script) = memory_transport();
    let mut stream = manager
        .open(Box::new(transport), Box::new(ScriptCodec::new()))
        .unwrap();
    script.deliver(vec![Inbound::HandshakeComplete]);
    for _ in 0..4 {
        script.deliver(vec![undecryptable("m-loop")]);
    }
    script.close(DisconnectReason::ConnectionLost {
        reason: "done".into(),
    });
    drain(&mut stream).await;

    // The ledger keeps counting, the wire stops asking
    assert_eq!(ledger.get(&MessageId::new("m-loop")), 4);
    assert_eq!(retry_counts(&script), vec![1, 2]);
}

#[tokio::test]
async fn credentials_update_precedes_other_events_of_the_same_cycle() {
    let credentials = fresh_credentials();
    let mut manager = new_manager(credentials.clone(), Arc::new(RetryLedger::new()));
    let (transport, script) = memory_transport();
    let mut stream = manager
        .open(Box::new(transport), Box::new(ScriptCodec::new()))
        .unwrap();

    // Key rotation arrives last on the wire, application event in between
    script.deliver(vec![
        Inbound::HandshakeComplete,
        Inbound::Event(Event::MessageUpsert(MessageUpsert {
            kind: UpsertKind::Notify,
            messages: vec![text_message("chat-1", "m-1", "hi")],
        })),
        Inbound::KeyRotation(vec![(SessionKeyId::new("sk-1"), vec![1, 2, 3])]),
    ]);
    script.close(DisconnectReason::ClosedByCaller);
    let events = drain(&mut stream).await;

    let position = |category: EventCategory| {
        events
            .iter()
            .position(|e| e.category() == category)
            .unwrap_or_else(|| panic!("no {category} event"))
    };

    let creds_at = position(EventCategory::CredentialsUpdate);
    assert!(creds_at < position(EventCategory::MessageUpsert));
    // The open connection-update belongs to the same cycle and also waits
    let open_at = events
        .iter()
        .position(|e| {
            matches!(
                e,
                Event::ConnectionUpdate(update) if update.status == ConnectionStatus::Open
            )
        })
        .expect("no open update");
    assert!(creds_at < open_at);

    // The rotation itself landed in the store before the event went out
    assert!(credentials
        .with(|c| c.session_key(&SessionKeyId::new("sk-1")).cloned())
        .is_some());
}

#[tokio::test]
async fn send_reaches_the_transport_once_open() {
    let mut manager = new_manager(fresh_credentials(), Arc::new(RetryLedger::new()));
    let (transport, script) = memory_transport();
    let mut stream = manager
        .open(Box::new(transport), Box::new(ScriptCodec::new()))
        .unwrap();
    script.deliver(vec![Inbound::HandshakeComplete]);

    // Wait for the open update before sending
    loop {
        match stream.next().await.expect("stream ended early") {
            Event::ConnectionUpdate(update) if update.status == ConnectionStatus::Open => break,
            _ => {}
        }
    }

    manager.send(b"application payload".to_vec()).await.unwrap();
    assert!(script
        .written_outbound()
        .contains(&Outbound::Payload(b"application payload".to_vec())));

    manager.close().await;
    drain(&mut stream).await;
}

#[tokio::test]
async fn transport_failure_reports_a_recoverable_cause() {
    let mut manager = new_manager(fresh_credentials(), Arc::new(RetryLedger::new()));
    let (transport, script) = memory_transport();
    let mut stream = manager
        .open(Box::new(transport), Box::new(ScriptCodec::new()))
        .unwrap();

    script.deliver(vec![Inbound::HandshakeComplete]);
    script.close(DisconnectReason::ConnectionLost {
        reason: "cable pulled".into(),
    });
    let events = drain(&mut stream).await;

    let last = events.last().expect("stream emitted nothing");
    match last {
        Event::ConnectionUpdate(update) => {
            assert_eq!(update.status, ConnectionStatus::Closed);
            assert!(matches!(
                update.cause,
                Some(DisconnectReason::ConnectionLost { .. })
            ));
        }
        other => panic!("expected a final connection-update, got {other:?}"),
    }

    assert!(matches!(
        manager.state(),
        ConnectionState::Closed(CloseCause::Recoverable(
            DisconnectReason::ConnectionLost { .. }
        ))
    ));

    // A recoverable close permits opening again
    let (transport, _script) = memory_transport();
    assert!(manager
        .open(Box::new(transport), Box::new(ScriptCodec::new()))
        .is_ok());
    manager.close().await;
}
