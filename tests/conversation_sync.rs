//! Integration tests for conversations and live message delivery.
//!
//! Covers the guarantees that only show up with several callers at once:
//! concurrent conversation creation, subscribers converging on one log,
//! subscription teardown, and the message ordering property.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tokio::sync::mpsc;
use tokio::time::timeout;

use neocare::adapters::{InMemoryDocumentStore, ManualClock, SystemClock};
use neocare::application::{ConversationRegistry, MessageStream, Update};
use neocare::domain::conversation::{
    Conversation, Message, ParticipantPair, CONVERSATIONS_COLLECTION,
};
use neocare::domain::foundation::{
    ConversationId, CoreError, ParticipantId, Principal, Timestamp,
};
use neocare::ports::{Clock, DocumentStore, WriteMode};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn id(s: &str) -> ParticipantId {
    ParticipantId::new(s).unwrap()
}

struct Chat {
    store: Arc<InMemoryDocumentStore>,
    registry: Arc<ConversationRegistry>,
    messages: Arc<MessageStream>,
}

impl Chat {
    fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        let registry = Arc::new(ConversationRegistry::new(store.clone(), clock.clone()));
        let messages = Arc::new(MessageStream::new(store.clone(), clock, registry.clone()));
        Self {
            store,
            registry,
            messages,
        }
    }

    fn new() -> Self {
        Self::with_clock(Arc::new(ManualClock::starting_at(Timestamp::now())))
    }
}

/// Forwards every update of a subscription into a channel.
fn collector() -> (
    impl FnMut(Update<Message>) + Send + 'static,
    mpsc::UnboundedReceiver<Update<Message>>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |update| {
            let _ = tx.send(update);
        },
        rx,
    )
}

/// Waits for the first snapshot holding `len` messages.
async fn snapshot_of_len(rx: &mut mpsc::UnboundedReceiver<Update<Message>>, len: usize) -> Vec<Message> {
    timeout(Duration::from_secs(2), async {
        loop {
            let messages = rx.recv().await.unwrap().unwrap();
            if messages.len() == len {
                return messages;
            }
        }
    })
    .await
    .unwrap()
}

fn texts(messages: &[Message]) -> Vec<&str> {
    messages.iter().map(|m| m.text.as_str()).collect()
}

// =============================================================================
// Conversation registry
// =============================================================================

#[tokio::test]
async fn concurrent_opens_converge_on_one_conversation() {
    let chat = Chat::new();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let registry = chat.registry.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    registry.find_or_create(&id("amara"), &id("dr-bello")).await
                } else {
                    registry.find_or_create(&id("dr-bello"), &id("amara")).await
                }
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(chat.store.count(CONVERSATIONS_COLLECTION).await, 1);
}

#[tokio::test]
async fn outsiders_cannot_read_or_write() {
    let chat = Chat::new();
    let amara = Principal::client(id("amara"));
    let conversation = chat
        .registry
        .open_with(&amara, &id("dr-bello"))
        .await
        .unwrap();
    let outsider = Principal::client(id("eve"));

    assert!(matches!(
        chat.messages.append(&outsider, &conversation.id, "hi").await,
        Err(CoreError::Forbidden)
    ));
    assert!(matches!(
        chat.messages.history(&outsider, &conversation.id).await,
        Err(CoreError::Forbidden)
    ));
    assert!(chat.registry.list_for(&outsider).await.unwrap().is_empty());
}

#[tokio::test]
async fn legacy_duplicates_share_one_log() {
    let chat = Chat::new();
    let amara = Principal::client(id("amara"));
    let pair = ParticipantPair::new(id("amara"), id("dr-bello")).unwrap();

    // two records for one pair, as left behind by query-then-create
    let started = Timestamp::now();
    for (doc_id, at) in [("legacy-1", started), ("legacy-2", started.plus_minutes(5))] {
        let conversation = Conversation {
            id: ConversationId::new(doc_id).unwrap(),
            participant_a: pair.first().clone(),
            participant_b: pair.second().clone(),
            created_at: at,
            redirect_to: None,
        };
        chat.store
            .put(
                CONVERSATIONS_COLLECTION,
                doc_id,
                serde_json::to_value(&conversation).unwrap(),
                WriteMode::Replace,
            )
            .await
            .unwrap();
    }
    let late = ConversationId::new("legacy-2").unwrap();
    chat.messages.append(&amara, &late, "written to the duplicate").await.unwrap();

    let canonical = chat.registry.open_with(&amara, &id("dr-bello")).await.unwrap();
    assert_eq!(canonical.id.as_str(), "legacy-1");
    chat.messages
        .append(&amara, &canonical.id, "written to the canonical")
        .await
        .unwrap();

    let log = chat.messages.history(&amara, &canonical.id).await.unwrap();
    assert_eq!(
        texts(&log),
        vec!["written to the duplicate", "written to the canonical"]
    );

    // the duplicate id still resolves, through the redirect
    let via_duplicate = chat.messages.history(&amara, &late).await.unwrap();
    assert_eq!(via_duplicate, log);
    assert_eq!(chat.registry.list_for(&amara).await.unwrap().len(), 1);
}

#[tokio::test]
async fn subscriber_on_a_duplicate_follows_reconciliation() {
    let chat = Chat::new();
    let amara = Principal::client(id("amara"));
    let pair = ParticipantPair::new(id("amara"), id("dr-bello")).unwrap();

    let started = Timestamp::now();
    for (doc_id, at) in [("legacy-1", started), ("legacy-2", started.plus_minutes(5))] {
        let conversation = Conversation {
            id: ConversationId::new(doc_id).unwrap(),
            participant_a: pair.first().clone(),
            participant_b: pair.second().clone(),
            created_at: at,
            redirect_to: None,
        };
        chat.store
            .put(
                CONVERSATIONS_COLLECTION,
                doc_id,
                serde_json::to_value(&conversation).unwrap(),
                WriteMode::Replace,
            )
            .await
            .unwrap();
    }
    let late = ConversationId::new("legacy-2").unwrap();
    chat.messages.append(&amara, &late, "before reconciling").await.unwrap();

    // attached while legacy-2 is still a standalone record
    let (on_change, mut rx) = collector();
    let _subscription = chat
        .messages
        .subscribe(&amara, &late, on_change)
        .await
        .unwrap();
    snapshot_of_len(&mut rx, 1).await;

    let canonical = chat.registry.reconcile_duplicates(&pair).await.unwrap().unwrap();
    assert_eq!(canonical.id.as_str(), "legacy-1");
    chat.messages
        .append(&amara, &canonical.id, "after reconciling")
        .await
        .unwrap();

    let seen = snapshot_of_len(&mut rx, 2).await;
    assert_eq!(texts(&seen), vec!["before reconciling", "after reconciling"]);
}

// =============================================================================
// Live delivery
// =============================================================================

#[tokio::test]
async fn subscribers_converge_on_the_same_log() {
    let chat = Chat::new();
    let amara = Principal::client(id("amara"));
    let bello = Principal::consultant(id("dr-bello"));
    let conversation = chat.registry.open_with(&amara, &bello.id).await.unwrap();

    let (on_amara, mut amara_rx) = collector();
    let (on_bello, mut bello_rx) = collector();
    let _amara_sub = chat
        .messages
        .subscribe(&amara, &conversation.id, on_amara)
        .await
        .unwrap();
    let _bello_sub = chat
        .messages
        .subscribe(&bello, &conversation.id, on_bello)
        .await
        .unwrap();

    let writers = [
        (amara.clone(), "Hello doctor"),
        (bello.clone(), "Good morning"),
        (amara.clone(), "I have a question"),
        (bello.clone(), "Go ahead"),
    ];
    let handles: Vec<_> = writers
        .into_iter()
        .map(|(author, text)| {
            let messages = chat.messages.clone();
            let conversation_id = conversation.id.clone();
            tokio::spawn(async move { messages.append(&author, &conversation_id, text).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let seen_by_amara = snapshot_of_len(&mut amara_rx, 4).await;
    let seen_by_bello = snapshot_of_len(&mut bello_rx, 4).await;
    assert_eq!(seen_by_amara, seen_by_bello);
    assert!(seen_by_amara
        .windows(2)
        .all(|w| w[0].created_at < w[1].created_at));
}

#[tokio::test]
async fn unsubscribe_stops_delivery_and_is_idempotent() {
    let chat = Chat::new();
    let amara = Principal::client(id("amara"));
    let conversation = chat
        .registry
        .open_with(&amara, &id("dr-bello"))
        .await
        .unwrap();

    let (on_change, mut rx) = collector();
    let subscription = chat
        .messages
        .subscribe(&amara, &conversation.id, on_change)
        .await
        .unwrap();
    snapshot_of_len(&mut rx, 0).await;

    subscription.unsubscribe();
    subscription.unsubscribe();
    assert!(!subscription.is_active());

    chat.messages.append(&amara, &conversation.id, "anyone?").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    while let Ok(update) = rx.try_recv() {
        assert!(update.unwrap().is_empty());
    }
}

#[tokio::test]
async fn late_subscriber_gets_the_full_history_first() {
    let chat = Chat::with_clock(Arc::new(SystemClock::new()));
    let amara = Principal::client(id("amara"));
    let conversation = chat
        .registry
        .open_with(&amara, &id("dr-bello"))
        .await
        .unwrap();
    for text in ["one", "two", "three"] {
        chat.messages.append(&amara, &conversation.id, text).await.unwrap();
    }

    let (on_change, mut rx) = collector();
    let _subscription = chat
        .messages
        .subscribe(&amara, &conversation.id, on_change)
        .await
        .unwrap();
    let first = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(texts(&first), vec!["one", "two", "three"]);
}

// =============================================================================
// Ordering property
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn history_preserves_append_order(
        script in prop::collection::vec((any::<bool>(), "[a-z ]{0,12}[a-z]"), 1..12)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (expected, log) = runtime.block_on(async {
            let chat = Chat::new();
            let amara = Principal::client(id("amara"));
            let bello = Principal::consultant(id("dr-bello"));
            let conversation = chat.registry.open_with(&amara, &bello.id).await.unwrap();

            for (from_client, text) in &script {
                let author = if *from_client { &amara } else { &bello };
                chat.messages.append(author, &conversation.id, text).await.unwrap();
            }
            let log = chat.messages.history(&bello, &conversation.id).await.unwrap();
            (script.clone(), log)
        });

        prop_assert_eq!(log.len(), expected.len());
        for (message, (from_client, text)) in log.iter().zip(&expected) {
            let author = if *from_client { "amara" } else { "dr-bello" };
            prop_assert_eq!(message.author_id.as_str(), author);
            prop_assert_eq!(message.text.as_str(), text.trim());
        }
        prop_assert!(log.windows(2).all(|w| w[0].created_at < w[1].created_at));
    }
}
