use std::sync::Arc;
use std::time::Duration;

use bouquet_core::media::{Arrival, AttachmentEvent, MediaIngestor, OutcomeKind};
use bouquet_core::session::{
    InMemorySessionStore, SessionState, SessionStore, SqliteSessionStore, Stage,
};
use bouquet_core::test_utils::{FailingSessionStore, RecordingSink};
use bouquet_core::types::{BatchId, ConversationId, ItemRef};

const QUIET: Duration = Duration::from_millis(1500);

fn album(conversation_id: ConversationId, batch: &str, item: &str) -> AttachmentEvent {
    AttachmentEvent {
        conversation_id,
        item_ref: ItemRef::from(item),
        batch_id: Some(BatchId::from(batch)),
    }
}

async fn collecting(store: &dyn SessionStore, conversation_id: ConversationId, capacity: usize) {
    store
        .set(
            conversation_id,
            SessionState {
                stage: Stage::WaitingMedia,
                capacity,
                ..SessionState::default()
            },
        )
        .await
        .unwrap();
}

fn refs(items: &[&str]) -> Vec<ItemRef> {
    items.iter().map(|s| ItemRef::from(*s)).collect()
}

#[tokio::test(start_paused = true)]
async fn second_album_is_truncated_to_remaining_headroom() {
    let store = Arc::new(InMemorySessionStore::new());
    let sink = Arc::new(RecordingSink::new());
    let ingestor = MediaIngestor::new(store.clone(), sink.clone(), QUIET);
    let chat = ConversationId(1);
    collecting(store.as_ref(), chat, 6).await;

    for item in ["a1", "a2", "a3", "a4"] {
        ingestor.handle_arrival(album(chat, "A", item)).await.unwrap();
    }
    ingestor.wait_idle().await;
    assert_eq!(
        store.get(chat).await.unwrap().items,
        refs(&["a1", "a2", "a3", "a4"])
    );

    for item in ["b1", "b2", "b3"] {
        ingestor.handle_arrival(album(chat, "B", item)).await.unwrap();
    }
    ingestor.wait_idle().await;

    let state = store.get(chat).await.unwrap();
    assert_eq!(state.items, refs(&["a1", "a2", "a3", "a4", "b1", "b2"]));

    let outcomes = sink.outcomes();
    assert_eq!(outcomes.len(), 2);
    let (_, last) = outcomes[1];
    assert_eq!(last.offered, 3);
    assert_eq!(last.accepted, 2);
    assert_eq!(last.total, 6);
    assert_eq!(last.limit, 6);
    assert_eq!(last.kind(), OutcomeKind::Truncated);
}

#[tokio::test(start_paused = true)]
async fn each_album_finalizes_exactly_once() {
    let store = Arc::new(InMemorySessionStore::new());
    let sink = Arc::new(RecordingSink::new());
    let ingestor = MediaIngestor::new(store.clone(), sink.clone(), QUIET);
    let chat = ConversationId(2);
    collecting(store.as_ref(), chat, 10).await;

    let mut handles = Vec::new();
    for i in 0..5 {
        for batch in ["X", "Y"] {
            let ingestor = ingestor.clone();
            let event = album(chat, batch, &format!("{batch}{i}"));
            handles.push(tokio::spawn(async move {
                ingestor.handle_arrival(event).await
            }));
        }
    }
    for handle in handles {
        assert!(matches!(
            handle.await.unwrap().unwrap(),
            Arrival::Buffered { .. }
        ));
    }
    assert_eq!(ingestor.pending(), 2);

    ingestor.wait_idle().await;

    let outcomes = sink.outcomes();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|(_, o)| o.offered == 5 && o.accepted == 5));
    assert_eq!(store.get(chat).await.unwrap().items.len(), 10);
    assert_eq!(ingestor.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn albums_in_different_conversations_do_not_mix() {
    let store = Arc::new(InMemorySessionStore::new());
    let sink = Arc::new(RecordingSink::new());
    let ingestor = MediaIngestor::new(store.clone(), sink.clone(), QUIET);
    let (left, right) = (ConversationId(10), ConversationId(11));
    collecting(store.as_ref(), left, 6).await;
    collecting(store.as_ref(), right, 6).await;

    ingestor.handle_arrival(album(left, "L", "l1")).await.unwrap();
    ingestor.handle_arrival(album(right, "R", "r1")).await.unwrap();
    ingestor.handle_arrival(album(left, "L", "l2")).await.unwrap();
    ingestor.wait_idle().await;

    assert_eq!(store.get(left).await.unwrap().items, refs(&["l1", "l2"]));
    assert_eq!(store.get(right).await.unwrap().items, refs(&["r1"]));
}

#[tokio::test]
async fn full_session_reports_limit_for_single_items() {
    let store = Arc::new(InMemorySessionStore::new());
    let sink = Arc::new(RecordingSink::new());
    let ingestor = MediaIngestor::new(store.clone(), sink.clone(), QUIET);
    let chat = ConversationId(3);
    collecting(store.as_ref(), chat, 1).await;

    let single = |item: &str| AttachmentEvent {
        conversation_id: chat,
        item_ref: ItemRef::from(item),
        batch_id: None,
    };
    ingestor.handle_arrival(single("p1")).await.unwrap();
    let second = ingestor.handle_arrival(single("p2")).await.unwrap();

    let Arrival::Merged(outcome) = second else {
        panic!("expected a merge, got {second:?}");
    };
    assert_eq!(outcome.kind(), OutcomeKind::LimitReached);
    assert_eq!(store.get(chat).await.unwrap().items, refs(&["p1"]));
    assert_eq!(sink.outcomes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_merge_loses_album_without_notifying() {
    let sink = Arc::new(RecordingSink::new());
    let ingestor = MediaIngestor::new(Arc::new(FailingSessionStore), sink.clone(), QUIET);
    let chat = ConversationId(4);

    ingestor.handle_arrival(album(chat, "F", "f1")).await.unwrap();
    ingestor.wait_idle().await;

    assert!(sink.outcomes().is_empty());
    assert_eq!(ingestor.pending(), 0);
}

#[tokio::test]
async fn single_item_store_failure_is_returned() {
    let sink = Arc::new(RecordingSink::new());
    let ingestor = MediaIngestor::new(Arc::new(FailingSessionStore), sink.clone(), QUIET);

    let result = ingestor
        .handle_arrival(AttachmentEvent {
            conversation_id: ConversationId(5),
            item_ref: ItemRef::from("x"),
            batch_id: None,
        })
        .await;

    assert!(result.is_err());
    assert!(sink.outcomes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn notification_failure_keeps_the_merge() {
    let store = Arc::new(InMemorySessionStore::new());
    let sink = Arc::new(RecordingSink::failing());
    let ingestor = MediaIngestor::new(store.clone(), sink.clone(), QUIET);
    let chat = ConversationId(6);
    collecting(store.as_ref(), chat, 6).await;

    ingestor.handle_arrival(album(chat, "N", "n1")).await.unwrap();
    ingestor.handle_arrival(album(chat, "N", "n2")).await.unwrap();
    ingestor.wait_idle().await;

    assert_eq!(store.get(chat).await.unwrap().items, refs(&["n1", "n2"]));
    assert_eq!(sink.outcomes().len(), 1);
}

#[tokio::test]
async fn albums_merge_into_sqlite_sessions() {
    let store = Arc::new(SqliteSessionStore::new_in_memory().await.unwrap());
    let sink = Arc::new(RecordingSink::new());
    let ingestor = MediaIngestor::new(store.clone(), sink.clone(), Duration::from_millis(50));
    let chat = ConversationId(7);
    collecting(store.as_ref(), chat, 2).await;

    for item in ["s1", "s2", "s3"] {
        ingestor.handle_arrival(album(chat, "S", item)).await.unwrap();
    }
    ingestor.wait_idle().await;

    assert_eq!(store.get(chat).await.unwrap().items, refs(&["s1", "s2"]));
    let (_, outcome) = sink.outcomes()[0];
    assert_eq!(outcome.discarded(), 1);
}
