//! End-to-end tests through the `Cardroom` facade.

use std::sync::Arc;
use std::time::Duration;

use cardroom::prelude::*;
use cardroom_session::SequentialIds;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::TryRecvError;

// =========================================================================
// Helpers
// =========================================================================

fn cardroom() -> (Cardroom<ChannelBroadcaster>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let cardroom = Cardroom::builder()
        .clock(clock.clone())
        .id_generator(Arc::new(SequentialIds::new("id-")))
        .spawn_evictor(false)
        .build();
    (cardroom, clock)
}

fn to_json(update: &Update) -> Value {
    serde_json::to_value(update).unwrap()
}

// =========================================================================
// Sessions
// =========================================================================

#[tokio::test]
async fn test_create_session_and_look_it_up() {
    let (cardroom, _clock) = cardroom();

    let created = cardroom.create_session("Sprint 1").await;

    assert_eq!(created.name, "Sprint 1");
    assert!(created.participants.is_empty());
    assert_eq!(
        cardroom.session_name(&created.id).await.as_deref(),
        Some("Sprint 1")
    );
    assert_eq!(cardroom.snapshot(&created.id).await.unwrap().id, created.id);
}

#[tokio::test]
async fn test_unknown_session_lookups() {
    let (cardroom, _clock) = cardroom();
    let missing = SessionId::from("missing");

    assert!(cardroom.session_name(&missing).await.is_none());
    assert!(matches!(
        cardroom.snapshot(&missing).await,
        Err(CardroomError::Session(_))
    ));
}

// =========================================================================
// A round over the wire
// =========================================================================

#[tokio::test]
async fn test_round_over_json_frames() {
    let (cardroom, _clock) = cardroom();
    let session = cardroom.create_session("Sprint 1").await;
    let sid = session.id.as_str();
    let mut updates = cardroom.subscribe(&session.id);

    let frames = [
        json!({"type": "JOIN", "sessionId": sid, "participantId": "p1", "participantName": "Alice"}),
        json!({"type": "VOTE", "sessionId": sid, "participantId": "p1", "selection": "5"}),
        json!({"type": "REVEAL", "sessionId": sid}),
        json!({"type": "RESET", "sessionId": sid}),
    ];
    for frame in &frames {
        cardroom
            .dispatch_bytes(frame.to_string().as_bytes())
            .await
            .unwrap();
    }

    let mut received = Vec::new();
    for _ in 0..frames.len() {
        received.push(to_json(&updates.recv().await.unwrap()));
    }

    assert_eq!(
        received[2],
        json!({
            "type": "UPDATE",
            "sessionId": sid,
            "participants": [{"id": "p1", "name": "Alice", "selection": "5"}],
            "revealed": true,
            "resetting": false,
        })
    );
    assert_eq!(
        received[3],
        json!({
            "type": "UPDATE",
            "sessionId": sid,
            "participants": [{"id": "p1", "name": "Alice", "selection": ""}],
            "revealed": false,
            "resetting": true,
        })
    );
    assert!(!cardroom.snapshot(&session.id).await.unwrap().resetting);
}

#[tokio::test]
async fn test_dispatch_bytes_rejects_garbage() {
    let (cardroom, _clock) = cardroom();

    let err = cardroom.dispatch_bytes(b"not json").await.unwrap_err();

    assert!(matches!(err, CardroomError::Engine(_)));
}

#[tokio::test]
async fn test_last_leave_closes_subscription() {
    let (cardroom, _clock) = cardroom();
    let session = cardroom.create_session("S").await;
    let mut updates = cardroom.subscribe(&session.id);

    cardroom
        .dispatch(Action::join(session.id.clone(), Some(ParticipantId::from("p1")), "Alice"))
        .await;
    cardroom
        .dispatch(Action::leave(session.id.clone(), ParticipantId::from("p1")))
        .await;

    assert_eq!(updates.recv().await.unwrap().participants.len(), 1);
    assert!(updates.recv().await.unwrap().participants.is_empty());
    assert!(updates.recv().await.is_err(), "channel closed after removal");
    assert!(cardroom.session_name(&session.id).await.is_none());
}

// =========================================================================
// Eviction
// =========================================================================

#[tokio::test]
async fn test_reap_stale_on_demand() {
    let (cardroom, clock) = cardroom();
    let idle = cardroom.create_session("idle").await;
    clock.advance(Duration::from_secs(3_601));
    let fresh = cardroom.create_session("fresh").await;

    assert_eq!(cardroom.reap_stale().await, 1);
    assert!(cardroom.session_name(&idle.id).await.is_none());
    assert!(cardroom.session_name(&fresh.id).await.is_some());
    assert_eq!(cardroom.evictor_metrics().total_reaped, 1);
}

#[tokio::test]
async fn test_reaped_session_closes_subscription() {
    let (cardroom, clock) = cardroom();
    let idle = cardroom.create_session("idle").await;
    let mut updates = cardroom.subscribe(&idle.id);
    let channel = channel_key(&idle.id);
    assert_eq!(cardroom.broadcaster().subscriber_count(&channel), 1);

    clock.advance(Duration::from_secs(3_601));
    assert_eq!(cardroom.reap_stale().await, 1);

    assert!(matches!(updates.try_recv(), Err(TryRecvError::Closed)));
    assert_eq!(cardroom.broadcaster().subscriber_count(&channel), 0);
}

#[tokio::test(start_paused = true)]
async fn test_background_evictor_runs_until_shutdown() {
    let clock = Arc::new(ManualClock::new());
    let config = CardroomConfig::from_json_str(r#"{"evictor": {"interval_secs": 10}}"#).unwrap();
    let cardroom = Cardroom::builder()
        .config(config)
        .clock(clock.clone())
        .build();

    let idle = cardroom.create_session("idle").await;
    clock.advance(Duration::from_secs(601));

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(cardroom.session_name(&idle.id).await.is_none());
    assert_eq!(cardroom.evictor_metrics().total_ticks, 1);

    cardroom.shutdown().await;
    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(cardroom.evictor_metrics().total_ticks, 1);

    // Sessions remain usable after the evictor stops.
    let after = cardroom.create_session("after").await;
    assert!(cardroom
        .dispatch(Action::reveal(after.id.clone()))
        .await
        .unwrap()
        .revealed);
}

// =========================================================================
// Capacity
// =========================================================================

#[tokio::test]
async fn test_capacity_evicts_least_recently_active() {
    let clock = Arc::new(ManualClock::new());
    let mut config = CardroomConfig::default();
    config.registry.max_sessions = 3;
    let cardroom = Cardroom::builder()
        .config(config)
        .clock(clock.clone())
        .spawn_evictor(false)
        .build();

    let mut sessions = Vec::new();
    for name in ["a", "b", "c"] {
        sessions.push(cardroom.create_session(name).await);
        clock.advance(Duration::from_secs(1));
    }
    cardroom.dispatch(Action::reveal(sessions[0].id.clone())).await;

    cardroom.create_session("d").await;

    assert_eq!(cardroom.registry().len().await, 3);
    assert!(cardroom.session_name(&sessions[0].id).await.is_some());
    assert!(cardroom.session_name(&sessions[1].id).await.is_none());
}

#[tokio::test]
async fn test_evicted_session_closes_subscription() {
    let clock = Arc::new(ManualClock::new());
    let mut config = CardroomConfig::default();
    config.registry.max_sessions = 2;
    let cardroom = Cardroom::builder()
        .config(config)
        .clock(clock.clone())
        .spawn_evictor(false)
        .build();

    let oldest = cardroom.create_session("oldest").await;
    clock.advance(Duration::from_secs(1));
    let kept = cardroom.create_session("kept").await;
    let mut evicted_updates = cardroom.subscribe(&oldest.id);
    let mut kept_updates = cardroom.subscribe(&kept.id);

    cardroom.create_session("newest").await;

    assert!(matches!(evicted_updates.try_recv(), Err(TryRecvError::Closed)));
    assert!(matches!(kept_updates.try_recv(), Err(TryRecvError::Empty)));
}

// =========================================================================
// Custom broadcaster
// =========================================================================

#[derive(Default)]
struct Counting(std::sync::atomic::AtomicUsize);

impl Broadcaster for Counting {
    fn publish(&self, _channel: &str, _update: &Update) {
        self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_build_with_custom_broadcaster_under_load() {
    let counting = Arc::new(Counting::default());
    let cardroom = Arc::new(
        CardroomBuilder::new()
            .spawn_evictor(false)
            .build_with(Arc::clone(&counting)),
    );
    let session = cardroom.create_session("busy").await;

    let tasks: Vec<_> = (0..100)
        .map(|i| {
            let cardroom = Arc::clone(&cardroom);
            let sid = session.id.clone();
            tokio::spawn(async move {
                cardroom
                    .dispatch(Action::join(sid, None, format!("guest {i}")))
                    .await
            })
        })
        .collect();
    futures_util::future::join_all(tasks).await;

    let snapshot = cardroom.snapshot(&session.id).await.unwrap();
    assert_eq!(snapshot.participants.len(), 100);
    assert_eq!(counting.0.load(std::sync::atomic::Ordering::SeqCst), 100);
}
