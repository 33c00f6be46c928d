//! Delay primitive: timing, prev passthrough and interaction with clear.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use event_bridge::{BatchItem, ChainEngine, EngineConfig, Payload};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn delay_holds_the_chain_and_passes_prev_through() {
    let engine = ChainEngine::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let resolved_at = Arc::new(Mutex::new(None));

    let stamp = Arc::clone(&resolved_at);
    engine.register("a", move |_payload, next| {
        *stamp.lock().unwrap() = Some(Instant::now());
        next.resume(Payload::new().with("y", 2));
    });
    engine.register("c", move |payload, next| {
        tx.send((Instant::now(), payload.prev())).unwrap();
        next.done();
    });

    engine.batch(vec![
        BatchItem::new("a"),
        BatchItem::sleep(50),
        BatchItem::new("c"),
    ]);

    let (dispatched_at, prev) = tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("c dispatched in time")
        .expect("channel open");

    let resolved_at = resolved_at.lock().unwrap().expect("a dispatched");
    assert!(dispatched_at.duration_since(resolved_at) >= Duration::from_millis(50));
    assert_eq!(prev, Payload::new().with("y", 2));
}

#[tokio::test]
async fn delay_sugar_queues_behind_the_timer() {
    let engine = ChainEngine::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.register("c", move |_payload, next| {
        tx.send(Instant::now()).unwrap();
        next.done();
    });

    let started = Instant::now();
    engine
        .delay(Duration::from_millis(30))
        .enqueue("c", Payload::new());

    assert_eq!(engine.pending(), 2);
    let dispatched_at = tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("c dispatched in time")
        .expect("channel open");

    assert!(dispatched_at.duration_since(started) >= Duration::from_millis(30));
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(engine.is_idle());
}

#[tokio::test]
async fn clear_during_a_delay_discards_the_timer() {
    let engine = ChainEngine::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<()>();
    engine.register("c", move |_payload, next| {
        tx.send(()).unwrap();
        next.done();
    });

    engine
        .delay(Duration::from_millis(20))
        .enqueue("c", Payload::new())
        .clear();

    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(rx.try_recv().is_err());
    assert_eq!(engine.stats().stale_resumes, 1);
    assert!(engine.is_idle());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delays_keep_order_on_a_threaded_runtime() {
    let engine = ChainEngine::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    for name in ["a", "b", "c"] {
        let tx = tx.clone();
        engine.register(name, move |_payload, next| {
            tx.send(next.event().to_string()).unwrap();
            next.done();
        });
    }

    engine.batch(vec![
        BatchItem::new("a"),
        BatchItem::sleep(5),
        BatchItem::new("b"),
        BatchItem::sleep(5),
        BatchItem::new("c"),
    ]);

    let mut order = Vec::new();
    for _ in 0..3 {
        let name = tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("step dispatched in time")
            .expect("channel open");
        order.push(name);
    }
    assert_eq!(order, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn custom_delay_event_name() {
    let config = EngineConfig {
        delay_event: "__WAIT__".into(),
        batch_delay_marker: "pause".into(),
    };
    let engine = ChainEngine::with_config(config);
    let (tx, mut rx) = mpsc::unbounded_channel();
    engine.register("c", move |_payload, next| {
        tx.send(()).unwrap();
        next.done();
    });

    engine.batch(vec![
        BatchItem::new("pause").with_payload(Payload::new().with("duration", 10)),
        BatchItem::new("c"),
    ]);

    assert_eq!(engine.listener_count("__WAIT__"), 1);
    assert_eq!(engine.listener_count("__SLEEP__"), 0);
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("c dispatched in time")
        .expect("channel open");
    assert_eq!(engine.stats().steps_dispatched, 2);
}

#[test]
fn delay_without_a_runtime_uses_a_timer_thread() {
    let engine = ChainEngine::new();
    let (tx, rx) = std::sync::mpsc::channel();
    engine.register("c", move |_payload, next| {
        tx.send(Instant::now()).unwrap();
        next.done();
    });

    let started = Instant::now();
    engine
        .delay(Duration::from_millis(20))
        .enqueue("c", Payload::new());

    let dispatched_at = rx.recv_timeout(WAIT).expect("c dispatched");
    assert!(dispatched_at.duration_since(started) >= Duration::from_millis(20));
}

#[tokio::test]
async fn oversized_delays_hold_the_chain_without_panicking() {
    let engine = ChainEngine::new();
    engine.register("after", |_payload, next| next.done());

    engine
        .batch_json(r#"[{"event": "sleep", "props": {"duration": 1e300}}, {"eventName": "after"}]"#)
        .expect("valid batch");
    assert!(!engine.is_idle());
    assert_eq!(engine.pending(), 2);

    engine.clear();
    engine.enqueue("__SLEEP__", Payload::new().with("duration", 1e300));
    assert!(!engine.is_idle());
    assert_eq!(engine.pending(), 1);

    engine.clear();
    assert!(engine.is_idle());
}
