//! Demo: a scripted task-list session driven through the chain engine
//!
//! Handlers keep an in-memory task list, publish it on the context bus and
//! resume with what they changed so the next step can pick it up as `prev`.
//!
//! Run with `RUST_LOG=event_bridge=debug cargo run --example task_chain`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use event_bridge::middleware::logging::LoggingMiddleware;
use event_bridge::middleware::metrics::MetricsMiddleware;
use event_bridge::{ChainEngine, ContextBus, ContextRecord, EngineConfig, Payload};
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Task {
    id: u64,
    title: String,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct AddTask {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ToggleTask {
    id: u64,
}

const SCRIPT: &str = r#"[
    {"eventName": "task:add", "payload": {"title": "write the chain engine"}},
    {"eventName": "task:add", "payload": {"title": "write the context bus"}},
    {"eventName": "sleep", "payload": {"duration": 200}},
    {"eventName": "task:toggle", "payload": {"id": 1}},
    {"eventName": "task:render"},
    {"eventName": "task:finished"}
]"#;

fn publish(bus: &ContextBus, tasks: &[Task]) {
    let data = json!(tasks
        .iter()
        .map(|t| json!({"id": t.id, "title": t.title, "done": t.done}))
        .collect::<Vec<_>>());
    bus.add_context(ContextRecord::new("task-list", "tasks", "list").with_data(data), false);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::load("event_bridge.toml")?;
    let engine = ChainEngine::with_config(config);
    let bus = ContextBus::new();
    let tasks: Arc<Mutex<Vec<Task>>> = Arc::new(Mutex::new(Vec::new()));

    let metrics = MetricsMiddleware::new();
    engine.observe(LoggingMiddleware::debug()).observe(metrics.clone());

    bus.on_context_change(|context, from, end| {
        let count = from.and_then(|f| context.get(f)).map_or(0, Vec::len);
        tracing::info!(from = ?from, count, "context changed");
        if let Some(end) = end {
            end.schedule();
        }
    });

    {
        let tasks = Arc::clone(&tasks);
        let bus = bus.clone();
        engine.register_typed("task:add", move |add: AddTask, _prev, next| {
            let mut list = tasks.lock().unwrap_or_else(|e| e.into_inner());
            let id = list.len() as u64 + 1;
            list.push(Task {
                id,
                title: add.title,
                done: false,
            });
            publish(&bus, &list);
            next.resume(Payload::new().with("added", id));
        });
    }

    {
        let tasks = Arc::clone(&tasks);
        engine.register_typed("task:toggle", move |toggle: ToggleTask, _prev, next| {
            let mut list = tasks.lock().unwrap_or_else(|e| e.into_inner());
            let result = match list.iter_mut().find(|t| t.id == toggle.id) {
                Some(task) => {
                    task.done = !task.done;
                    Payload::new().with("toggled", task.id).with("done", task.done)
                }
                None => Payload::new(),
            };
            next.resume(result);
        });
    }

    {
        let tasks = Arc::clone(&tasks);
        engine.register("task:render", move |payload, next| {
            let prev = payload.prev();
            tracing::info!(last_change = %serde_json::Value::from(prev.clone()), "rendering");
            for task in tasks.lock().unwrap_or_else(|e| e.into_inner()).iter() {
                let mark = if task.done { "x" } else { " " };
                tracing::info!("[{mark}] {} {}", task.id, task.title);
            }
            next.resume(prev);
        });
    }

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let done_tx = Mutex::new(Some(done_tx));
    engine.register("task:finished", move |_payload, next| {
        if let Some(tx) = done_tx.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let _ = tx.send(());
        }
        next.done();
    });

    engine.batch_json(SCRIPT)?;
    tokio::time::timeout(Duration::from_secs(5), done_rx).await??;

    tracing::info!("\n{}", metrics.summary());
    tracing::info!(stats = ?engine.stats(), "session finished");
    Ok(())
}
