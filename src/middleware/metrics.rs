use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use hashbrown::HashMap;

use crate::core::payload::Payload;
use crate::events::chain_observer::ChainObserver;

/// Statistics for a single event name
#[derive(Debug, Clone, PartialEq)]
pub struct EventMetrics {
    pub event_name: String,
    pub dispatched: u64,
    pub resumed: u64,
    pub skipped: u64,
    pub total_duration_micros: u64,
    pub min_duration_micros: u64,
    pub max_duration_micros: u64,
}

impl EventMetrics {
    fn new(event_name: String) -> Self {
        Self {
            event_name,
            dispatched: 0,
            resumed: 0,
            skipped: 0,
            total_duration_micros: 0,
            min_duration_micros: u64::MAX,
            max_duration_micros: 0,
        }
    }

    fn record_resume(&mut self, duration_micros: u64) {
        self.resumed += 1;
        self.total_duration_micros += duration_micros;
        self.min_duration_micros = self.min_duration_micros.min(duration_micros);
        self.max_duration_micros = self.max_duration_micros.max(duration_micros);
    }

    /// Average dispatch-to-resume time in microseconds
    pub fn avg_duration_micros(&self) -> u64 {
        if self.resumed == 0 {
            0
        } else {
            self.total_duration_micros / self.resumed
        }
    }

    /// Dispatched steps still waiting on their continuation
    pub fn outstanding(&self) -> u64 {
        self.dispatched.saturating_sub(self.resumed)
    }
}

#[derive(Default)]
struct MetricsState {
    events: HashMap<String, EventMetrics>,
    in_flight: Option<(usize, Instant)>,
    drains_completed: u64,
}

impl MetricsState {
    fn entry(&mut self, event: &str) -> &mut EventMetrics {
        self.events
            .entry(event.to_string())
            .or_insert_with(|| EventMetrics::new(event.to_string()))
    }
}

/// Observer that collects per-event counters
///
/// Clones share the same storage, so keep one clone to read results after
/// handing the other to the engine.
///
/// # Example
///
/// ```ignore
/// use event_bridge::middleware::metrics::MetricsMiddleware;
///
/// let metrics = MetricsMiddleware::new();
/// engine.observe(metrics.clone());
///
/// // Later, retrieve metrics
/// let stats = metrics.get_metrics("todo:add");
/// tracing::info!("\n{}", metrics.summary());
/// ```
#[derive(Clone, Default)]
pub struct MetricsMiddleware {
    state: Arc<Mutex<MetricsState>>,
}

impl MetricsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get metrics for a specific event
    pub fn get_metrics(&self, event_name: &str) -> Option<EventMetrics> {
        self.lock().events.get(event_name).cloned()
    }

    /// All collected metrics, sorted by event name
    pub fn get_all_metrics(&self) -> Vec<EventMetrics> {
        let mut all: Vec<_> = self.lock().events.values().cloned().collect();
        all.sort_by(|a, b| a.event_name.cmp(&b.event_name));
        all
    }

    pub fn drains_completed(&self) -> u64 {
        self.lock().drains_completed
    }

    /// Reset all metrics
    pub fn reset(&self) {
        let mut state = self.lock();
        state.events.clear();
        state.in_flight = None;
        state.drains_completed = 0;
    }

    /// Render all metrics as a fixed-width table
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<25} {:>10} {:>10} {:>10} {:>12} {:>12} {:>12}",
            "Event", "Dispatched", "Resumed", "Skipped", "Avg (µs)", "Min (µs)", "Max (µs)"
        );
        let _ = writeln!(out, "{}", "-".repeat(97));

        for metric in self.get_all_metrics() {
            let min = if metric.resumed == 0 {
                0
            } else {
                metric.min_duration_micros
            };
            let _ = writeln!(
                out,
                "{:<25} {:>10} {:>10} {:>10} {:>12} {:>12} {:>12}",
                metric.event_name,
                metric.dispatched,
                metric.resumed,
                metric.skipped,
                metric.avg_duration_micros(),
                min,
                metric.max_duration_micros,
            );
        }
        out
    }
}

impl ChainObserver for MetricsMiddleware {
    fn on_dispatch(&self, event: &str, index: usize, _payload: &Payload) {
        let mut state = self.lock();
        state.entry(event).dispatched += 1;
        state.in_flight = Some((index, Instant::now()));
    }

    fn on_resume(&self, event: &str, index: usize, _result: &Payload) {
        let mut state = self.lock();
        let micros = match state.in_flight.take() {
            Some((started_index, started)) if started_index == index => {
                started.elapsed().as_micros() as u64
            }
            _ => 0,
        };
        state.entry(event).record_resume(micros);
    }

    fn on_skip(&self, event: &str, _index: usize) {
        self.lock().entry(event).skipped += 1;
    }

    fn on_drain_complete(&self, _steps: usize) {
        self.lock().drains_completed += 1;
    }
}
