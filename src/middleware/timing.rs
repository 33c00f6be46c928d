use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use hashbrown::HashMap;

use crate::core::payload::Payload;
use crate::events::chain_observer::ChainObserver;

/// Observer that measures how long each step waits for its continuation
///
/// The clock starts when a step is dispatched and stops when a handler
/// resumes it, so asynchronous handlers and delay steps are measured in
/// full.
///
/// # Example
///
/// ```ignore
/// use event_bridge::middleware::timing::TimingMiddleware;
/// use std::time::Duration;
///
/// // Only log slow steps (> 100ms)
/// let timing = TimingMiddleware::new().with_threshold(Duration::from_millis(100));
/// engine.observe(timing.clone());
///
/// // later
/// let last = timing.last_duration("todo:save");
/// ```
#[derive(Clone, Default)]
pub struct TimingMiddleware {
    threshold: Option<Duration>,
    state: Arc<Mutex<TimingState>>,
}

#[derive(Default)]
struct TimingState {
    /// Step currently in flight; the engine dispatches one at a time
    started: Option<(usize, Instant)>,
    last: HashMap<String, Duration>,
}

impl TimingMiddleware {
    /// Create a new timing middleware that logs all step durations
    pub fn new() -> Self {
        Self::default()
    }

    /// Only log steps that take at least `threshold`
    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Most recent dispatch-to-resume duration recorded for `event`
    pub fn last_duration(&self, event: &str) -> Option<Duration> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last
            .get(event)
            .copied()
    }

    fn should_log(&self, duration: Duration) -> bool {
        match self.threshold {
            Some(threshold) => duration >= threshold,
            None => true,
        }
    }

    fn format_duration(duration: Duration) -> String {
        let micros = duration.as_micros();
        if micros < 1_000 {
            format!("{}µs", micros)
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1_000.0)
        } else {
            format!("{:.2}s", duration.as_secs_f64())
        }
    }
}

impl ChainObserver for TimingMiddleware {
    fn on_dispatch(&self, _event: &str, index: usize, _payload: &Payload) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.started = Some((index, Instant::now()));
    }

    fn on_resume(&self, event: &str, index: usize, _result: &Payload) {
        let duration = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let Some((started_index, started)) = state.started.take() else {
                return;
            };
            if started_index != index {
                return;
            }
            let duration = started.elapsed();
            state.last.insert(event.to_string(), duration);
            duration
        };

        if self.should_log(duration) {
            tracing::info!(event, index, "step took {}", Self::format_duration(duration));
        }
    }
}
