use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::core::chain_engine::Shared;
use crate::core::payload::Payload;

/// Continuation handed to a handler; resuming it is the only way a step completes
///
/// `resume` consumes the continuation, so one handler cannot complete a step
/// twice. When several handlers are registered for the same event each
/// receives a clone; the first clone to resume owns the step and later
/// resumes are ignored.
///
/// # Example
///
/// ```ignore
/// engine.register("todo:add", |payload, next| {
///     let title = payload.get_str("title").unwrap_or_default().to_string();
///     next.resume(Payload::new().with("added", title));
/// });
/// ```
#[derive(Clone)]
pub struct Next {
    engine: Weak<Shared>,
    event: Arc<str>,
    epoch: u64,
    index: usize,
    fired: Arc<AtomicBool>,
}

impl Next {
    pub(crate) fn new(engine: Weak<Shared>, event: &str, epoch: u64, index: usize) -> Self {
        Self {
            engine,
            event: Arc::from(event),
            epoch,
            index,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Event name of the step this continuation completes
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Position of the step within its drain
    pub fn index(&self) -> usize {
        self.index
    }

    /// Complete the step, carrying `result` forward as the next step's `prev`
    pub fn resume(self, result: Payload) {
        let Some(engine) = self.engine.upgrade() else {
            tracing::debug!(event = %self.event, "engine dropped, continuation ignored");
            return;
        };

        if self.fired.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                event = %self.event,
                index = self.index,
                "step already resumed by another handler, ignoring"
            );
            engine.record_stale();
            return;
        }

        engine.resume(&self.event, self.epoch, self.index, result);
    }

    /// Complete the step with an empty result
    pub fn done(self) {
        self.resume(Payload::new());
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("event", &self.event)
            .field("epoch", &self.epoch)
            .field("index", &self.index)
            .field("fired", &self.fired.load(Ordering::Acquire))
            .finish()
    }
}
