use crate::core::payload::Payload;
use crate::core::step::Step;

/// Where the drain currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPhase {
    /// No drain; the next append starts one
    Idle,
    /// The step at the cursor has to be dispatched
    Ready,
    /// The step at the cursor is dispatched and its continuation is outstanding
    Waiting,
}

/// Counters describing the engine's drain history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainStats {
    /// Idle -> Draining transitions
    pub drains_started: u64,
    /// Drains that walked past the last step
    pub drains_completed: u64,
    /// Drains abandoned by `clear` or `batch`
    pub drains_aborted: u64,
    pub steps_dispatched: u64,
    /// Steps with no registered handler
    pub steps_skipped: u64,
    /// Continuations ignored because their drain was replaced or already advanced
    pub stale_resumes: u64,
}

/// The ordered step sequence plus the cursor walking it
///
/// Steps are only ever appended while a drain runs; the whole sequence is
/// emptied when the cursor walks off the end or on an explicit clear.
/// Each clear bumps the epoch so continuations handed out before it can be
/// recognised as stale.
#[derive(Debug)]
pub struct ChainStore {
    steps: Vec<Step>,
    cursor: usize,
    carried: Payload,
    phase: DrainPhase,
    epoch: u64,
    pub(crate) stats: ChainStats,
}

/// A step that has to be dispatched, captured under the engine lock
pub(crate) struct Cursor {
    pub index: usize,
    pub epoch: u64,
    pub step: Step,
    pub carried: Payload,
}

impl ChainStore {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            cursor: 0,
            carried: Payload::new(),
            phase: DrainPhase::Idle,
            epoch: 0,
            stats: ChainStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn phase(&self) -> DrainPhase {
        self.phase
    }

    /// Append a step; returns true when the append started a new drain
    pub(crate) fn push(&mut self, step: Step) -> bool {
        self.steps.push(step);

        if self.phase != DrainPhase::Idle {
            return false;
        }

        self.cursor = 0;
        self.carried = Payload::new();
        self.phase = DrainPhase::Ready;
        self.stats.drains_started += 1;
        true
    }

    /// Empty the sequence and abandon any drain in flight
    pub(crate) fn clear(&mut self) {
        if self.phase != DrainPhase::Idle {
            self.stats.drains_aborted += 1;
        }

        self.steps.clear();
        self.cursor = 0;
        self.carried = Payload::new();
        self.phase = DrainPhase::Idle;
        self.epoch += 1;
    }

    /// The step to dispatch next, if the drain is ready and not finished
    pub(crate) fn current(&self) -> Option<Cursor> {
        if self.phase != DrainPhase::Ready {
            return None;
        }

        self.steps.get(self.cursor).map(|step| Cursor {
            index: self.cursor,
            epoch: self.epoch,
            step: step.clone(),
            carried: self.carried.clone(),
        })
    }

    /// The cursor walked off the end: empty the store, back to Idle
    ///
    /// Returns the number of steps the drain walked.
    pub(crate) fn finish(&mut self) -> usize {
        let walked = self.steps.len();
        self.steps.clear();
        self.cursor = 0;
        self.carried = Payload::new();
        self.phase = DrainPhase::Idle;
        self.epoch += 1;
        self.stats.drains_completed += 1;
        walked
    }

    /// No handler for the current step: move on, `carried` stays untouched
    pub(crate) fn skip(&mut self) {
        self.cursor += 1;
        self.stats.steps_skipped += 1;
    }

    pub(crate) fn mark_dispatched(&mut self) {
        self.phase = DrainPhase::Waiting;
        self.stats.steps_dispatched += 1;
    }

    /// Apply a continuation; false when it belongs to another drain or step
    pub(crate) fn resume(&mut self, epoch: u64, index: usize, result: Payload) -> bool {
        if epoch != self.epoch || index != self.cursor || self.phase != DrainPhase::Waiting {
            self.stats.stale_resumes += 1;
            return false;
        }

        self.cursor += 1;
        self.carried = result;
        self.phase = DrainPhase::Ready;
        true
    }

    pub(crate) fn record_stale(&mut self) {
        self.stats.stale_resumes += 1;
    }
}

impl Default for ChainStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str) -> Step {
        Step::new(name, Payload::new())
    }

    #[test]
    fn only_the_first_append_starts_a_drain() {
        let mut store = ChainStore::new();
        assert!(store.push(step("a")));
        assert!(!store.push(step("b")));
        assert_eq!(store.stats.drains_started, 1);
    }

    #[test]
    fn resume_advances_and_carries_result() {
        let mut store = ChainStore::new();
        store.push(step("a"));
        store.push(step("b"));

        let first = store.current().expect("a is ready");
        store.mark_dispatched();
        assert!(store.resume(first.epoch, first.index, Payload::new().with("x", 1)));

        let second = store.current().expect("b is ready");
        assert_eq!(second.step.event, "b");
        assert_eq!(second.carried, Payload::new().with("x", 1));
    }

    #[test]
    fn clear_makes_outstanding_continuations_stale() {
        let mut store = ChainStore::new();
        store.push(step("a"));
        let cursor = store.current().expect("ready");
        store.mark_dispatched();

        store.clear();
        store.push(step("b"));

        assert!(!store.resume(cursor.epoch, cursor.index, Payload::new()));
        assert_eq!(store.stats.stale_resumes, 1);
        assert_eq!(store.stats.drains_aborted, 1);
        assert_eq!(store.current().map(|c| c.step.event), Some("b".to_string()));
    }

    #[test]
    fn skip_keeps_carried_payload() {
        let mut store = ChainStore::new();
        store.push(step("a"));
        store.push(step("b"));
        store.push(step("c"));

        let a = store.current().expect("a");
        store.mark_dispatched();
        store.resume(a.epoch, a.index, Payload::new().with("x", 1));
        store.skip();

        let c = store.current().expect("c");
        assert_eq!(c.step.event, "c");
        assert_eq!(c.carried, Payload::new().with("x", 1));
    }

    #[test]
    fn finish_returns_to_idle() {
        let mut store = ChainStore::new();
        store.push(step("a"));
        assert_eq!(store.finish(), 1);
        assert!(store.is_empty());
        assert_eq!(store.phase(), DrainPhase::Idle);
        assert!(store.push(step("b")));
    }
}
