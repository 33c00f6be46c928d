use crate::core::payload::Payload;

/// Hooks into the drain lifecycle of a [`ChainEngine`](crate::ChainEngine)
///
/// Observers are the engine's middleware: they see every step go by but
/// cannot alter dispatch. All hooks default to no-ops, so implementors only
/// override what they need.
///
/// # Execution Order
///
/// Observers run in the order they were attached, outside the engine lock,
/// on whichever thread drove the drain forward. They may call back into the
/// engine.
///
/// ```text
/// on_drain_start
///   on_dispatch(a, 0) -> on_resume(a, 0)
///   on_skip(b, 1)
///   on_dispatch(c, 2) -> on_resume(c, 2)
/// on_drain_complete(3)
/// ```
pub trait ChainObserver: Send + Sync {
    /// An append found the engine idle and started a new drain
    fn on_drain_start(&self) {}

    /// A step is about to be handed to its handlers
    fn on_dispatch(&self, _event: &str, _index: usize, _payload: &Payload) {}

    /// A handler resumed the step at `index`
    fn on_resume(&self, _event: &str, _index: usize, _result: &Payload) {}

    /// No handler was registered; the step was passed over
    fn on_skip(&self, _event: &str, _index: usize) {}

    /// The cursor walked past the last of `steps` steps
    fn on_drain_complete(&self, _steps: usize) {}
}
