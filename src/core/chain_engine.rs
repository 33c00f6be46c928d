use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::EngineConfig;
use crate::core::chain_error::ChainError;
use crate::core::chain_store::{ChainStats, ChainStore, Cursor, DrainPhase};
use crate::core::continuation::Next;
use crate::core::delay::{delay_handler, delay_payload, duration_from};
use crate::core::handler_registry::{Handler, HandlerId, HandlerRegistry};
use crate::core::payload::Payload;
use crate::core::step::{BatchItem, Step};
use crate::events::chain_observer::ChainObserver;

/// Sequential event-chain engine
///
/// Steps are dispatched strictly one at a time in the order they were
/// appended. A step is complete only when one of its handlers resumes the
/// [`Next`] continuation it was given; the result it resumes with becomes the
/// `prev` field of the next step's payload.
///
/// # Drain Lifecycle
///
/// * The append that finds the engine idle starts a drain at index 0
/// * Appends during a drain are picked up when the cursor reaches them
/// * Steps without handlers are skipped and leave `prev` untouched
/// * When the cursor walks past the last step the store is emptied
///
/// `clear` and `batch` abandon any drain in flight. Continuations handed out
/// before that are discarded when they are eventually resumed.
///
/// # Example
///
/// ```ignore
/// use event_bridge::{ChainEngine, Payload};
/// use std::time::Duration;
///
/// let engine = ChainEngine::new();
/// engine.register("todo:add", |payload, next| {
///     next.resume(Payload::new().with("id", 1));
/// });
/// engine.register("todo:render", |payload, next| {
///     assert_eq!(payload.prev().get_u64("id"), Some(1));
///     next.done();
/// });
///
/// engine
///     .enqueue("todo:add", Payload::new().with("title", "ship it"))
///     .delay(Duration::from_millis(300))
///     .enqueue("todo:render", Payload::new());
/// ```
#[derive(Clone)]
pub struct ChainEngine {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    inner: Mutex<Inner>,
    config: EngineConfig,
}

struct Inner {
    store: ChainStore,
    registry: HandlerRegistry,
    observers: Vec<Arc<dyn ChainObserver>>,
    /// Set while some thread is walking the store
    pumping: bool,
    /// Accepted continuation the pump has not reported to observers yet
    resumed: Option<Resumed>,
}

struct Resumed {
    event: String,
    index: usize,
    result: Payload,
}

enum Tick {
    Resumed(Resumed),
    Dispatch { cursor: Cursor, handlers: Vec<Handler> },
    Skipped { event: String, index: usize },
    Completed { steps: usize },
    Halt,
}

impl Inner {
    fn tick(&mut self) -> Tick {
        if let Some(resumed) = self.resumed.take() {
            return Tick::Resumed(resumed);
        }

        if self.store.phase() != DrainPhase::Ready {
            self.pumping = false;
            return Tick::Halt;
        }

        let Some(cursor) = self.store.current() else {
            return Tick::Completed {
                steps: self.store.finish(),
            };
        };

        let handlers = self.registry.handlers_for(&cursor.step.event);
        if handlers.is_empty() {
            self.store.skip();
            return Tick::Skipped {
                event: cursor.step.event,
                index: cursor.index,
            };
        }

        self.store.mark_dispatched();
        Tick::Dispatch { cursor, handlers }
    }

    /// Claim the pump if the store is ready and nobody is walking it
    fn claim_pump(&mut self) -> bool {
        if self.store.phase() == DrainPhase::Ready && !self.pumping {
            self.pumping = true;
            return true;
        }
        false
    }
}

/// Releases the pump if a handler unwinds through it
struct PumpGuard<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl Drop for PumpGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.lock().pumping = false;
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record_stale(&self) {
        self.lock().store.record_stale();
    }

    pub(crate) fn resume(self: &Arc<Self>, event: &str, epoch: u64, index: usize, result: Payload) {
        let claimed = {
            let mut inner = self.lock();
            if !inner.store.resume(epoch, index, result.clone()) {
                tracing::debug!(event, index, epoch, "stale continuation ignored");
                return;
            }
            // Reported by whichever thread walks the store next, ahead of
            // the following dispatch.
            inner.resumed = Some(Resumed {
                event: event.to_string(),
                index,
                result,
            });
            inner.claim_pump()
        };

        if claimed {
            self.pump();
        }
    }

    /// Walk the store until it is idle or waiting on a continuation
    ///
    /// The caller must have claimed the pump. Synchronous resumes from
    /// inside a handler only flip the store back to Ready; this loop picks
    /// them up instead of recursing. Resume, dispatch, skip and completion
    /// callbacks are all made from here, so observers see them in step order
    /// whichever thread resumed.
    fn pump(self: &Arc<Self>) {
        let mut guard = PumpGuard {
            shared: self.as_ref(),
            armed: true,
        };

        loop {
            let (tick, observers) = {
                let mut inner = self.lock();
                let tick = inner.tick();
                (tick, inner.observers.clone())
            };

            match tick {
                Tick::Halt => break,
                Tick::Resumed(Resumed {
                    event,
                    index,
                    result,
                }) => {
                    tracing::trace!(event = %event, index, "step resumed");
                    for observer in &observers {
                        observer.on_resume(&event, index, &result);
                    }
                }
                Tick::Completed { steps } => {
                    tracing::debug!(steps, "drain complete");
                    for observer in &observers {
                        observer.on_drain_complete(steps);
                    }
                }
                Tick::Skipped { event, index } => {
                    tracing::trace!(event = %event, index, "no handler, step skipped");
                    for observer in &observers {
                        observer.on_skip(&event, index);
                    }
                }
                Tick::Dispatch { cursor, handlers } => {
                    let Cursor {
                        index,
                        epoch,
                        step,
                        carried,
                    } = cursor;
                    let payload = step.payload.with_prev(carried);

                    tracing::trace!(event = %step.event, index, handlers = handlers.len(), "dispatching step");
                    for observer in &observers {
                        observer.on_dispatch(&step.event, index, &payload);
                    }

                    let next = Next::new(Arc::downgrade(self), &step.event, epoch, index);
                    for handler in handlers {
                        handler(payload.clone(), next.clone());
                    }
                }
            }
        }

        guard.armed = false;
    }
}

impl ChainEngine {
    /// Create an engine with the default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine; the delay handler is registered under `config.delay_event`
    pub fn with_config(config: EngineConfig) -> Self {
        let mut registry = HandlerRegistry::new();
        registry.insert(&config.delay_event, delay_handler());

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    store: ChainStore::new(),
                    registry,
                    observers: Vec::new(),
                    pumping: false,
                    resumed: None,
                }),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Register a handler for `event`
    ///
    /// Every handler registered for an event is invoked, in registration
    /// order, each with its own clone of the continuation. The first one to
    /// resume completes the step.
    pub fn register<F>(&self, event: impl Into<String>, handler: F) -> Registration
    where
        F: Fn(Payload, Next) + Send + Sync + 'static,
    {
        let event = event.into();
        let id = self.shared.lock().registry.insert(&event, Arc::new(handler));
        tracing::debug!(event = %event, "handler registered");

        Registration {
            engine: Arc::downgrade(&self.shared),
            event,
            id,
        }
    }

    /// Register a handler that receives its payload decoded as `T`
    ///
    /// The handler also gets the carried-forward `prev`. A payload that does
    /// not decode is logged and passed over like an unhandled step: the
    /// continuation resumes with `prev` unchanged.
    pub fn register_typed<T, F>(&self, event: impl Into<String>, handler: F) -> Registration
    where
        T: DeserializeOwned + 'static,
        F: Fn(T, Payload, Next) + Send + Sync + 'static,
    {
        let event = event.into();
        let label = event.clone();
        self.register(event, move |payload: Payload, next: Next| {
            let prev = payload.prev();
            match payload.decode::<T>(&label) {
                Ok(value) => handler(value, prev, next),
                Err(err) => {
                    tracing::warn!(error = %err, "payload rejected by typed handler, passing prev through");
                    next.resume(prev);
                }
            }
        })
    }

    /// Append a step; starts a drain if the engine was idle
    pub fn enqueue(&self, event: impl Into<String>, payload: Payload) -> &Self {
        self.append(std::iter::once(Step::new(event, payload)), false)
    }

    /// Append a step whose payload is serialized from `value`
    pub fn enqueue_with<T: Serialize + ?Sized>(
        &self,
        event: impl Into<String>,
        value: &T,
    ) -> Result<&Self, ChainError> {
        let payload = Payload::from_serializable(value)?;
        Ok(self.enqueue(event, payload))
    }

    /// Append a delay step that holds the chain for `duration`
    pub fn delay(&self, duration: Duration) -> &Self {
        self.enqueue(self.shared.config.delay_event.clone(), delay_payload(duration))
    }

    /// Replace the whole chain with `items`
    ///
    /// Items named after the configured delay marker (`"sleep"` by default)
    /// that carry a positive `duration` become delay steps. All items are
    /// appended before the drain starts, so `prev` threads through the
    /// entire batch even when handlers resume synchronously.
    pub fn batch<I>(&self, items: I) -> &Self
    where
        I: IntoIterator<Item = BatchItem>,
    {
        let config = &self.shared.config;
        let steps: Vec<Step> = items
            .into_iter()
            .map(|item| {
                let payload = item.payload.unwrap_or_default();
                let delay = (item.event == config.batch_delay_marker)
                    .then(|| duration_from(&payload))
                    .flatten()
                    .filter(|d| !d.is_zero());

                match delay {
                    Some(duration) => Step::new(config.delay_event.clone(), delay_payload(duration)),
                    None => Step::new(item.event, payload),
                }
            })
            .collect();

        tracing::debug!(steps = steps.len(), "batch replacing chain");
        self.append(steps, true)
    }

    /// [`batch`](Self::batch) from a JSON array of `{eventName, payload?}`
    pub fn batch_json(&self, raw: &str) -> Result<&Self, ChainError> {
        let items: Vec<BatchItem> = serde_json::from_str(raw).map_err(ChainError::InvalidBatch)?;
        Ok(self.batch(items))
    }

    /// Empty the chain and abandon any drain in flight
    pub fn clear(&self) -> &Self {
        let mut inner = self.shared.lock();
        if inner.store.phase() != DrainPhase::Idle {
            tracing::debug!(pending = inner.store.len(), "clearing chain mid-drain");
        }
        inner.store.clear();
        self
    }

    /// Attach an observer; see [`ChainObserver`]
    pub fn observe<O: ChainObserver + 'static>(&self, observer: O) -> &Self {
        self.observe_shared(Arc::new(observer))
    }

    pub fn observe_shared(&self, observer: Arc<dyn ChainObserver>) -> &Self {
        self.shared.lock().observers.push(observer);
        self
    }

    pub fn stats(&self) -> ChainStats {
        self.shared.lock().store.stats
    }

    /// Steps currently held by the store, including the one in dispatch
    pub fn pending(&self) -> usize {
        self.shared.lock().store.len()
    }

    pub fn phase(&self) -> DrainPhase {
        self.shared.lock().store.phase()
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == DrainPhase::Idle
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.shared.lock().registry.listener_count(event)
    }

    fn append<I>(&self, steps: I, replace: bool) -> &Self
    where
        I: IntoIterator<Item = Step>,
    {
        let (started, observers, claimed) = {
            let mut inner = self.shared.lock();
            if replace {
                inner.store.clear();
            }

            let mut started = false;
            for step in steps {
                tracing::trace!(event = %step.event, "step enqueued");
                started |= inner.store.push(step);
            }
            (started, inner.observers.clone(), inner.claim_pump())
        };

        if started {
            tracing::debug!("drain started");
            for observer in &observers {
                observer.on_drain_start();
            }
        }

        if claimed {
            self.shared.pump();
        }
        self
    }
}

impl Default for ChainEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChainEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("ChainEngine")
            .field("phase", &inner.store.phase())
            .field("pending", &inner.store.len())
            .field("stats", &inner.store.stats)
            .finish()
    }
}

/// Capability to remove one handler registration
#[derive(Debug)]
pub struct Registration {
    engine: Weak<Shared>,
    event: String,
    id: HandlerId,
}

impl Registration {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Remove the handler; returns false if the engine or handler is gone
    ///
    /// A dispatch already under way still reaches the handler.
    pub fn unregister(self) -> bool {
        let Some(engine) = self.engine.upgrade() else {
            return false;
        };

        let removed = engine.lock().registry.remove(&self.event, self.id);
        if removed {
            tracing::debug!(event = %self.event, "handler unregistered");
        }
        removed
    }
}
