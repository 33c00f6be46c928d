use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use indexmap::IndexMap;
use uuid::Uuid;

use crate::context::context_record::ContextRecord;

/// All records on the bus, grouped by their `from` key
///
/// Groups keep the order in which their first record arrived.
pub type ContextMap = IndexMap<String, Vec<ContextRecord>>;

/// Change callback: the full grouped mapping, the key that changed, and a
/// removal hook that is only present for records added without keep-alive
pub type ContextListener =
    Arc<dyn Fn(&ContextMap, Option<&str>, Option<DeferredRemoval>) + Send + Sync>;

/// Publish/notify bus for context records
///
/// Independent of the chain engine; the two are not coordinated.
///
/// # Example
///
/// ```ignore
/// use event_bridge::{ContextBus, ContextRecord};
///
/// let bus = ContextBus::new();
/// let subscription = bus.on_context_change(|context, from, _end| {
///     println!("{from:?} now has {} records", from.and_then(|f| context.get(f)).map_or(0, Vec::len));
/// });
///
/// let id = bus.add_context(ContextRecord::new("todo-list", "selection", "selection"), true);
/// bus.remove_context(&id);
/// subscription.unsubscribe();
/// ```
#[derive(Clone, Default)]
pub struct ContextBus {
    shared: Arc<BusShared>,
}

#[derive(Default)]
struct BusShared {
    inner: Mutex<BusInner>,
}

#[derive(Default)]
struct BusInner {
    groups: ContextMap,
    listeners: Vec<(u64, ContextListener)>,
    next_listener: u64,
}

impl BusShared {
    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop one record from one group without notifying
    fn remove_silently(&self, from: &str, id: &str) {
        let mut inner = self.lock();
        if let Some(items) = inner.groups.get_mut(from) {
            items.retain(|item| item.id != id);
            tracing::trace!(from, id, "ephemeral context expired");
        }
    }
}

impl ContextBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to its `from` group and notify listeners
    ///
    /// An empty `id` is replaced with a fresh UUID. With `keep_alive` false
    /// listeners receive a [`DeferredRemoval`] that drops the record again
    /// once they are done with it. Returns the record id.
    pub fn add_context(&self, mut record: ContextRecord, keep_alive: bool) -> String {
        if record.id.is_empty() {
            record.id = Uuid::new_v4().to_string();
        }
        let id = record.id.clone();
        let from = record.from.clone();

        let (snapshot, listeners) = {
            let mut inner = self.shared.lock();
            inner.groups.entry(from.clone()).or_default().push(record);
            (inner.groups.clone(), Self::listeners(&inner))
        };

        tracing::debug!(from = %from, id = %id, keep_alive, "context added");
        let removal = self.removal(keep_alive, &from, &id);
        Self::notify(&listeners, &snapshot, Some(&from), removal);
        id
    }

    /// Replace a record in place, matched on `id` within its `from` group
    ///
    /// Records with an empty or unknown id are ignored without notifying.
    pub fn update_context(&self, record: ContextRecord, keep_alive: bool) -> Option<String> {
        if record.id.is_empty() {
            return None;
        }
        let id = record.id.clone();
        let from = record.from.clone();

        let (snapshot, listeners) = {
            let mut inner = self.shared.lock();
            let slot = inner
                .groups
                .get_mut(&from)?
                .iter_mut()
                .find(|item| item.id == id)?;
            *slot = record;
            (inner.groups.clone(), Self::listeners(&inner))
        };

        tracing::debug!(from = %from, id = %id, keep_alive, "context updated");
        let removal = self.removal(keep_alive, &from, &id);
        Self::notify(&listeners, &snapshot, Some(&from), removal);
        Some(id)
    }

    /// Remove the first record with `id`, searching groups oldest first
    ///
    /// Listeners are notified even when nothing matched; the changed key is
    /// then `None`. Returns the group the record was removed from.
    pub fn remove_context(&self, id: &str) -> Option<String> {
        let (origin, snapshot, listeners) = {
            let mut inner = self.shared.lock();
            let mut origin = None;
            for (from, items) in inner.groups.iter_mut() {
                if let Some(pos) = items.iter().position(|item| item.id == id) {
                    items.remove(pos);
                    origin = Some(from.clone());
                    break;
                }
            }
            (origin, inner.groups.clone(), Self::listeners(&inner))
        };

        tracing::debug!(id, from = ?origin, "context removed");
        Self::notify(&listeners, &snapshot, origin.as_deref(), None);
        origin
    }

    /// Subscribe to changes; the returned handle unsubscribes
    pub fn on_context_change<F>(&self, listener: F) -> ContextSubscription
    where
        F: Fn(&ContextMap, Option<&str>, Option<DeferredRemoval>) + Send + Sync + 'static,
    {
        let mut inner = self.shared.lock();
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.listeners.push((id, Arc::new(listener)));

        ContextSubscription {
            bus: Arc::downgrade(&self.shared),
            id,
        }
    }

    /// Copy of every group
    pub fn snapshot(&self) -> ContextMap {
        self.shared.lock().groups.clone()
    }

    /// Records in one group, empty when the group does not exist
    pub fn records(&self, from: &str) -> Vec<ContextRecord> {
        self.shared
            .lock()
            .groups
            .get(from)
            .cloned()
            .unwrap_or_default()
    }

    fn listeners(inner: &BusInner) -> Vec<ContextListener> {
        inner
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }

    fn removal(&self, keep_alive: bool, from: &str, id: &str) -> Option<DeferredRemoval> {
        (!keep_alive).then(|| DeferredRemoval {
            bus: Arc::downgrade(&self.shared),
            from: from.to_string(),
            id: id.to_string(),
        })
    }

    fn notify(
        listeners: &[ContextListener],
        snapshot: &ContextMap,
        changed: Option<&str>,
        removal: Option<DeferredRemoval>,
    ) {
        for listener in listeners {
            listener(snapshot, changed, removal.clone());
        }
    }
}

impl fmt::Debug for ContextBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("ContextBus")
            .field("groups", &inner.groups.len())
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

/// Drops an ephemeral record once its notification has been handled
#[derive(Debug, Clone)]
pub struct DeferredRemoval {
    bus: Weak<BusShared>,
    from: String,
    id: String,
}

impl DeferredRemoval {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Remove the record on the next tick of the ambient tokio runtime
    ///
    /// Without a runtime the removal happens immediately. The removal does
    /// not notify listeners.
    pub fn schedule(self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };

        let Self { from, id, .. } = self;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    bus.remove_silently(&from, &id);
                });
            }
            Err(_) => bus.remove_silently(&from, &id),
        }
    }
}

/// Handle returned by [`ContextBus::on_context_change`]
#[derive(Debug)]
pub struct ContextSubscription {
    bus: Weak<BusShared>,
    id: u64,
}

impl ContextSubscription {
    pub fn unsubscribe(self) -> bool {
        let Some(bus) = self.bus.upgrade() else {
            return false;
        };

        let mut inner = bus.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(id, _)| *id != self.id);
        inner.listeners.len() != before
    }
}
