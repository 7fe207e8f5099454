#![expect(
    clippy::module_name_repetitions,
    reason = "Store types expose their domain in the name for clarity"
)]

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

use super::state::Snapshot;

type Observer = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// Publishes connection snapshots to observers.
///
/// Observers are plain callbacks notified in registration order with the full snapshot; they
/// never see a partially applied transition. Async consumers can use [`Self::receiver`] instead.
///
/// A publication made from inside a notification (or from another thread while one is being
/// delivered) is queued and delivered once the current round has finished, so every observer
/// sees the snapshots in the order they were published.
#[derive(Clone)]
pub struct ConnectionStateStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    state_tx: watch::Sender<Snapshot>,
    registry: Mutex<Registry>,
    dispatch: Mutex<Dispatch>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    observers: BTreeMap<u64, Observer>,
}

#[derive(Default)]
struct Dispatch {
    pending: VecDeque<Snapshot>,
    running: bool,
}

// Observers run user code; a panic in one of them must not wedge the store.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for ConnectionStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionStateStore")
            .field("snapshot", &self.snapshot())
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl ConnectionStateStore {
    #[must_use]
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(Snapshot::default());

        Self {
            inner: Arc::new(StoreInner {
                state_tx,
                registry: Mutex::new(Registry::default()),
                dispatch: Mutex::new(Dispatch::default()),
            }),
        }
    }

    /// The most recently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.inner.state_tx.borrow().clone()
    }

    /// Watch receiver for async consumers. Only the latest snapshot is retained.
    #[must_use]
    pub fn receiver(&self) -> watch::Receiver<Snapshot> {
        self.inner.state_tx.subscribe()
    }

    /// Number of registered callback observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        lock(&self.inner.registry).observers.len()
    }

    /// Register `observer`. It stays registered until the returned handle is dropped or
    /// [`ObserverHandle::unsubscribe`] is called.
    #[must_use = "dropping the handle unsubscribes the observer immediately"]
    pub fn subscribe<F>(&self, observer: F) -> ObserverHandle
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.inner.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.observers.insert(id, Arc::new(observer));

        ObserverHandle {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Replace the current snapshot and notify every observer.
    pub fn publish(&self, snapshot: Snapshot) {
        self.stage(snapshot);
        self.flush();
    }

    /// Make `snapshot` current and queue it for delivery without running any observer.
    ///
    /// Lets a caller fix the publication order while holding its own lock, then
    /// [`flush`](Self::flush) once that lock is released.
    pub(crate) fn stage(&self, snapshot: Snapshot) {
        let mut dispatch = lock(&self.inner.dispatch);
        self.inner.state_tx.send_replace(snapshot.clone());
        dispatch.pending.push_back(snapshot);
    }

    /// Deliver queued snapshots unless another call is already delivering them.
    pub(crate) fn flush(&self) {
        {
            let mut dispatch = lock(&self.inner.dispatch);
            if dispatch.running || dispatch.pending.is_empty() {
                return;
            }
            dispatch.running = true;
        }

        let _reset = DispatchReset(&self.inner);
        loop {
            let next = {
                let mut dispatch = lock(&self.inner.dispatch);
                if let Some(snapshot) = dispatch.pending.pop_front() {
                    snapshot
                } else {
                    dispatch.running = false;
                    break;
                }
            };
            self.deliver(&next);
        }
    }

    fn deliver(&self, snapshot: &Snapshot) {
        let ids: Vec<u64> = lock(&self.inner.registry)
            .observers
            .keys()
            .copied()
            .collect();

        for id in ids {
            // Re-check each id so that an observer removed earlier in this round is skipped.
            let observer = lock(&self.inner.registry).observers.get(&id).map(Arc::clone);
            if let Some(observer) = observer {
                observer(snapshot);
            }
        }
    }
}

/// Clears the dispatching flag if an observer panics mid-round.
struct DispatchReset<'store>(&'store StoreInner);

impl Drop for DispatchReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut dispatch = lock(&self.0.dispatch);
            dispatch.pending.clear();
            dispatch.running = false;
        }
    }
}

/// Keeps an observer registered with a [`ConnectionStateStore`].
///
/// Dropping the handle unsubscribes, including from inside a notification.
#[derive(Debug)]
pub struct ObserverHandle {
    id: u64,
    store: Weak<StoreInner>,
}

impl ObserverHandle {
    /// Identifier of the observer, unique within its store.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            lock(&inner.registry).observers.remove(&self.id);
        }
    }
}
