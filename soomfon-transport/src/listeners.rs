//! Listener registration and fan-out
//!
//! Both the session and the decoder publish through a [`ListenerHub`]:
//! synchronous callbacks run in emission order on the emitting thread, and a
//! broadcast channel serves consumers that prefer to poll. A panicking
//! callback is logged and skipped; delivery to the remaining listeners and of
//! later events continues.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::warn;

/// Broadcast channel capacity for polled subscribers
const CHANNEL_CAPACITY: usize = 256;

/// Handle returned by [`ListenerHub::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Fan-out of events to callbacks and broadcast subscribers
pub struct ListenerHub<T: Clone> {
    name: &'static str,
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Callback<T>)>>,
    tx: broadcast::Sender<T>,
}

impl<T: Clone> ListenerHub<T> {
    /// Create an empty hub; `name` only appears in log messages
    pub fn new(name: &'static str) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            name,
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(Vec::new()),
            tx,
        }
    }

    /// Register a callback
    pub fn add_listener<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(f)));
        id
    }

    /// Unregister a callback; returns false if it was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Number of registered callbacks
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Subscribe to the broadcast channel
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.tx.subscribe()
    }

    /// Deliver an event to every callback, then to broadcast subscribers
    pub fn emit(&self, event: &T) {
        // Snapshot so callbacks may add/remove listeners without deadlocking
        let snapshot: Vec<Callback<T>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, f)| Arc::clone(f))
            .collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!("{} listener panicked; continuing with remaining listeners", self.name);
            }
        }

        // No receivers is fine
        let _ = self.tx.send(event.clone());
    }
}
