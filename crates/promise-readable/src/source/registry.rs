//! ListenerRegistry — per-event listener lists for readable sources.
//!
//! Listeners are stored as `Arc<dyn Fn(&SourceEvent)>` so snapshots are cheap.
//! Snapshot-on-emit semantics mean:
//!   - A listener removed *during* emission is still called in that round.
//!   - A listener added *during* emission is NOT called until the next emit.
//!
//! All methods take `&self` (interior mutability via `parking_lot::Mutex`),
//! which allows listeners to call `on()`/`off()` during `emit()` without
//! deadlocking. Sources implement [`ReadableSource`](super::ReadableSource)
//! subscription by delegating to a registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::event::{EventKind, SourceEvent};

/// A listener ID returned by [`ListenerRegistry::on`] that can be passed to
/// [`ListenerRegistry::off`] to remove the listener.
pub type ListenerId = u64;

/// Shared listener closure.
pub type Listener = Arc<dyn Fn(&SourceEvent) + Send + Sync>;

/// Listener lists keyed by event kind.
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `listener` for `kind` and return its [`ListenerId`].
    pub fn on(&self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .entry(kind)
            .or_default()
            .push((id, listener));
        id
    }

    /// Remove the listener identified by `id` from `kind`.
    ///
    /// Does nothing if `id` is not present (safe to call multiple times).
    pub fn off(&self, kind: EventKind, id: ListenerId) {
        let mut listeners = self.listeners.lock();
        if let Some(list) = listeners.get_mut(&kind) {
            list.retain(|(lid, _)| *lid != id);
            if list.is_empty() {
                listeners.remove(&kind);
            }
        }
    }

    /// Deliver `event` to the listeners registered for its kind.
    ///
    /// The lock is released before any callback runs. Returns `true` if at
    /// least one listener was called.
    pub fn emit(&self, event: &SourceEvent) -> bool {
        let snapshot: Vec<Listener> = {
            let guard = self.listeners.lock();
            match guard.get(&event.kind()) {
                Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return false,
            }
        };
        for cb in &snapshot {
            cb(event);
        }
        !snapshot.is_empty()
    }

    /// Number of listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Number of listeners across all kinds.
    pub fn size(&self) -> usize {
        self.listeners.lock().values().map(Vec::len).sum()
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
