//! EventRace — a one-shot race over several source events.
//!
//! An operation subscribes one handler per event kind. The first handler to
//! call [`EventRace::resolve`] or [`EventRace::reject`] wins: every listener the
//! race registered is removed from the source, then the outcome is sent to
//! the waiting [`Settle`] future. Later calls are no-ops.
//!
//! The race holds only a `Weak` reference to the source; the source's
//! listener lists hold the race. Removing the listeners therefore frees it.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{ReadableError, Result};
use crate::source::{EventKind, ListenerId, ReadableSource, SourceEvent};

use super::settle::Settle;

/// Type-erased handle the adapter keeps on every pending operation so that
/// `destroy()` can tear it down.
pub(crate) trait Detach: Send + Sync {
    /// Remove the operation's listeners without settling it.
    ///
    /// Returns `false` if the operation had already settled or been detached.
    fn detach(&self) -> bool;

    fn is_settled(&self) -> bool;
}

struct RaceState<T> {
    sender: Option<oneshot::Sender<Result<T>>>,
    subscriptions: Vec<(EventKind, ListenerId)>,
}

pub(crate) struct EventRace<S, T> {
    source: Weak<S>,
    operation: &'static str,
    state: Mutex<RaceState<T>>,
}

impl<S: ReadableSource, T: Send + 'static> EventRace<S, T> {
    /// Create a pending race and the future that observes its outcome.
    pub(crate) fn start(source: &Arc<S>, operation: &'static str) -> (Arc<Self>, Settle<T>) {
        let (sender, receiver) = oneshot::channel();
        let race = Arc::new(Self {
            source: Arc::downgrade(source),
            operation,
            state: Mutex::new(RaceState {
                sender: Some(sender),
                subscriptions: Vec::new(),
            }),
        });
        let guard: Arc<dyn Detach> = Arc::clone(&race) as Arc<dyn Detach>;
        (race, Settle::waiting(receiver, guard))
    }

    /// Register `handler` for `kind` on the source.
    pub(crate) fn subscribe<F>(self: &Arc<Self>, kind: EventKind, handler: F)
    where
        F: Fn(&Arc<Self>, &SourceEvent) + Send + Sync + 'static,
    {
        let Some(source) = self.source.upgrade() else {
            return;
        };
        let race = Arc::clone(self);
        let id = source.on(kind, Arc::new(move |event: &SourceEvent| handler(&race, event)));

        let mut state = self.state.lock();
        if state.sender.is_some() {
            state.subscriptions.push((kind, id));
        } else {
            drop(state);
            source.off(kind, id);
        }
    }

    pub(crate) fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub(crate) fn reject(&self, error: ReadableError) -> bool {
        self.settle(Err(error))
    }

    pub(crate) fn source(&self) -> Option<Arc<S>> {
        self.source.upgrade()
    }

    fn settle(&self, outcome: Result<T>) -> bool {
        let (sender, subscriptions) = {
            let mut state = self.state.lock();
            let Some(sender) = state.sender.take() else {
                return false;
            };
            (sender, std::mem::take(&mut state.subscriptions))
        };
        self.unsubscribe(subscriptions);
        tracing::trace!(
            operation = self.operation,
            rejected = outcome.is_err(),
            "operation settled"
        );
        // The caller may have dropped the future already.
        let _ = sender.send(outcome);
        true
    }

    fn unsubscribe(&self, subscriptions: Vec<(EventKind, ListenerId)>) {
        if let Some(source) = self.source.upgrade() {
            for (kind, id) in subscriptions {
                source.off(kind, id);
            }
        }
    }
}

impl<S: ReadableSource, T: Send + 'static> Detach for EventRace<S, T> {
    fn detach(&self) -> bool {
        let subscriptions = {
            let mut state = self.state.lock();
            if state.sender.take().is_none() {
                return false;
            }
            std::mem::take(&mut state.subscriptions)
        };
        self.unsubscribe(subscriptions);
        true
    }

    fn is_settled(&self) -> bool {
        self.state.lock().sender.is_none()
    }
}
