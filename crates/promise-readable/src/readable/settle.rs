//! Settle<T> — the future every adapter operation returns.
//!
//! A `Settle` is either decided when it is created (the source's status
//! already fixed the outcome) or waits on the oneshot channel of an
//! `EventRace`. It is `Unpin` and owns a guard on its race: dropping it
//! unsettled detaches the race's listeners.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::Result;

use super::race::Detach;

enum SettleState<T> {
    Ready(Option<Result<T>>),
    Waiting(oneshot::Receiver<Result<T>>),
    /// The operation was detached by `destroy()` and will never settle.
    Abandoned,
}

/// Future returned by every adapter operation.
///
/// The operation is already subscribed when the `Settle` is handed out, so
/// events emitted before the first poll are not lost. Dropping an unsettled
/// `Settle` removes the operation's listeners from the source.
#[must_use = "an adapter operation does nothing useful unless awaited"]
pub struct Settle<T> {
    state: SettleState<T>,
    guard: Option<Arc<dyn Detach>>,
}

impl<T> Settle<T> {
    pub(crate) fn ready(outcome: Result<T>) -> Self {
        Self {
            state: SettleState::Ready(Some(outcome)),
            guard: None,
        }
    }

    pub(crate) fn waiting(receiver: oneshot::Receiver<Result<T>>, guard: Arc<dyn Detach>) -> Self {
        Self {
            state: SettleState::Waiting(receiver),
            guard: Some(guard),
        }
    }

    /// `true` if the outcome was decided without subscribing to the source.
    pub fn is_immediate(&self) -> bool {
        matches!(self.state, SettleState::Ready(Some(_)))
    }
}

// No structural pinning: `T` is only ever moved out by value.
impl<T> Unpin for Settle<T> {}

impl<T> Future for Settle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let polled = match &mut this.state {
            SettleState::Ready(outcome) => {
                // Polled after completion: stay pending.
                return outcome.take().map_or(Poll::Pending, Poll::Ready);
            }
            SettleState::Waiting(receiver) => Pin::new(receiver).poll(cx),
            SettleState::Abandoned => return Poll::Pending,
        };

        match polled {
            Poll::Ready(Ok(outcome)) => {
                this.guard = None;
                this.state = SettleState::Ready(None);
                Poll::Ready(outcome)
            }
            Poll::Ready(Err(_)) => {
                this.guard = None;
                this.state = SettleState::Abandoned;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for Settle<T> {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            guard.detach();
        }
    }
}
