//! Readable source trait consumed by [`PromiseReadable`](crate::PromiseReadable).
//!
//! The source owns its buffering, flow control and framing. The adapter only
//! subscribes to its events, inspects its status flags and pulls buffered
//! chunks through the synchronous [`ReadableSource::read`].

use bytes::Bytes;

use super::event::EventKind;
use super::registry::{Listener, ListenerId};

/// Snapshot of a source's readable/terminal flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStatus {
    /// `false` once the source can no longer produce data.
    pub readable: bool,
    /// The source emitted `end`.
    pub ended: bool,
    /// The source emitted `close`.
    pub closed: bool,
    /// The source was destroyed.
    pub destroyed: bool,
}

impl SourceStatus {
    /// A live source that has not reached any terminal state.
    pub const fn open() -> Self {
        Self {
            readable: true,
            ended: false,
            closed: false,
            destroyed: false,
        }
    }
}

impl Default for SourceStatus {
    fn default() -> Self {
        Self::open()
    }
}

/// An event-emitting readable data source.
///
/// Implementors must be `Send + Sync` so they can be shared with listener
/// closures. `on`/`off` must tolerate being called from inside a listener
/// (see [`ListenerRegistry`](super::ListenerRegistry)).
pub trait ReadableSource: Send + Sync + 'static {
    /// Subscribe `listener` to `kind`.
    fn on(&self, kind: EventKind, listener: Listener) -> ListenerId;

    /// Unsubscribe a listener. Unknown ids are ignored.
    fn off(&self, kind: EventKind, id: ListenerId);

    /// Current status flags.
    fn status(&self) -> SourceStatus;

    /// Take the next buffered chunk, if one is available right now.
    ///
    /// May emit events synchronously (e.g. `end` once the buffer is drained,
    /// or a pending `error`).
    fn read(&self) -> Option<Bytes>;

    /// Switch the source into flowing mode. Sources without a paused mode
    /// keep the default no-op.
    fn resume(&self) {}
}
