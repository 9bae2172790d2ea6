//! State classifier — decides from the current status alone whether an
//! operation can settle without subscribing to anything.

use std::sync::Arc;

use crate::error::{ReadableError, SourceError};
use crate::source::{EventKind, SourceStatus};

/// Terminal state the adapter has observed on its own, independent of what
/// the source reports through [`SourceStatus`].
#[derive(Debug, Default)]
pub(crate) struct Flags {
    pub(crate) ended: bool,
    pub(crate) closed: bool,
    pub(crate) destroyed: bool,
    /// Most recent error captured by the persistent listener.
    pub(crate) errored: Option<SourceError>,
    /// The adapter itself was destroyed.
    pub(crate) detached: bool,
}

impl Flags {
    /// Record a terminal event seen by one of the operation listeners.
    pub(crate) fn observe(&mut self, kind: EventKind) {
        match kind {
            EventKind::End => self.ended = true,
            EventKind::Close => self.closed = true,
            EventKind::Destroy => self.destroyed = true,
            _ => {}
        }
    }
}

/// Why a read-class operation resolved without data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Finish {
    Detached,
    Destroyed,
    Closed,
    Ended,
    NotReadable,
}

pub(crate) enum Verdict {
    Live,
    Finished(Finish),
    Failed(SourceError),
}

/// Classify a `read`/`read_all` call.
pub(crate) fn classify(status: SourceStatus, flags: &Flags) -> Verdict {
    if let Some(e) = &flags.errored {
        return Verdict::Failed(Arc::clone(e));
    }
    if flags.detached {
        Verdict::Finished(Finish::Detached)
    } else if status.destroyed || flags.destroyed {
        Verdict::Finished(Finish::Destroyed)
    } else if status.closed || flags.closed {
        Verdict::Finished(Finish::Closed)
    } else if status.ended || flags.ended {
        Verdict::Finished(Finish::Ended)
    } else if !status.readable {
        Verdict::Finished(Finish::NotReadable)
    } else {
        Verdict::Live
    }
}

pub(crate) enum OnceVerdict {
    Wait,
    Resolve,
    Reject(ReadableError),
}

/// Classify a `once(kind)` call.
///
/// Closed is checked before destroyed: a destroyed source that has also
/// closed reports the close. An adapter detached by its own `destroy()`
/// resolves nothing, since the source itself may still be open.
pub(crate) fn classify_once(kind: EventKind, status: SourceStatus, flags: &Flags) -> OnceVerdict {
    if let Some(e) = &flags.errored {
        return OnceVerdict::Reject(ReadableError::Source(Arc::clone(e)));
    }
    if status.closed || flags.closed {
        return match kind {
            EventKind::Close => OnceVerdict::Resolve,
            event => OnceVerdict::Reject(ReadableError::OnceAfterClose { event }),
        };
    }
    if status.destroyed || flags.destroyed {
        return match kind {
            EventKind::Close | EventKind::End | EventKind::Destroy => OnceVerdict::Resolve,
            event => OnceVerdict::Reject(ReadableError::OnceAfterDestroy { event }),
        };
    }
    if flags.detached {
        return OnceVerdict::Reject(ReadableError::OnceAfterDestroy { event: kind });
    }
    if kind == EventKind::End && (status.ended || flags.ended) {
        return OnceVerdict::Resolve;
    }
    OnceVerdict::Wait
}
