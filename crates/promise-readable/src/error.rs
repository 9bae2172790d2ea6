use std::sync::Arc;

use thiserror::Error;

use crate::source::EventKind;

/// An error emitted by the wrapped source.
///
/// Shared behind an `Arc` so the same error object can be replayed to every
/// operation that observes it.
pub type SourceError = Arc<dyn std::error::Error + Send + Sync>;

/// Wrap any error type into a [`SourceError`].
pub fn source_error<E>(e: E) -> SourceError
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(e)
}

// ---------------------------------------------------------------------------
// ReadableError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum ReadableError {
    /// The source emitted `error`. Carries the emitted error unchanged.
    #[error("{0}")]
    Source(SourceError),

    #[error("once {event} after close")]
    OnceAfterClose { event: EventKind },

    #[error("once {event} after destroy")]
    OnceAfterDestroy { event: EventKind },

    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),
}

impl ReadableError {
    /// The source-emitted error, if this rejection came from the source.
    pub fn source_error(&self) -> Option<&SourceError> {
        match self {
            Self::Source(e) => Some(e),
            _ => None,
        }
    }

    /// `true` if `other` is the very error object carried by this rejection.
    pub fn is_same_source(&self, other: &SourceError) -> bool {
        self.source_error().is_some_and(|e| Arc::ptr_eq(e, other))
    }
}

impl From<SourceError> for ReadableError {
    fn from(e: SourceError) -> Self {
        Self::Source(e)
    }
}

/// Convenience alias; the default error type is `ReadableError`.
pub type Result<T, E = ReadableError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
