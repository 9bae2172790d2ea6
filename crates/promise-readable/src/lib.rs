//! Future-returning adapter over event-emitting readable sources.
//!
//! A [`ReadableSource`] emits `open`, `readable`, `data`, `end`, `close`,
//! `destroy` and `error` events to registered listeners. [`PromiseReadable`]
//! turns that into single operations: [`read`](PromiseReadable::read) the
//! next chunk, [`read_all`](PromiseReadable::read_all) until the end, or wait
//! [`once`](PromiseReadable::once) for an event. Each call subscribes to the
//! events that can settle it and unsubscribes all of them when the first one
//! fires.

pub mod encoding;
pub mod error;
pub mod readable;
pub mod source;

pub use encoding::{Chunk, Encoding, StreamDecoder};
pub use error::{source_error, ReadableError, Result, SourceError};
pub use readable::{AsPromiseReadable, PromiseReadable, ReadableOptions, Settle};
pub use source::{
    EventKind, Listener, ListenerId, ListenerRegistry, Payload, ReadableSource, SourceEvent,
    SourceStatus,
};
