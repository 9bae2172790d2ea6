//! Source layer — the interface the adapter consumes from a readable source.
//!
//! # Modules
//!
//! - [`event`] — [`EventKind`], [`SourceEvent`] and [`Payload`].
//! - [`registry`] — [`ListenerRegistry`], per-event listener lists.
//! - [`traits`] — [`ReadableSource`] and [`SourceStatus`].

pub mod event;
pub mod registry;
pub mod traits;

pub use event::{EventKind, Payload, SourceEvent};
pub use registry::{Listener, ListenerId, ListenerRegistry};
pub use traits::{ReadableSource, SourceStatus};
