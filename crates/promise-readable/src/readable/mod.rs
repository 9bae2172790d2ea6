//! Readable layer — the future-returning adapter over a [`ReadableSource`].
//!
//! # Overview
//!
//! [`PromiseReadable`] wraps a source and exposes `read`, `read_all`, `once`
//! and `destroy`. Every operation returns a [`Settle`] future that resolves
//! exactly once.
//!
//! # Modules
//!
//! - [`adapter`] — [`PromiseReadable<S>`] and [`AsPromiseReadable`].
//! - [`options`] — [`ReadableOptions`].
//! - [`settle`] — the [`Settle`] future.
//! - `race` — one-shot race over several source events.
//! - `classify` — immediate settlement from the current status.
//!
//! [`ReadableSource`]: crate::source::ReadableSource

pub mod adapter;
mod classify;
pub mod options;
mod race;
pub mod settle;

pub use adapter::{AsPromiseReadable, PromiseReadable};
pub use options::ReadableOptions;
pub use settle::Settle;
