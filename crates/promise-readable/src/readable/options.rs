//! ReadableOptions — construction config for the adapter.

use serde::Deserialize;

use crate::encoding::Encoding;

/// Construction options for [`PromiseReadable`](super::PromiseReadable).
///
/// Deserializable so it can be embedded in an application's config file:
///
/// ```
/// # use promise_readable::{Encoding, ReadableOptions};
/// let options: ReadableOptions =
///     serde_json::from_str(r#"{ "encoding": "utf8" }"#).unwrap();
/// assert_eq!(options.encoding, Some(Encoding::Utf8));
/// assert!(!options.resume_on_read_all);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadableOptions {
    /// Decode delivered chunks to text.
    pub encoding: Option<Encoding>,
    /// Call [`ReadableSource::resume`](crate::ReadableSource::resume) when
    /// `read_all` starts, so a paused source begins delivering data.
    pub resume_on_read_all: bool,
}
