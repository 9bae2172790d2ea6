//! SourceEvent — the lifecycle and data events a readable source emits.
//!
//! Listeners are registered per [`EventKind`]; the emitted [`SourceEvent`]
//! carries the payload for that kind.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::encoding::Chunk;
use crate::error::SourceError;

/// Event names a readable source can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    Readable,
    Data,
    End,
    Close,
    Destroy,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        Self::Open,
        Self::Readable,
        Self::Data,
        Self::End,
        Self::Close,
        Self::Destroy,
        Self::Error,
    ];

    /// The conventional lowercase event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Readable => "readable",
            Self::Data => "data",
            Self::End => "end",
            Self::Close => "close",
            Self::Destroy => "destroy",
            Self::Error => "error",
        }
    }

    /// `true` for events after which no further data is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End | Self::Close | Self::Destroy | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown event: {s}"))
    }
}

/// An event emitted by a readable source, with its payload.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// The underlying resource was opened; carries its numeric handle.
    Open(i32),
    /// Data became available through the source's synchronous `read()`.
    Readable,
    /// A chunk was delivered in flowing mode.
    Data(Bytes),
    End,
    Close,
    Destroy,
    Error(SourceError),
}

impl SourceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Open(_) => EventKind::Open,
            Self::Readable => EventKind::Readable,
            Self::Data(_) => EventKind::Data,
            Self::End => EventKind::End,
            Self::Close => EventKind::Close,
            Self::Destroy => EventKind::Destroy,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// The value a `once` wait resolves with, when the event carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Handle(i32),
    Chunk(Chunk),
}

impl Payload {
    pub fn handle(&self) -> Option<i32> {
        match self {
            Self::Handle(fd) => Some(*fd),
            Self::Chunk(_) => None,
        }
    }
}
