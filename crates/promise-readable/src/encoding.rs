//! Chunk decoding.
//!
//! Sources always deliver binary chunks. When the adapter is configured with
//! an [`Encoding`], chunks are decoded to text before being handed to the
//! caller; otherwise they pass through as [`Bytes`]. [`StreamDecoder`]
//! holds back a multi-byte sequence split across two chunks until the rest
//! of it arrives.

use std::char::REPLACEMENT_CHARACTER;
use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::{Bytes, BytesMut};
use serde::Deserialize;

use crate::error::ReadableError;

/// Text encodings understood by the adapter, named after their Node.js
/// counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Encoding {
    /// Invalid sequences are replaced with U+FFFD.
    Utf8,
    Utf16Le,
    /// One char per byte, U+0000..=U+00FF.
    Latin1,
    /// 7-bit; the high bit of every byte is cleared.
    Ascii,
    /// Lowercase hex digits.
    Hex,
    /// Standard alphabet, padded.
    Base64,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf8",
            Self::Utf16Le => "utf16le",
            Self::Latin1 => "latin1",
            Self::Ascii => "ascii",
            Self::Hex => "hex",
            Self::Base64 => "base64",
        }
    }

    /// Decode `bytes` into text.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Utf16Le => {
                let units = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
                char::decode_utf16(units)
                    .map(|c| c.unwrap_or(REPLACEMENT_CHARACTER))
                    .collect()
            }
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Self::Ascii => bytes.iter().map(|&b| char::from(b & 0x7f)).collect(),
            Self::Hex => hex::encode(bytes),
            Self::Base64 => STANDARD.encode(bytes),
        }
    }

    /// Number of trailing bytes of `bytes` that cannot be decoded until more
    /// input arrives.
    fn incomplete_suffix(&self, bytes: &[u8]) -> usize {
        match self {
            Self::Utf8 => utf8_incomplete_suffix(bytes),
            Self::Utf16Le => {
                let odd = bytes.len() % 2;
                let whole = bytes.len() - odd;
                if whole >= 2 {
                    let last = u16::from_le_bytes([bytes[whole - 2], bytes[whole - 1]]);
                    // High surrogate waiting for its low half.
                    if (0xD800..=0xDBFF).contains(&last) {
                        return odd + 2;
                    }
                }
                odd
            }
            // Base64 output only lines up with the joined input in 3-byte groups.
            Self::Base64 => bytes.len() % 3,
            Self::Latin1 | Self::Ascii | Self::Hex => 0,
        }
    }
}

fn utf8_incomplete_suffix(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = ReadableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Self::Utf16Le),
            "latin1" | "binary" => Ok(Self::Latin1),
            "ascii" => Ok(Self::Ascii),
            "hex" => Ok(Self::Hex),
            "base64" => Ok(Self::Base64),
            _ => Err(ReadableError::UnknownEncoding(s.to_string())),
        }
    }
}

impl TryFrom<String> for Encoding {
    type Error = ReadableError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// A unit of data handed to the caller: raw bytes, or text when an encoding
/// is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Binary(Bytes),
    Text(String),
}

impl Chunk {
    /// Wrap `bytes`, decoding them when `encoding` is set.
    pub fn decode(bytes: Bytes, encoding: Option<Encoding>) -> Self {
        match encoding {
            Some(encoding) => Self::Text(encoding.decode(&bytes)),
            None => Self::Binary(bytes),
        }
    }

    /// Empty content of the type `encoding` selects.
    pub fn empty(encoding: Option<Encoding>) -> Self {
        match encoding {
            Some(_) => Self::Text(String::new()),
            None => Self::Binary(Bytes::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Binary(b) => b.len(),
            Self::Text(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Binary(b) => b,
            Self::Text(s) => s.as_bytes(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// StreamDecoder
// ---------------------------------------------------------------------------

/// Decodes a sequence of chunks, carrying an incomplete trailing sequence
/// over to the next chunk.
///
/// Held-back bytes are raw input, so switching encodings between calls (or
/// dropping back to binary) loses nothing: they are prepended to the next
/// chunk whatever its encoding.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: BytesMut,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while bytes are held back from an earlier chunk.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Decode `bytes` after any held-back prefix.
    pub fn decode(&mut self, bytes: &[u8], encoding: Option<Encoding>) -> Chunk {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);
        let Some(encoding) = encoding else {
            return Chunk::Binary(input.freeze());
        };
        let complete = input.len() - encoding.incomplete_suffix(&input);
        self.pending = input.split_off(complete);
        Chunk::Text(encoding.decode(&input))
    }

    /// Decode whatever is still held back, as the final chunk of the stream.
    pub fn flush(&mut self, encoding: Option<Encoding>) -> Option<Chunk> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending).freeze();
        Some(Chunk::decode(rest, encoding))
    }

    /// Hand the held-back bytes over undecoded.
    pub fn take_pending(&mut self) -> BytesMut {
        std::mem::take(&mut self.pending)
    }
}

impl From<Bytes> for Chunk {
    fn from(b: Bytes) -> Self {
        Self::Binary(b)
    }
}

impl From<String> for Chunk {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Chunk {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}
