//! Incremental decoding of response bodies into text.
//!
//! A [`ChunkDecoder`] turns the raw byte chunks of a response body into text
//! fragments. Decoders are stateful: a multi-byte character or an event record
//! split across two chunks is held back until the rest of it arrives.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::sse::EventStreamDecoder;

/// Converts a body, one network chunk at a time, into plain text.
pub trait ChunkDecoder: Send {
    /// Decodes the next chunk and returns the text it completes.
    ///
    /// The returned text may be empty if the chunk only carried part of a
    /// character or record.
    fn decode(&mut self, bytes: &[u8]) -> Result<String>;

    /// Flushes anything held back once the body has ended.
    fn finish(&mut self) -> Result<String>;
}

/// How the upstream frames the text it streams back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Framing {
    /// The body is the text itself.
    #[default]
    Plain,
    /// The body is a sequence of `data:` event records.
    EventStream,
}

impl Framing {
    /// Creates a fresh decoder for one response body.
    pub fn decoder(self) -> Box<dyn ChunkDecoder> {
        match self {
            Framing::Plain => Box::new(PlainTextDecoder::new()),
            Framing::EventStream => Box::new(EventStreamDecoder::new()),
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::Plain => f.write_str("plain"),
            Framing::EventStream => f.write_str("event-stream"),
        }
    }
}

impl FromStr for Framing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(Framing::Plain),
            "event-stream" | "sse" => Ok(Framing::EventStream),
            other => Err(Error::validation(
                format!("unknown framing '{other}' (expected plain or event-stream)"),
                Some("framing".to_string()),
            )),
        }
    }
}

/// Stateful UTF-8 decoder.
///
/// Invalid sequences are replaced with U+FFFD, and a truncated character at
/// the end of the body becomes a single U+FFFD.
#[derive(Debug, Default)]
pub struct PlainTextDecoder {
    pending: Vec<u8>,
}

impl PlainTextDecoder {
    /// Creates a decoder with nothing held back.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChunkDecoder for PlainTextDecoder {
    fn decode(&mut self, bytes: &[u8]) -> Result<String> {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(text) => {
                    out.push_str(text);
                    start = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid = start + err.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.pending[start..valid])?);
                    start = valid;
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start += len;
                        }
                        // Incomplete character; wait for the next chunk.
                        None => break,
                    }
                }
            }
        }
        self.pending.drain(..start);
        Ok(out)
    }

    fn finish(&mut self) -> Result<String> {
        if self.pending.is_empty() {
            return Ok(String::new());
        }
        self.pending.clear();
        Ok(char::REPLACEMENT_CHARACTER.to_string())
    }
}
