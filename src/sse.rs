//! Server-Sent Events framing.
//!
//! Some upstreams wrap each text fragment in a `data:` event record instead of
//! streaming the text directly. [`EventStreamDecoder`] strips that framing so
//! the accumulator only ever sees a plain character stream.

use serde_json::Value;

use crate::decoder::{ChunkDecoder, PlainTextDecoder};
use crate::error::{Error, Result};

// Where the text fragment lives in the JSON payloads we know about.
const TEXT_POINTERS: &[&str] = &["/choices/0/delta/content", "/choices/0/text", "/delta/text"];

/// Decodes a `text/event-stream` body into the text it carries.
///
/// Records are delimited by blank lines. Multiple `data:` lines in one record
/// are joined with newlines. A `[DONE]` record ends the stream; anything after
/// it is ignored. An `error` event fails the stream.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    text: PlainTextDecoder,
    buffer: String,
    event: Option<String>,
    data: Vec<String>,
    done: bool,
}

impl EventStreamDecoder {
    /// Creates a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once a `[DONE]` record has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn drain_lines(&mut self, at_end: bool) -> Result<String> {
        let mut out = String::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            self.process_line(line.trim_end_matches(['\n', '\r']), &mut out)?;
        }
        if at_end {
            let rest = std::mem::take(&mut self.buffer);
            if !rest.is_empty() {
                self.process_line(rest.trim_end_matches('\r'), &mut out)?;
            }
            self.dispatch(&mut out)?;
        }
        Ok(out)
    }

    fn process_line(&mut self, line: &str, out: &mut String) -> Result<()> {
        if self.done {
            return Ok(());
        }
        if line.is_empty() {
            return self.dispatch(out);
        }
        if line.starts_with(':') {
            return Ok(());
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            _ => {}
        }
        Ok(())
    }

    fn dispatch(&mut self, out: &mut String) -> Result<()> {
        let event = self.event.take();
        if self.data.is_empty() {
            return Ok(());
        }
        let data = self.data.join("\n");
        self.data.clear();
        if event.as_deref() == Some("error") {
            return Err(Error::streaming(
                format!("upstream reported an error: {data}"),
                None,
            ));
        }
        if data == "[DONE]" {
            self.done = true;
            return Ok(());
        }
        out.push_str(&extract_text(&data));
        Ok(())
    }
}

impl ChunkDecoder for EventStreamDecoder {
    fn decode(&mut self, bytes: &[u8]) -> Result<String> {
        let text = self.text.decode(bytes)?;
        self.buffer.push_str(&text);
        self.drain_lines(false)
    }

    fn finish(&mut self) -> Result<String> {
        let tail = self.text.finish()?;
        self.buffer.push_str(&tail);
        self.drain_lines(true)
    }
}

/// Pulls the text fragment out of one record's data.
///
/// JSON objects are searched for a known text field and contribute nothing if
/// none is present (for example a role-only delta). Anything that is not a
/// JSON object or string is taken as literal text.
fn extract_text(data: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(value @ Value::Object(_)) => {
            TEXT_POINTERS
                .iter()
                .find_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string()
        }
        Ok(Value::String(text)) => text,
        _ => data.to_string(),
    }
}
