//! Incremental decoding of a streamed chat-completion body.
//!
//! The body arrives as arbitrary byte chunks. Chunk boundaries may fall
//! inside a multi-byte character or in the middle of a line, so decoding is
//! split into three stages that each carry state across chunks:
//!
//! ```text
//! bytes --Utf8StreamDecoder--> text --LineBuffer--> lines --parse_line--> StreamEvent
//! ```
//!
//! Lines of interest look like:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//! data: [DONE]
//! ```

use serde_json::Value;

use crate::error::LineParseError;

/// Prefix marking a line that carries an event payload.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that ends the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One decoded event from a `data: ` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A non-empty fragment of assistant text.
    Delta(String),
    /// The terminal sentinel.
    Done,
}

/// UTF-8 decoder that keeps an incomplete trailing sequence for the next call.
///
/// Invalid bytes are replaced with U+FFFD instead of failing the stream.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            // Truncated sequence at the end: wait for more bytes.
                            self.pending = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush at end of stream. A dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// Splits decoded text into complete lines, holding back the unterminated tail.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` and drain every complete line, without its `\n` or `\r\n`.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buf.push_str(text);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line = self.buf[..pos].trim_end_matches('\r').to_string();
            self.buf.drain(..=pos);
            lines.push(line);
        }
        lines
    }

    /// Whatever is left once the stream ends, if it is not blank.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest.trim_end_matches('\r').to_string())
        }
    }
}

/// Byte chunks in, complete lines out.
#[derive(Debug, Default)]
pub struct SseDecoder {
    utf8: Utf8StreamDecoder,
    lines: LineBuffer,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.utf8.decode(chunk);
        self.lines.push(&text)
    }

    pub fn finish(&mut self) -> Vec<String> {
        let tail = self.utf8.finish();
        let mut lines = self.lines.push(&tail);
        lines.extend(self.lines.finish());
        lines
    }
}

/// Interpret one line of the stream.
///
/// Returns `Ok(None)` for lines without the `data: ` prefix and for payloads
/// that carry no text delta. Only a payload that fails to parse as JSON is an
/// error, and it concerns this line alone.
pub fn parse_line(line: &str) -> Result<Option<StreamEvent>, LineParseError> {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };
    let payload = payload.trim();

    if payload == DONE_SENTINEL {
        return Ok(Some(StreamEvent::Done));
    }

    let json: Value = serde_json::from_str(payload).map_err(|e| LineParseError {
        payload: payload.to_string(),
        message: e.to_string(),
    })?;

    let delta = json
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty());

    Ok(delta.map(|content| StreamEvent::Delta(content.to_string())))
}
