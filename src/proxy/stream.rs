//! Upstream SSE decoding.
//!
//! Provides [`SseDecoder`] for line-buffered extraction of `data:` payloads
//! from OpenAI-compatible streaming responses. Handles TCP chunk boundary
//! reassembly correctly.

use super::types::ChatCompletionChunk;
use crate::error::{Error, Result};

/// Longest line kept while waiting for a newline.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// One meaningful SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// A `data:` payload other than the terminator.
    Data(String),
    /// `data: [DONE]`
    Done,
}

/// Buffers raw bytes across chunk boundaries and reassembles complete lines.
///
/// Lines are split on `\n`; a trailing `\r` is dropped. Only `data:` lines
/// are reported; `event:`, `id:`, `retry:` and comments are skipped.
/// A line longer than 64 KiB is dropped as a whole, up to its newline.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    discarding: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return the complete lines it finished.
    pub fn feed(&mut self, mut bytes: &[u8]) -> Vec<SseLine> {
        if self.discarding {
            match bytes.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.discarding = false;
                    bytes = &bytes[pos + 1..];
                }
                None => return Vec::new(),
            }
        }

        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(parsed) = parse_line(&line[..line.len() - 1]) {
                lines.push(parsed);
            }
        }

        if self.buffer.len() > MAX_LINE_BYTES {
            tracing::warn!(
                bytes = self.buffer.len(),
                "Discarding oversized SSE line without newline"
            );
            self.buffer.clear();
            self.discarding = true;
        }

        lines
    }

    /// Flush whatever is left in the buffer as a final line.
    pub fn finish(&mut self) -> Option<SseLine> {
        let rest = std::mem::take(&mut self.buffer);
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseLine> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches('\r');

    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);

    if data.trim() == "[DONE]" {
        Some(SseLine::Done)
    } else {
        Some(SseLine::Data(data.to_string()))
    }
}

/// Extract the text fragment from one upstream `data:` payload.
///
/// An `{"error": ...}` payload is a provider failure. Malformed JSON is
/// skipped with a warning.
pub fn parse_fragment(data: &str) -> Result<Option<String>> {
    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping malformed SSE data line");
            return Ok(None);
        }
    };

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        return Err(Error::Provider(error_message(error)));
    }

    match serde_json::from_value::<ChatCompletionChunk>(value) {
        Ok(chunk) => Ok(chunk.content()),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping SSE chunk with unexpected shape");
            Ok(None)
        }
    }
}

/// Human-readable message from an OpenAI-style error value.
///
/// Accepts `"text"`, `{"message": "text"}` or any other JSON.
pub fn error_message(error: &serde_json::Value) -> String {
    match error {
        serde_json::Value::String(s) => s.clone(),
        other => other
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}
