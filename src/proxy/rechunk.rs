//! Rate-shaped re-chunking of upstream text.
//!
//! Upstream providers deliver text in bursts of irregular size. The
//! re-chunker buffers it and releases fixed-size slices at a fixed cadence,
//! so callers see a steady typing rate regardless of upstream behavior.
//! Output is a pure re-segmentation: concatenating every slice yields exactly
//! the concatenated input.

use std::time::Duration;

use async_stream::try_stream;
use futures::{Stream, StreamExt};

use crate::config::PacingConfig;
use crate::error::Result;

/// Slice size and delay between slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    slice_chars: usize,
    interval: Duration,
}

impl Pacing {
    /// Explicit slice size (clamped to at least one character) and interval.
    pub fn new(slice_chars: usize, interval: Duration) -> Self {
        Self {
            slice_chars: slice_chars.max(1),
            interval,
        }
    }

    /// Slice size derived from a target rate: `ceil(rate * interval / 1s)`.
    pub fn from_rate(chars_per_second: u32, interval: Duration) -> Self {
        let per_interval = (chars_per_second as u128 * interval.as_millis()).div_ceil(1000);
        Self::new(per_interval as usize, interval)
    }

    pub fn slice_chars(&self) -> usize {
        self.slice_chars
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::from(&PacingConfig::default())
    }
}

impl From<&PacingConfig> for Pacing {
    fn from(config: &PacingConfig) -> Self {
        Self::from_rate(
            config.chars_per_second,
            Duration::from_millis(config.interval_ms),
        )
    }
}

/// Append-only text buffer that hands out fixed-size slices.
///
/// Sizes are counted in `char`s, so a slice never splits a code point.
#[derive(Debug)]
pub struct Rechunker {
    buffer: String,
    buffered_chars: usize,
    slice_chars: usize,
}

impl Rechunker {
    pub fn new(slice_chars: usize) -> Self {
        Self {
            buffer: String::new(),
            buffered_chars: 0,
            slice_chars: slice_chars.max(1),
        }
    }

    pub fn push(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
        self.buffered_chars += fragment.chars().count();
    }

    /// Remove and return the next full slice, if the buffer holds one.
    pub fn next_slice(&mut self) -> Option<String> {
        if self.buffered_chars < self.slice_chars {
            return None;
        }

        let split_at = self
            .buffer
            .char_indices()
            .nth(self.slice_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(self.buffer.len());
        let rest = self.buffer.split_off(split_at);
        self.buffered_chars -= self.slice_chars;

        Some(std::mem::replace(&mut self.buffer, rest))
    }

    /// The partial remainder left once the input has ended.
    pub fn finish(self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer)
        }
    }
}

/// Re-chunk a fragment stream according to `pacing`.
///
/// After each full slice the stream sleeps for the pacing interval before
/// looking at the buffer again. When the input ends, the remainder is
/// emitted as one final, possibly shorter, slice. An input error is
/// forwarded as-is and whatever is still buffered is dropped.
pub fn rechunk<S>(fragments: S, pacing: Pacing) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = Result<String>> + Send + 'static,
{
    try_stream! {
        let mut fragments = Box::pin(fragments);
        let mut rechunker = Rechunker::new(pacing.slice_chars());

        while let Some(fragment) = fragments.next().await {
            rechunker.push(&fragment?);

            while let Some(slice) = rechunker.next_slice() {
                yield slice;
                tokio::time::sleep(pacing.interval()).await;
            }
        }

        if let Some(rest) = rechunker.finish() {
            yield rest;
        }
    }
}
