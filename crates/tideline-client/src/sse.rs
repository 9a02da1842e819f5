//! Incremental decoder for `text/event-stream` bodies.
//!
//! Only `data` fields matter here: each event's data lines are joined with
//! `\n` and yielded when the blank line that ends the event arrives.
//! Comment lines (`:keep-alive`) and the `event`, `id` and `retry` fields
//! are ignored. Bytes are buffered until a full line is available, so
//! chunks may split lines and UTF-8 sequences anywhere.

use tracing::warn;

/// Largest line or event payload the decoder buffers, in bytes.
pub const DEFAULT_MAX_EVENT_BYTES: usize = 1 << 20;

/// Stateful SSE line decoder.
///
/// A line longer than the limit is discarded up to its newline, and an
/// event whose data outgrows the limit is dropped up to the blank line
/// that ends it.
#[derive(Debug)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Option<String>,
    max_bytes: usize,
    skipping_line: bool,
    skipping_event: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_EVENT_BYTES)
    }
}

impl SseDecoder {
    /// Create an empty decoder with the default size limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty decoder that buffers at most `max_bytes` per line
    /// and per event.
    pub const fn with_limit(max_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            data: None,
            max_bytes,
            skipping_line: false,
            skipping_event: false,
        }
    }

    /// Feed one chunk and return the data of every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(newline) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            if self.skipping_line {
                self.skipping_line = false;
                continue;
            }
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(data) = self.line(line) {
                events.push(data);
            }
        }
        if self.pending.len() > self.max_bytes {
            warn!(
                buffered = self.pending.len(),
                limit = self.max_bytes,
                "SSE line over limit, discarding event"
            );
            self.pending.clear();
            self.skipping_line = true;
            self.skip_event();
        }
        events
    }

    fn skip_event(&mut self) {
        self.data = None;
        self.skipping_event = true;
    }

    fn line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.skipping_event {
                self.skipping_event = false;
                return None;
            }
            return self.data.take();
        }
        if line.starts_with(':') || self.skipping_event {
            return None;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        if field == "data" {
            let value = value.strip_prefix(' ').unwrap_or(value);
            let size = self
                .data
                .as_ref()
                .map_or(0, |data| data.len().saturating_add(1))
                .saturating_add(value.len());
            if size > self.max_bytes {
                warn!(size, limit = self.max_bytes, "SSE event over limit, discarding");
                self.skip_event();
                return None;
            }
            match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_owned()),
            }
        }
        None
    }
}
