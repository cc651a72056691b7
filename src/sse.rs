//! Incremental decoder for `text/event-stream` bodies.
//!
//! Only the `data` field matters to the log stream; `event`, `id` and
//! `retry` are accepted and ignored. Chunks may split lines (and UTF-8
//! sequences) anywhere, so bytes are buffered until a line terminator
//! (`\n`, `\r\n` or a bare `\r`) shows up.

/// Largest line or event payload the decoder buffers.
pub const MAX_EVENT_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event-stream line or event exceeds {limit} bytes")]
pub struct EventTooLarge {
    pub limit: usize,
}

#[derive(Debug)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Option<String>,
    /// Last terminator was `\r`; a leading `\n` in the next bytes belongs to it.
    after_cr: bool,
    limit: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_EVENT_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            data: None,
            after_cr: false,
            limit,
        }
    }

    /// Feed a chunk of the response body, returning every event it completed.
    /// An oversized line or event resets the decoder and is an error.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, EventTooLarge> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        loop {
            if self.after_cr && !self.pending.is_empty() {
                if self.pending[0] == b'\n' {
                    self.pending.drain(..1);
                }
                self.after_cr = false;
            }
            let Some(pos) = self
                .pending
                .iter()
                .position(|&b| b == b'\n' || b == b'\r')
            else {
                break;
            };
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.after_cr = line.pop() == Some(b'\r');

            let line = String::from_utf8_lossy(&line);
            match self.process_line(&line) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => return Err(self.reset(e)),
            }
        }

        if self.pending.len() > self.limit {
            return Err(self.reset(EventTooLarge { limit: self.limit }));
        }
        Ok(events)
    }

    fn reset(&mut self, error: EventTooLarge) -> EventTooLarge {
        self.pending.clear();
        self.data = None;
        self.after_cr = false;
        error
    }

    fn process_line(&mut self, line: &str) -> Result<Option<String>, EventTooLarge> {
        if line.is_empty() {
            return Ok(self.data.take());
        }
        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" {
            match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
            if self.data.as_ref().map_or(0, String::len) > self.limit {
                return Err(EventTooLarge { limit: self.limit });
            }
        }
        Ok(None)
    }
}
