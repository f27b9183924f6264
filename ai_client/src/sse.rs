//! Incremental decoding of `data: <json>` event streams.
//!
//! ```text
//! data: {"content": "Hel"}
//!
//! data: {"content": "lo"}
//!
//! data: [DONE]
//! ```
//!
//! Bytes are buffered until a full line is available, so lines (and UTF-8
//! sequences) split across network chunks decode correctly.

use serde::Deserialize;

pub const DONE_MARKER: &str = "[DONE]";

#[derive(Deserialize)]
struct Fragment {
    content: Option<String>,
}

#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of the body. Returns `true` once the `[DONE]` marker has
    /// been seen; anything after it is discarded.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        if self.done {
            return true;
        }
        self.pending.extend_from_slice(chunk);

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.consume_line(&line);
            if self.done {
                self.pending.clear();
                break;
            }
        }
        self.done
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consumes a trailing line without newline and returns the fragments
    /// concatenated in arrival order.
    pub fn finish(mut self) -> String {
        if !self.done && !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.consume_line(&line);
        }
        self.text
    }

    fn consume_line(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let Some(data) = parse_data_line(&line) else {
            return;
        };

        if data == DONE_MARKER {
            self.done = true;
            return;
        }

        match serde_json::from_str::<Fragment>(data) {
            Ok(Fragment {
                content: Some(content),
            }) => self.text.push_str(&content),
            Ok(_) => {}
            Err(e) => tracing::debug!("Skipping malformed event line {data:?}: {e}"),
        }
    }
}

/// Returns the payload of a `data:` line, `None` for any other line.
pub fn parse_data_line(line: &str) -> Option<&str> {
    line.trim_end_matches(['\r', '\n'])
        .strip_prefix("data:")
        .map(str::trim)
}
