//! Bounded in-memory log for one MCP server.
//!
//! Start failures, stop failures and the child's stderr all land here so a
//! presentation layer can show them next to the server's status.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;

/// Line buffer that evicts whole lines, oldest first, once the stored
/// text would exceed `max_bytes`.
pub struct LogBuffer {
    lines: VecDeque<String>,
    /// Stored bytes, counting one newline per line.
    bytes: usize,
    max_bytes: usize,
}

impl LogBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            max_bytes,
        }
    }

    /// Append one line. A line that alone exceeds the budget keeps its head.
    pub fn push(&mut self, line: &str) {
        let line = line.trim_end_matches('\n');
        let budget = self.max_bytes.saturating_sub(1);
        let mut cut = line.len().min(budget);
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        let line = &line[..cut];

        self.bytes += line.len() + 1;
        self.lines.push_back(line.to_owned());
        while self.bytes > self.max_bytes {
            match self.lines.pop_front() {
                Some(old) => self.bytes -= old.len() + 1,
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Stored lines joined with `\n`, newline-terminated.
    pub fn contents(&self) -> String {
        let mut out = String::with_capacity(self.bytes);
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.bytes = 0;
    }
}

/// Cloneable handle to a server's [`LogBuffer`].
///
/// Each entry is one line prefixed with an RFC 3339 timestamp.
#[derive(Clone)]
pub struct ServerLog {
    inner: Arc<Mutex<LogBuffer>>,
}

impl ServerLog {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LogBuffer::new(max_bytes))),
        }
    }

    /// Append a timestamped line.
    pub fn push(&self, message: impl AsRef<str>) {
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let line = format!("[{ts}] {}", message.as_ref().trim_end());
        self.inner.lock().push(&line);
    }

    /// Full contents of the buffer.
    pub fn contents(&self) -> String {
        self.inner.lock().contents()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl Default for ServerLog {
    fn default() -> Self {
        Self::new(65_536)
    }
}
