//! In-memory server log.
//!
//! A bounded ring buffer of formatted log lines, fed by a `tracing` layer so
//! every event emitted anywhere in the process is also visible over the HTTP
//! log endpoint. Each line carries a monotonic sequence number so a client
//! can poll incrementally with a `since` marker. Optionally the same lines
//! are appended to a file.

use crate::time;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Maximum number of lines retained in memory.
pub const LOG_CAPACITY: usize = 1000;

/// One formatted log line with its sequence number.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub seq: u64,
    pub line: String,
}

/// Bounded, shared buffer of recent server log lines.
#[derive(Debug)]
pub struct LogBuffer {
    lines: Mutex<VecDeque<LogLine>>,
    next_seq: AtomicU64,
    file: Option<Mutex<File>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(LOG_CAPACITY)),
            next_seq: AtomicU64::new(1),
            file: None,
        }
    }

    /// Buffer that also appends each line to `path`.
    pub fn with_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            lines: Mutex::new(VecDeque::with_capacity(LOG_CAPACITY)),
            next_seq: AtomicU64::new(1),
            file: Some(Mutex::new(file)),
        })
    }

    /// Append one line, evicting the oldest when full.
    pub fn push(&self, line: String) {
        if let Some(file) = &self.file
            && let Ok(mut file) = file.lock()
        {
            // File append is best-effort; the in-memory buffer is canonical.
            let _ = writeln!(file, "{line}");
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        if lines.len() >= LOG_CAPACITY {
            lines.pop_front();
        }
        lines.push_back(LogLine { seq, line });
    }

    /// Last `limit` lines, oldest first.
    pub fn tail(&self, limit: usize) -> Vec<LogLine> {
        let lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        let skip = lines.len().saturating_sub(limit);
        lines.iter().skip(skip).cloned().collect()
    }

    /// Lines with a sequence number greater than `marker`, capped at `limit`,
    /// oldest first. Lines evicted before the call are simply gone.
    pub fn since(&self, marker: u64, limit: usize) -> Vec<LogLine> {
        let lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines
            .iter()
            .filter(|l| l.seq > marker)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Highest sequence number handed out so far (0 when empty).
    pub fn last_seq(&self) -> u64 {
        self.next_seq.load(Ordering::Relaxed).saturating_sub(1)
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// `tracing` layer that mirrors every event into a [`LogBuffer`].
pub struct BufferLayer {
    buffer: Arc<LogBuffer>,
}

impl BufferLayer {
    pub fn new(buffer: Arc<LogBuffer>) -> Self {
        Self { buffer }
    }
}

impl<S> Layer<S> for BufferLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let meta = event.metadata();
        let mut line = format!(
            "{} {:>5} {}: {}",
            time::to_rfc3339(SystemTime::now()),
            meta.level(),
            meta.target(),
            visitor.message
        );
        if !visitor.fields.is_empty() {
            let _ = write!(line, " {}", visitor.fields.trim_end());
        }
        self.buffer.push(line);
    }
}

/// Collects the `message` field and renders the rest as `key=value` pairs.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            let _ = write!(self.fields, "{}={:?} ", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, "{}={} ", field.name(), value);
        }
    }
}
