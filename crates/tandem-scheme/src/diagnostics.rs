//! Per-window and per-iteration diagnostics.
//!
//! Only the primary rank writes records. Sinks are plain observers: a
//! failing sink is logged and otherwise ignored.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One row per completed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub window: u32,
    pub total_iterations: u32,
    pub iterations: u32,
    /// Converged before reaching the iteration limit.
    pub converged: bool,
    pub active_columns: usize,
    pub deleted_columns: usize,
    pub dropped_columns: usize,
}

/// One row per convergence check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub window: u32,
    pub iteration: u32,
    /// `(Res<abbrev>(<data>), residual)` for every logging measure.
    pub residuals: Vec<(String, f64)>,
}

/// Receiver of diagnostics rows.
pub trait DiagnosticsSink: Send {
    fn window_record(&mut self, record: &WindowRecord);

    fn iteration_record(&mut self, record: &IterationRecord);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn window_record(&mut self, _record: &WindowRecord) {}

    fn iteration_record(&mut self, _record: &IterationRecord) {}
}

#[derive(Debug, Default)]
struct Recorded {
    windows: Vec<WindowRecord>,
    iterations: Vec<IterationRecord>,
}

/// Keeps records in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Recorded>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn windows(&self) -> Vec<WindowRecord> {
        match self.inner.lock() {
            Ok(recorded) => recorded.windows.clone(),
            Err(poisoned) => poisoned.into_inner().windows.clone(),
        }
    }

    pub fn iterations(&self) -> Vec<IterationRecord> {
        match self.inner.lock() {
            Ok(recorded) => recorded.iterations.clone(),
            Err(poisoned) => poisoned.into_inner().iterations.clone(),
        }
    }

    fn with<F: FnOnce(&mut Recorded)>(&self, f: F) {
        match self.inner.lock() {
            Ok(mut recorded) => f(&mut recorded),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl DiagnosticsSink for MemorySink {
    fn window_record(&mut self, record: &WindowRecord) {
        self.with(|recorded| recorded.windows.push(record.clone()));
    }

    fn iteration_record(&mut self, record: &IterationRecord) {
        self.with(|recorded| recorded.iterations.push(record.clone()));
    }
}

/// A tagged line of a JSON lines diagnostics file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DiagnosticsLine {
    Window(WindowRecord),
    Iteration(IterationRecord),
}

/// Writes one JSON object per record.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn try_write_line(&mut self, line: &DiagnosticsLine) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, line)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    fn write_line(&mut self, line: &DiagnosticsLine) {
        if let Err(error) = self.try_write_line(line) {
            warn!(%error, "Failed to write diagnostics line");
        }
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Create (or truncate) a diagnostics file at `path`.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write + Send> DiagnosticsSink for JsonLinesSink<W> {
    fn window_record(&mut self, record: &WindowRecord) {
        self.write_line(&DiagnosticsLine::Window(record.clone()));
    }

    fn iteration_record(&mut self, record: &IterationRecord) {
        self.write_line(&DiagnosticsLine::Iteration(record.clone()));
    }
}
