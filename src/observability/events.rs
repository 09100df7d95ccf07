//! Structured event stream.
//!
//! Discrete, typed events emitted while a scenario drives the tracker.
//! Events are serialized as newline-delimited JSON (JSONL) and include a
//! monotonically increasing sequence number for ordering guarantees.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diagnostics::report::{AnomalyKind, Report};
use crate::diagnostics::sink::DiagnosticSink;
use crate::error::Severity;
use crate::phase::event::WorldEvent;
use crate::phase::state::PhaseState;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during a tracker run.
///
/// Each variant is tagged with `"type"` when serialized to JSON so consumers
/// can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A scenario started.
    ScenarioStarted {
        /// When the run started.
        timestamp: DateTime<Utc>,
        /// Scenario name.
        name: String,
        /// Number of steps in the script.
        steps: usize,
    },

    /// A scenario step finished.
    StepExecuted {
        /// When the step finished.
        timestamp: DateTime<Utc>,
        /// Zero-based step index.
        index: usize,
        /// Short description of the step.
        step: String,
        /// Phase on top of the stack afterwards.
        current_state: PhaseState,
        /// Stack depth afterwards.
        stack_depth: usize,
    },

    /// The tracker posted an event to the host.
    WorldEventPosted {
        /// When the event was posted.
        timestamp: DateTime<Utc>,
        /// The posted event, after listeners ran.
        event: WorldEvent,
    },

    /// An anomaly report reached the sink.
    AnomalyReported {
        /// When the report was produced.
        timestamp: DateTime<Utc>,
        /// Anomaly kind.
        kind: AnomalyKind,
        /// Report severity.
        severity: Severity,
        /// Attributed phase.
        phase: Option<PhaseState>,
        /// Report headline.
        title: String,
    },

    /// A scenario finished.
    ScenarioFinished {
        /// When the run finished.
        timestamp: DateTime<Utc>,
        /// Scenario name.
        name: String,
        /// Events posted to the host.
        events_posted: usize,
        /// Anomaly reports emitted.
        anomalies: usize,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) atomically increments the sequence
/// counter, serializes the event as a single JSON line, and flushes the
/// underlying writer. Serialization or I/O failures are dropped.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

// Box<dyn Write> is not Debug.
impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

impl DiagnosticSink for EventEmitter {
    fn report(&self, report: &Report) {
        self.emit(Event::AnomalyReported {
            timestamp: report.timestamp,
            kind: report.kind,
            severity: report.severity,
            phase: report.phase,
            title: report.title.clone(),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
