//! Structured anomaly reports and their fixed-width text rendering.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt::{self, Write as _};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Severity;
use crate::phase::context::PhaseContext;
use crate::phase::stack::PhaseStack;
use crate::phase::state::PhaseState;

/// Total width of a rendered report, borders included.
pub const REPORT_WIDTH: usize = 60;

/// Text columns between the borders.
const INNER_WIDTH: usize = REPORT_WIDTH - 4;

/// Captures listed per kind before the rest are summarised.
const MAX_LISTED_CAPTURES: usize = 8;

/// Stack frames listed before the rest are summarised.
const MAX_LISTED_FRAMES: usize = 32;

// ============================================================================
// Anomaly Kinds
// ============================================================================

/// Identity of an anomaly shape. Each kind has its own suppression rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// `complete_phase` on an empty stack
    EmptyStackCompletion,
    /// Completed state differs from the one on top
    IncorrectCompletion,
    /// Captures left over after processing
    UnprocessedObjects,
    /// Non-reentrant state activated while already on the stack
    RunawayPhase,
    /// Processing depth ceiling exceeded
    MaxDepthExceeded,
    /// State pushed under a parent that does not accept it
    IllegalNesting,
    /// Switch or completion from a foreign thread
    AsyncTrackerAccess,
    /// Block change from a foreign thread
    AsyncBlockChange,
    /// Entity spawn from a foreign thread
    AsyncEntitySpawn,
    /// Host failure while applying block changes
    BlockCaptureException,
    /// Host failure while spawning entities
    EntitySpawnException,
    /// Panic while processing a phase
    PhaseException,
    /// Phases still open at the end of a tick
    PhasesNotCompleted,
    /// Block change performed outside any capture
    UntrackedBlockChange,
    /// Neighbor notification sent without a source block
    NullNotificationSource,
    /// Failure caught by host code and handed to the tracker
    CaughtException,
}

impl AnomalyKind {
    /// Stable snake-case name used in logs and metrics labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyStackCompletion => "empty_stack_completion",
            Self::IncorrectCompletion => "incorrect_completion",
            Self::UnprocessedObjects => "unprocessed_objects",
            Self::RunawayPhase => "runaway_phase",
            Self::MaxDepthExceeded => "max_depth_exceeded",
            Self::IllegalNesting => "illegal_nesting",
            Self::AsyncTrackerAccess => "async_tracker_access",
            Self::AsyncBlockChange => "async_block_change",
            Self::AsyncEntitySpawn => "async_entity_spawn",
            Self::BlockCaptureException => "block_capture_exception",
            Self::EntitySpawnException => "entity_spawn_exception",
            Self::PhaseException => "phase_exception",
            Self::PhasesNotCompleted => "phases_not_completed",
            Self::UntrackedBlockChange => "untracked_block_change",
            Self::NullNotificationSource => "null_notification_source",
            Self::CaughtException => "caught_exception",
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Report
// ============================================================================

/// One rendered anomaly report, as handed to a diagnostic sink.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Anomaly identity
    pub kind: AnomalyKind,
    /// Severity the sink should log at
    pub severity: Severity,
    /// Headline
    pub title: String,
    /// Phase the anomaly is attributed to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<PhaseState>,
    /// Fixed-width rendered body
    pub body: String,
    /// Stack trace, when backtraces are enabled for the process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backtrace: Option<String>,
    /// When the report was produced
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.body)?;
        if let Some(trace) = &self.backtrace {
            write!(f, "\nStack trace:\n{trace}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Renders a bordered, [`REPORT_WIDTH`]-column report.
///
/// ```text
/// /==========================================================\
/// |               Completing incorrect phase!                |
/// |----------------------------------------------------------|
/// | The phase being completed is not the phase on top of     |
/// ...
/// \==========================================================/
/// ```
#[derive(Debug)]
pub struct ReportBuilder {
    title: String,
    lines: Vec<String>,
    backtrace: Option<String>,
}

impl ReportBuilder {
    /// Starts a report with a centred title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        let mut builder = Self {
            lines: Vec::new(),
            backtrace: None,
            title: title.clone(),
        };
        for line in wrap(&title, INNER_WIDTH) {
            builder.lines.push(format!("{line:^INNER_WIDTH$}"));
        }
        builder.hr()
    }

    /// Adds a horizontal rule.
    #[must_use]
    pub fn hr(mut self) -> Self {
        self.lines.push("-".repeat(INNER_WIDTH));
        self
    }

    /// Adds a word-wrapped paragraph.
    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.lines.extend(wrap(text, INNER_WIDTH));
        self
    }

    /// Adds an empty line.
    #[must_use]
    pub fn blank(mut self) -> Self {
        self.lines.push(String::new());
        self
    }

    /// Adds a wrapped `key: value` line.
    #[must_use]
    pub fn kv(mut self, key: &str, value: impl fmt::Display) -> Self {
        let first = format!("{key}: {value}");
        self.lines.extend(wrap(&first, INNER_WIDTH));
        self
    }

    /// Lists the stack top to bottom with each frame's context.
    #[must_use]
    pub fn phase_stack(mut self, stack: &PhaseStack) -> Self {
        if stack.is_empty() {
            return self.text("Phase stack: (empty)");
        }
        self.lines.push("Phase stack (innermost first):".to_string());
        for frame in stack.iter().take(MAX_LISTED_FRAMES) {
            self = self.frame(frame);
        }
        if stack.len() > MAX_LISTED_FRAMES {
            let more = stack.len() - MAX_LISTED_FRAMES;
            self.lines.push(format!("  ... {more} more frame(s)"));
        }
        self
    }

    /// Describes one phase activation and its captures.
    #[must_use]
    pub fn frame(mut self, context: &PhaseContext) -> Self {
        self.lines.push(format!("  - Phase: {}", context.state()));
        self.lines.push("    Context:".to_string());
        let mut details = Vec::new();
        if let Some(source) = context.source() {
            details.push(format!("source: {source}"));
        }
        details.push(format!("depth: {}", context.depth()));
        if context.is_halted() {
            details.push("halted by depth guard".to_string());
        }
        details.extend(list("block", context.captured_blocks()));
        details.extend(list("entity", context.captured_entities()));
        for detail in details {
            self.lines.extend(wrap(&format!("      {detail}"), INNER_WIDTH));
        }
        self
    }

    /// Attaches a backtrace of the current thread when the process has
    /// backtraces enabled (`RUST_BACKTRACE`).
    #[must_use]
    pub fn capture_backtrace(mut self) -> Self {
        let trace = Backtrace::capture();
        if trace.status() == BacktraceStatus::Captured {
            self.backtrace = Some(trace.to_string());
        }
        self
    }

    /// Attaches an already-rendered trace or panic payload.
    #[must_use]
    pub fn trace(mut self, trace: impl Into<String>) -> Self {
        self.backtrace = Some(trace.into());
        self
    }

    /// Finishes the report. A version block is always appended.
    #[must_use]
    pub fn build(self, kind: AnomalyKind, severity: Severity, phase: Option<PhaseState>) -> Report {
        let Self {
            title,
            mut lines,
            backtrace,
        } = self;
        lines.push("-".repeat(INNER_WIDTH));
        lines.push(format!(
            "{} version: {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        ));

        let border = "=".repeat(REPORT_WIDTH - 2);
        let mut body = String::with_capacity((lines.len() + 2) * (REPORT_WIDTH + 1));
        let _ = writeln!(body, "/{border}\\");
        for line in &lines {
            let _ = writeln!(body, "| {line:<INNER_WIDTH$} |");
        }
        let _ = write!(body, "\\{border}/");

        Report {
            kind,
            severity,
            title,
            phase,
            body,
            backtrace,
            timestamp: Utc::now(),
        }
    }
}

fn list<T: fmt::Display>(label: &str, items: &[T]) -> Vec<String> {
    let mut out: Vec<String> = items
        .iter()
        .take(MAX_LISTED_CAPTURES)
        .map(|item| format!("{label}: {item}"))
        .collect();
    if items.len() > MAX_LISTED_CAPTURES {
        out.push(format!(
            "... {} more {label}(s)",
            items.len() - MAX_LISTED_CAPTURES
        ));
    }
    out
}

/// Greedy word wrap, measured in chars. Words longer than `width` are split.
/// Leading indentation of `text` is repeated on continuation lines.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let body = text.trim_start();
    let indent = &text[..text.len() - body.len()];
    let indent_width = indent.chars().count();
    let mut lines = Vec::new();
    let mut current = indent.to_string();
    let mut current_width = indent_width;

    for word in body.split_whitespace() {
        let mut word = word;
        loop {
            let word_width = word.chars().count();
            let sep = usize::from(current_width > indent_width);
            if current_width + sep + word_width <= width {
                if sep == 1 {
                    current.push(' ');
                }
                current.push_str(word);
                current_width += sep + word_width;
                break;
            }
            if current_width > indent_width {
                lines.push(std::mem::replace(&mut current, indent.to_string()));
                current_width = indent_width;
                continue;
            }
            let room = width.saturating_sub(indent_width).max(1);
            let split = word
                .char_indices()
                .nth(room)
                .map_or(word.len(), |(i, _)| i);
            current.push_str(&word[..split]);
            lines.push(std::mem::replace(&mut current, indent.to_string()));
            current_width = indent_width;
            word = &word[split..];
            if word.is_empty() {
                break;
            }
        }
    }
    if current_width > indent_width || lines.is_empty() {
        lines.push(current);
    }
    lines
}
