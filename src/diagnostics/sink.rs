//! Destinations for anomaly reports.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Severity;

use super::report::{AnomalyKind, Report};

/// Receives rendered reports. The tracker never writes to a terminal itself.
pub trait DiagnosticSink: Send + Sync {
    /// Handles one report. Must not panic.
    fn report(&self, report: &Report);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Arc<S> {
    fn report(&self, report: &Report) {
        (**self).report(report);
    }
}

/// Logs each report as one `tracing` event at its severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, report: &Report) {
        let phase = report.phase.map_or("none", |p| p.name());
        match report.severity {
            Severity::Error => tracing::error!(
                anomaly = report.kind.as_str(),
                phase,
                "{report}"
            ),
            Severity::Warning => tracing::warn!(
                anomaly = report.kind.as_str(),
                phase,
                "{report}"
            ),
        }
    }
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Mutex<Vec<Report>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every report received so far.
    #[must_use]
    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of reports of `kind`.
    #[must_use]
    pub fn count(&self, kind: AnomalyKind) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Total number of reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns whether nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, report: &Report) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report.clone());
    }
}

/// Forwards each report to several sinks in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn DiagnosticSink>>,
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl FanoutSink {
    /// Creates an empty fan-out.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a destination.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl DiagnosticSink for FanoutSink {
    fn report(&self, report: &Report) {
        for sink in &self.sinks {
            sink.report(report);
        }
    }
}
