//! Diagnostics for phase tracking anomalies.
//!
//! Protocol violations never interrupt the engine. They are rendered into
//! fixed-width [`Report`]s by the [`PhasePrinter`], rate-limited per anomaly
//! identity, and handed to a [`DiagnosticSink`].

pub mod printer;
pub mod report;
pub mod sink;

pub use printer::PhasePrinter;
pub use report::{AnomalyKind, REPORT_WIDTH, Report, ReportBuilder};
pub use sink::{DiagnosticSink, FanoutSink, MemorySink, TracingSink};
