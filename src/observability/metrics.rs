//! Metrics for phase tracking.
//!
//! Recorded through the `metrics` facade. No recorder or exporter is
//! installed here; every call is a no-op until the host installs one.
//! Label values come from closed enums, so cardinality is fixed.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};

use crate::diagnostics::report::AnomalyKind;
use crate::phase::state::PhaseState;

/// Guard so descriptions are registered once per process.
static METRICS_DESCRIBED: AtomicBool = AtomicBool::new(false);

/// Registers metric descriptions with whatever recorder is installed.
///
/// Call after installing a recorder. Repeated calls are ignored.
pub fn describe_metrics() {
    if METRICS_DESCRIBED.swap(true, Ordering::SeqCst) {
        return;
    }
    describe_counter!(
        "phase_tracker_phases_entered_total",
        "Phase activations pushed onto the stack"
    );
    describe_counter!(
        "phase_tracker_anomalies_total",
        "Anomaly reports emitted, by kind"
    );
    describe_counter!(
        "phase_tracker_async_spawns_total",
        "Off-thread entity spawns, by outcome"
    );
    describe_gauge!("phase_tracker_stack_depth", "Current phase stack depth");
}

/// Outcome of an off-thread entity spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncSpawnOutcome {
    /// Queued for replay
    Queued,
    /// Dropped by configuration
    Dropped,
    /// Replayed on the engine thread
    Replayed,
}

impl AsyncSpawnOutcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Dropped => "dropped",
            Self::Replayed => "replayed",
        }
    }
}

/// Records a phase activation.
pub fn record_phase_entered(state: PhaseState) {
    counter!("phase_tracker_phases_entered_total", "state" => state.name()).increment(1);
}

/// Records an emitted anomaly report.
pub fn record_anomaly(kind: AnomalyKind) {
    counter!("phase_tracker_anomalies_total", "kind" => kind.as_str()).increment(1);
}

/// Records an off-thread spawn.
pub fn record_async_spawn(outcome: AsyncSpawnOutcome, count: u64) {
    counter!("phase_tracker_async_spawns_total", "outcome" => outcome.label()).increment(count);
}

/// Sets the stack depth gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_stack_depth(depth: usize) {
    gauge!("phase_tracker_stack_depth").set(depth as f64);
}
