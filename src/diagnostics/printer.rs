//! Anomaly reporting with per-kind suppression.
//!
//! Every anomaly kind has its own identity key and its own "already
//! reported" record. Unless `verbose` is set, a report whose identity was
//! already seen is dropped. The keys are phase states or pairs of phase
//! states, so the records are bounded by the size of the state catalog.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::schema::PhaseTrackerSettings;
use crate::error::{HostError, Severity};
use crate::observability::metrics;
use crate::phase::context::{
    BlockChange, CapturedEntity, NotifierOrigin, NullSourceNotification, PhaseContext,
};
use crate::phase::stack::PhaseStack;
use crate::phase::state::PhaseState;
use crate::phase::unwind::PanicTrace;

use super::report::{AnomalyKind, Report, ReportBuilder};
use super::sink::DiagnosticSink;

const ASYNC_BLOCK_CHANGE_MESSAGE: &str = "Block changes must happen on the engine thread so \
    that every change can be attributed to the phase that caused it. The change was refused \
    and should be reported to whoever scheduled it off-thread.";

const ASYNC_TRACKER_ACCESS_MESSAGE: &str = "The phase tracker is confined to the engine thread. \
    Entering or completing a phase from any other thread would corrupt the causal record of \
    world changes, so the call was refused.";

/// Renders anomaly reports and suppresses repeats.
pub struct PhasePrinter {
    sink: Arc<dyn DiagnosticSink>,
    printed_empty_once: bool,
    completed_incorrect: HashSet<(PhaseState, PhaseState)>,
    runaway_printed: usize,
    max_depth_states: HashSet<PhaseState>,
    illegal_nesting: HashSet<(PhaseState, PhaseState)>,
    block_exception_states: HashSet<PhaseState>,
    entity_exception_states: HashSet<PhaseState>,
    phase_exception_states: HashSet<PhaseState>,
    printed_async_block: bool,
    printed_async_entities: Arc<AtomicBool>,
}

impl std::fmt::Debug for PhasePrinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhasePrinter")
            .field("printed_empty_once", &self.printed_empty_once)
            .field("completed_incorrect", &self.completed_incorrect.len())
            .field("runaway_printed", &self.runaway_printed)
            .finish_non_exhaustive()
    }
}

impl PhasePrinter {
    /// Creates a printer writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            sink,
            printed_empty_once: false,
            completed_incorrect: HashSet::new(),
            runaway_printed: 0,
            max_depth_states: HashSet::new(),
            illegal_nesting: HashSet::new(),
            block_exception_states: HashSet::new(),
            entity_exception_states: HashSet::new(),
            phase_exception_states: HashSet::new(),
            printed_async_block: false,
            printed_async_entities: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The sink reports are written to.
    #[must_use]
    pub fn sink(&self) -> &Arc<dyn DiagnosticSink> {
        &self.sink
    }

    fn emit(&self, report: &Report) {
        metrics::record_anomaly(report.kind);
        self.sink.report(report);
    }

    // ========================================================================
    // Stack protocol
    // ========================================================================

    /// `complete_phase` was called with nothing on the stack. Reported once
    /// per printer unless verbose.
    pub fn empty_stack_completion(&mut self, settings: &PhaseTrackerSettings, expected: PhaseState) -> bool {
        if self.printed_empty_once {
            return false;
        }
        let report = ReportBuilder::new("Unexpectedly Completing An Empty Stack")
            .text(
                "The tracker was told to complete a phase without any phase having been \
                 entered. Something completed a phase twice or never entered it.",
            )
            .hr()
            .kv("Phase being completed", expected)
            .capture_backtrace()
            .build(AnomalyKind::EmptyStackCompletion, Severity::Error, Some(expected));
        self.emit(&report);
        if !settings.verbose {
            self.printed_empty_once = true;
        }
        true
    }

    /// The completed state differs from the one on top. Reported once per
    /// (expected, actual) pair unless verbose.
    pub fn incorrect_completion(
        &mut self,
        settings: &PhaseTrackerSettings,
        stack: &PhaseStack,
        expected: PhaseState,
        actual: PhaseState,
    ) -> bool {
        if !settings.verbose && self.completed_incorrect.contains(&(expected, actual)) {
            return false;
        }
        let report = ReportBuilder::new("Completing incorrect phase")
            .text(
                "The phase being completed is not the phase on top of the stack. The phase \
                 on top is completed instead so the engine can continue.",
            )
            .hr()
            .kv("Expected to exit phase", expected)
            .kv("But instead found phase", actual)
            .blank()
            .phase_stack(stack)
            .capture_backtrace()
            .build(AnomalyKind::IncorrectCompletion, Severity::Error, Some(actual));
        self.emit(&report);
        if !settings.verbose {
            self.completed_incorrect.insert((expected, actual));
        }
        true
    }

    /// Captures remained after processing. Always reported.
    pub fn unprocessed_objects(&self, stack: &PhaseStack, context: &PhaseContext) {
        let report = ReportBuilder::new("Failed to process all PhaseContext captured!")
            .text(
                "During the processing of a phase, certain objects were captured in a \
                 PhaseContext. All of them should have been removed by this point.",
            )
            .hr()
            .frame(context)
            .blank()
            .phase_stack(stack)
            .build(
                AnomalyKind::UnprocessedObjects,
                Severity::Error,
                Some(context.state()),
            );
        self.emit(&report);
    }

    fn runaway_allowed(&self, settings: &PhaseTrackerSettings) -> bool {
        settings.verbose || self.runaway_printed < settings.max_runaway_phase_count
    }

    /// A non-reentrant state was entered while already on the stack.
    ///
    /// Switch and completion runaway reports share one counter; once
    /// `max_runaway_phase_count` reports were printed the rest are muted
    /// unless verbose.
    pub fn runaway_switch(
        &mut self,
        settings: &PhaseTrackerSettings,
        stack: &PhaseStack,
        context: &PhaseContext,
    ) -> bool {
        if !self.runaway_allowed(settings) {
            return false;
        }
        let report = ReportBuilder::new("Switching Phase")
            .text("Detecting a runaway phase! Something is entering a phase without completing it.")
            .kv("Entering state", context.state())
            .frame(context)
            .blank()
            .phase_stack(stack)
            .capture_backtrace()
            .build(AnomalyKind::RunawayPhase, Severity::Error, Some(context.state()));
        self.emit(&report);
        self.runaway_printed += 1;
        true
    }

    /// A non-reentrant state was completed while another activation of it is
    /// still below on the stack.
    pub fn runaway_completion(
        &mut self,
        settings: &PhaseTrackerSettings,
        stack: &PhaseStack,
        state: PhaseState,
    ) -> bool {
        if !self.runaway_allowed(settings) {
            return false;
        }
        let report = ReportBuilder::new("Completing Phase")
            .text(
                "Detecting a runaway phase! Something is entering a phase without completing \
                 it. Reports stop once the configured runaway count is reached.",
            )
            .kv("Completing phase", state)
            .blank()
            .phase_stack(stack)
            .capture_backtrace()
            .build(AnomalyKind::RunawayPhase, Severity::Error, Some(state));
        self.emit(&report);
        self.runaway_printed += 1;
        true
    }

    /// Recursive processing went past the depth ceiling. Reported once per
    /// state unless verbose.
    pub fn max_depth_exceeded(
        &mut self,
        settings: &PhaseTrackerSettings,
        context: &PhaseContext,
        depth: usize,
        max_depth: usize,
    ) -> bool {
        let state = context.state();
        if !settings.verbose && self.max_depth_states.contains(&state) {
            return false;
        }
        let report = ReportBuilder::new("Maximum block processing depth exceeded!")
            .text(&format!(
                "Still trying to process captured work after {depth} iterations of \
                 depth-first processing. This is likely due to a mod or plugin doing \
                 something unusual. Processing below this depth is abandoned."
            ))
            .hr()
            .kv("State", state)
            .kv("Maximum depth", max_depth)
            .frame(context)
            .build(AnomalyKind::MaxDepthExceeded, Severity::Error, Some(state));
        self.emit(&report);
        if !settings.verbose {
            self.max_depth_states.insert(state);
        }
        true
    }

    /// A state was pushed under a parent that does not accept it. Reported
    /// once per (parent, child) pair unless verbose.
    pub fn illegal_nesting(
        &mut self,
        settings: &PhaseTrackerSettings,
        stack: &PhaseStack,
        parent: PhaseState,
        child: PhaseState,
    ) -> bool {
        if !settings.verbose && self.illegal_nesting.contains(&(parent, child)) {
            return false;
        }
        let report = ReportBuilder::new("Illegal Phase Nesting")
            .text("A phase was entered on top of a phase that does not allow it. Tracking continues best-effort.")
            .hr()
            .kv("Parent", parent)
            .kv("Entering", child)
            .blank()
            .phase_stack(stack)
            .capture_backtrace()
            .build(AnomalyKind::IllegalNesting, Severity::Warning, Some(child));
        self.emit(&report);
        if !settings.verbose {
            self.illegal_nesting.insert((parent, child));
        }
        true
    }

    /// Phases were left open at the end of a tick. Always reported.
    pub fn phases_not_completed(&self, stack: &PhaseStack) {
        let report = ReportBuilder::new("Phases Not Completed")
            .text(
                "One or more phases were started but were not properly completed by the end \
                 of the tick. They will be automatically closed.",
            )
            .hr()
            .phase_stack(stack)
            .build(
                AnomalyKind::PhasesNotCompleted,
                Severity::Error,
                stack.peek().map(PhaseContext::state),
            );
        self.emit(&report);
    }

    // ========================================================================
    // Thread confinement
    // ========================================================================

    /// `switch_to` or `complete_phase` was called off the engine thread.
    /// Always reported.
    pub fn async_tracker_access(
        &self,
        stack: &PhaseStack,
        state: PhaseState,
        operation: &str,
        thread: &str,
    ) {
        let report = ReportBuilder::new("Async Phase Tracker Access")
            .text(ASYNC_TRACKER_ACCESS_MESSAGE)
            .hr()
            .kv("Phase", state)
            .kv("Operation", operation)
            .kv("Thread", thread)
            .blank()
            .phase_stack(stack)
            .capture_backtrace()
            .build(AnomalyKind::AsyncTrackerAccess, Severity::Error, Some(state));
        self.emit(&report);
    }

    /// A block change was attempted off the engine thread and refused.
    ///
    /// The first one is always reported; later ones only with
    /// `verbose_errors` or `verbose`.
    pub fn async_block_change(
        &mut self,
        settings: &PhaseTrackerSettings,
        change: &BlockChange,
        thread: &str,
    ) -> bool {
        if self.printed_async_block && !settings.verbose && !settings.verbose_errors {
            return false;
        }
        let report = ReportBuilder::new("Illegal Async Block Change")
            .text(ASYNC_BLOCK_CHANGE_MESSAGE)
            .blank()
            .kv("Thread", thread)
            .kv("Block Pos", change.pos)
            .kv("BlockState", &change.replacement)
            .blank()
            .text("The change was not applied.")
            .capture_backtrace()
            .build(AnomalyKind::AsyncBlockChange, Severity::Error, None);
        self.emit(&report);
        self.printed_async_block = true;
        true
    }

    /// An entity spawn was attempted off the engine thread.
    ///
    /// Only reported when `verbose`; printed once unless `verbose_errors`.
    /// The "printed once" record is shared with every
    /// [`AsyncSpawner`](crate::phase::AsyncSpawner) of the same tracker.
    pub fn async_entity_spawn(
        &self,
        settings: &PhaseTrackerSettings,
        entity: &CapturedEntity,
        queued: bool,
    ) -> bool {
        report_async_entity_spawn(
            self.sink.as_ref(),
            &self.printed_async_entities,
            settings,
            entity,
            queued,
        )
    }

    pub(crate) fn async_entity_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.printed_async_entities)
    }

    // ========================================================================
    // Failures during processing
    // ========================================================================

    /// The host failed to apply a captured block change. Reported once per
    /// state unless verbose.
    pub fn block_tracking_exception(
        &mut self,
        settings: &PhaseTrackerSettings,
        stack: &PhaseStack,
        context: &PhaseContext,
        error: &HostError,
    ) -> bool {
        let state = context.state();
        if !settings.verbose && self.block_exception_states.contains(&state) {
            return false;
        }
        let report = ReportBuilder::new("Exception attempting to capture a block change!")
            .kv("Error", error)
            .frame(context)
            .blank()
            .phase_stack(stack)
            .capture_backtrace()
            .build(AnomalyKind::BlockCaptureException, Severity::Error, Some(state));
        self.emit(&report);
        if !settings.verbose {
            self.block_exception_states.insert(state);
        }
        true
    }

    /// The host failed to spawn a captured entity. Reported once per state
    /// unless verbose.
    pub fn entity_spawn_exception(
        &mut self,
        settings: &PhaseTrackerSettings,
        stack: &PhaseStack,
        context: &PhaseContext,
        error: &HostError,
    ) -> bool {
        let state = context.state();
        if !settings.verbose && self.entity_exception_states.contains(&state) {
            return false;
        }
        let report = ReportBuilder::new("Exception attempting to capture or spawn an Entity!")
            .kv("Error", error)
            .frame(context)
            .blank()
            .phase_stack(stack)
            .capture_backtrace()
            .build(AnomalyKind::EntitySpawnException, Severity::Error, Some(state));
        self.emit(&report);
        if !settings.verbose {
            self.entity_exception_states.insert(state);
        }
        true
    }

    /// Processing a phase panicked. Reported once per state unless verbose,
    /// with the trace recorded where the panic was raised.
    pub fn phase_exception(
        &mut self,
        settings: &PhaseTrackerSettings,
        stack: &PhaseStack,
        context: &PhaseContext,
        failure: &PanicTrace,
    ) -> bool {
        let state = context.state();
        if !settings.verbose && self.phase_exception_states.contains(&state) {
            return false;
        }
        let report = ReportBuilder::new("Exception occurred during a PhaseState")
            .text(
                "The tracker makes a best effort not to fail, but a failure escaped while \
                 processing a phase. The phase was unwound and the engine continues.",
            )
            .hr()
            .kv("The PhaseState having an exception", state)
            .kv("Panic", &failure.message)
            .kv("At", failure.location.as_deref().unwrap_or("unknown"))
            .text("The PhaseContext:")
            .frame(context)
            .blank()
            .phase_stack(stack);
        let report = match &failure.backtrace {
            Some(trace) => report.trace(trace.as_str()),
            None => report,
        }
        .build(AnomalyKind::PhaseException, Severity::Error, Some(state));
        self.emit(&report);
        if !settings.verbose {
            self.phase_exception_states.insert(state);
        }
        true
    }

    /// Host code caught a failure of its own and hands it over with the
    /// current phase attached. Always reported.
    ///
    /// The report reads `header`, then `subheader` followed by the phase,
    /// then the context and the remaining stack. `error` and its source
    /// chain are listed when given.
    pub fn caught_exception(
        &self,
        stack: &PhaseStack,
        header: &str,
        subheader: &str,
        context: &PhaseContext,
        error: Option<&(dyn std::error::Error + 'static)>,
    ) {
        let state = context.state();
        let mut report = ReportBuilder::new(header)
            .text(&format!("{subheader} {state}"))
            .text("PhaseContext:")
            .frame(context)
            .text("Phases remaining:")
            .phase_stack(stack);
        if let Some(error) = error {
            report = report.blank().kv("Error", error);
            let mut cause = error.source();
            while let Some(inner) = cause {
                report = report.kv("Caused by", inner);
                cause = inner.source();
            }
        }
        let report = report
            .capture_backtrace()
            .build(AnomalyKind::CaughtException, Severity::Error, Some(state));
        self.emit(&report);
    }

    /// A neighbor notification went out without a source block and the
    /// host substituted one. Always reported, at warning level.
    pub fn null_notification_source(&self, stack: &PhaseStack, notification: &NullSourceNotification) {
        let builder = match &notification.origin {
            NotifierOrigin::Block => ReportBuilder::new("Null Source Block from Unknown Source!").text(
                "A neighbor notification was sent with no source block. The source is \
                 unknown, so the block at the source position was used in its place to keep \
                 tracking intact. Report this to whoever owns the code at the source position.",
            ),
            NotifierOrigin::Tile { kind, .. } => ReportBuilder::new("Null Source Block on TileEntity!")
                .text(&format!(
                    "A tile entity sent a neighbor notification with no source block. The \
                     notification was repaired instead of being dropped. The offending tile \
                     is {kind}."
                )),
            NotifierOrigin::UnknownTile => ReportBuilder::new("Null Source Block on TileEntity!").text(
                "A tile entity sent a neighbor notification with no source block. The \
                 notification was repaired instead of being dropped. The offending tile is \
                 unknown.",
            ),
        };
        let builder = builder.blank().kv("Source position", notification.source_pos);
        let builder = match &notification.origin {
            NotifierOrigin::Block => builder,
            NotifierOrigin::Tile {
                kind,
                recovered_from_tile,
            } => builder
                .kv("Source TileEntity", kind)
                .kv("Recovered using TileEntity as Source", recovered_from_tile),
            NotifierOrigin::UnknownTile => builder
                .kv("Source TileEntity", "UNKNOWN")
                .kv("Recovered using TileEntity as Source", false),
        };
        let report = builder
            .kv("Source Block Recovered", &notification.recovered)
            .kv("Notified Position", notification.notified_pos)
            .blank()
            .phase_stack(stack)
            .capture_backtrace()
            .build(
                AnomalyKind::NullNotificationSource,
                Severity::Warning,
                stack.peek().map(PhaseContext::state),
            );
        self.emit(&report);
    }

    /// The host changed a block outside any capture. Reported only when
    /// verbose.
    pub fn untracked_block_change(
        &self,
        settings: &PhaseTrackerSettings,
        stack: &PhaseStack,
        change: &BlockChange,
    ) -> bool {
        if !settings.verbose {
            return false;
        }
        let report = ReportBuilder::new("Unexpected World Change Detected!")
            .text(
                "The tracker depends on knowing when a change to any world takes place, but \
                 a block changed without being captured by any phase.",
            )
            .blank()
            .kv("Position", change.pos)
            .kv("Current State", &change.original)
            .kv("New State", &change.replacement)
            .blank()
            .phase_stack(stack)
            .capture_backtrace()
            .build(
                AnomalyKind::UntrackedBlockChange,
                Severity::Warning,
                stack.peek().map(PhaseContext::state),
            );
        self.emit(&report);
        true
    }
}

/// Renders and emits the off-thread entity spawn warning.
///
/// Shared by the tracker's own capture hook and by
/// [`AsyncSpawner`](crate::phase::AsyncSpawner), which runs on other threads.
pub(crate) fn report_async_entity_spawn(
    sink: &dyn DiagnosticSink,
    printed: &AtomicBool,
    settings: &PhaseTrackerSettings,
    entity: &CapturedEntity,
    queued: bool,
) -> bool {
    if !settings.verbose || (!settings.verbose_errors && printed.load(Ordering::Acquire)) {
        return false;
    }
    let builder = ReportBuilder::new("Async Entity Spawn Warning")
        .text("An entity was attempting to spawn off the engine thread.")
        .blank();
    let builder = if queued {
        builder.text(
            "Delayed spawning is ENABLED. The entity was captured and will be spawned \
             on the engine thread at the next opportunity. Code expecting the entity to \
             exist immediately may misbehave.",
        )
    } else {
        builder.text(
            "Delayed spawning is DISABLED by configuration. The entity was dropped and \
             will not be spawned.",
        )
    };
    let report = builder
        .blank()
        .kv("Entity", entity)
        .capture_backtrace()
        .build(AnomalyKind::AsyncEntitySpawn, Severity::Warning, None);
    metrics::record_anomaly(report.kind);
    sink.report(&report);
    printed.store(true, Ordering::Release);
    true
}
