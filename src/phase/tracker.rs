//! The phase tracker.
//!
//! [`PhaseTracker`] owns the phase stack and is confined to the engine
//! thread it was created (or [bound](PhaseTracker::bind_engine_thread)) on.
//! The host calls [`switch_to`](PhaseTracker::switch_to) before a world
//! mutation, the capture hooks while it runs, and
//! [`complete_phase`](PhaseTracker::complete_phase) afterwards. Completion
//! drains the popped context through its state's processor.
//!
//! Protocol violations never fail the call. They are rendered by the
//! [`PhasePrinter`] and the tracker carries on. The only error returned is
//! [`PhaseError::OffThread`].

use std::sync::Arc;
use std::thread::{self, ThreadId};

use tokio::sync::mpsc;

use crate::capability::{CapabilityQuery, ConfigCapabilities};
use crate::config::handle::ConfigHandle;
use crate::diagnostics::printer::PhasePrinter;
use crate::diagnostics::sink::DiagnosticSink;
use crate::error::PhaseError;
use crate::observability::logging;
use crate::observability::metrics::{self, AsyncSpawnOutcome};

use super::async_spawn::AsyncSpawner;
use super::context::{BlockChange, CapturedEntity, Cause, NullSourceNotification, PhaseContext};
use super::host::EngineHost;
use super::process::{self, ProcessScope, processor_for};
use super::stack::PhaseStack;
use super::state::PhaseState;
use super::unwind;

/// What a capture hook did with a side effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Recorded in the active context; the host must not apply it now.
    Captured,
    /// Not tracked; the host applies it directly.
    Passthrough,
    /// Queued for replay on the engine thread.
    Queued,
    /// Refused; the mutation must not happen.
    Rejected,
}

impl CaptureOutcome {
    /// Returns `true` if the host should perform the mutation itself.
    #[must_use]
    pub const fn applies_directly(self) -> bool {
        matches!(self, Self::Passthrough)
    }
}

/// Single-writer coordinator for phase activations.
pub struct PhaseTracker<H: EngineHost> {
    stack: PhaseStack,
    printer: PhasePrinter,
    config: ConfigHandle,
    capabilities: Box<dyn CapabilityQuery>,
    host: H,
    engine_thread: ThreadId,
    async_tx: mpsc::UnboundedSender<CapturedEntity>,
    async_rx: mpsc::UnboundedReceiver<CapturedEntity>,
    idle: PhaseContext,
    draining: bool,
}

impl<H: EngineHost> std::fmt::Debug for PhaseTracker<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseTracker")
            .field("stack", &self.stack)
            .field("engine_thread", &self.engine_thread)
            .field("printer", &self.printer)
            .finish_non_exhaustive()
    }
}

impl<H: EngineHost> PhaseTracker<H> {
    /// Creates a tracker bound to the calling thread, with capability flags
    /// taken from `config`.
    #[must_use]
    pub fn new(host: H, config: ConfigHandle, sink: Arc<dyn DiagnosticSink>) -> Self {
        let capabilities = Box::new(ConfigCapabilities::from_config(config.config()));
        Self::with_capabilities(host, config, sink, capabilities)
    }

    /// Creates a tracker with an explicit capability source.
    #[must_use]
    pub fn with_capabilities(
        host: H,
        config: ConfigHandle,
        sink: Arc<dyn DiagnosticSink>,
        capabilities: Box<dyn CapabilityQuery>,
    ) -> Self {
        let (async_tx, async_rx) = mpsc::unbounded_channel();
        Self {
            stack: PhaseStack::new(),
            printer: PhasePrinter::new(sink),
            config,
            capabilities,
            host,
            engine_thread: thread::current().id(),
            async_tx,
            async_rx,
            idle: PhaseContext::new(PhaseState::Empty),
            draining: false,
        }
    }

    /// Makes the calling thread the engine thread.
    pub fn bind_engine_thread(&mut self) {
        self.engine_thread = thread::current().id();
        tracing::debug!(thread = %current_thread_label(), "bound engine thread");
    }

    /// The thread allowed to drive the tracker.
    #[must_use]
    pub const fn engine_thread(&self) -> ThreadId {
        self.engine_thread
    }

    /// Returns `true` on the engine thread.
    #[must_use]
    pub fn is_engine_thread(&self) -> bool {
        thread::current().id() == self.engine_thread
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// State on top of the stack, or [`PhaseState::Empty`].
    #[must_use]
    pub fn current_state(&self) -> PhaseState {
        self.phase_context().state()
    }

    /// Context on top of the stack, or an empty idle context.
    #[must_use]
    pub fn phase_context(&self) -> &PhaseContext {
        self.stack.peek().unwrap_or(&self.idle)
    }

    /// Mutable top context, if any phase is active.
    pub fn phase_context_mut(&mut self) -> Option<&mut PhaseContext> {
        self.stack.peek_mut()
    }

    /// The phase stack, for inspection.
    #[must_use]
    pub const fn stack(&self) -> &PhaseStack {
        &self.stack
    }

    #[must_use]
    pub const fn config(&self) -> &ConfigHandle {
        &self.config
    }

    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    pub const fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Consumes the tracker, returning the host.
    pub fn into_host(self) -> H {
        self.host
    }

    // ========================================================================
    // Stack protocol
    // ========================================================================

    /// Pushes `context` as the active phase.
    ///
    /// Nesting, runaway and depth violations are reported and the push goes
    /// ahead anyway. A context past the depth ceiling (or under a halted
    /// parent) is pushed halted: it captures nothing and processes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseError::OffThread`] if the state requires the engine
    /// thread and the caller is elsewhere. Nothing is pushed.
    pub fn switch_to(&mut self, mut context: PhaseContext) -> Result<(), PhaseError> {
        let state = context.state();
        self.ensure_engine_thread(state, "entered")?;

        let settings = self.config.settings();
        if let Some(parent) = self.stack.peek() {
            let parent_state = parent.state();
            if !parent_state.policy().accepts_child(state) {
                self.printer
                    .illegal_nesting(settings, &self.stack, parent_state, state);
            }
        }
        if self.stack.check_for_runaways(state) {
            self.printer.runaway_switch(settings, &self.stack, &context);
        }

        let depth = self.stack.activations(state) + 1;
        context.open(depth);
        let parent_halted = self.stack.peek().is_some_and(PhaseContext::is_halted);
        if parent_halted || self.check_max_depth(&context, depth) {
            context.halt();
        }

        metrics::record_phase_entered(state);
        self.stack.push(context);
        metrics::set_stack_depth(self.stack.len());
        tracing::trace!(state = %state, depth, stack = self.stack.len(), "switched phase");
        Ok(())
    }

    /// Pops the active phase and processes what it captured.
    ///
    /// Returns the closed context, or `None` if the stack was empty. A
    /// mismatch between `expected` and the actual top is reported and the
    /// actual top is completed regardless.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseError::OffThread`] if the top state requires the
    /// engine thread and the caller is elsewhere. Nothing is popped.
    pub fn complete_phase(&mut self, expected: PhaseState) -> Result<Option<PhaseContext>, PhaseError> {
        let Some(actual) = self.stack.peek().map(PhaseContext::state) else {
            self.printer
                .empty_stack_completion(self.config.settings(), expected);
            return Ok(None);
        };
        self.ensure_engine_thread(actual, "completed")?;

        if actual != expected {
            self.printer.incorrect_completion(
                self.config.settings(),
                &self.stack,
                expected,
                actual,
            );
        }

        let Some(mut context) = self.stack.pop() else {
            return Ok(None);
        };
        if self.stack.check_for_runaways(actual) {
            self.printer
                .runaway_completion(self.config.settings(), &self.stack, actual);
        }

        if !context.is_halted() {
            self.process(&mut context);
        }
        if context.has_captures() {
            self.printer.unprocessed_objects(&self.stack, &context);
            context.clear_captures();
        }

        context.close();
        metrics::set_stack_depth(self.stack.len());
        tracing::trace!(state = %actual, stack = self.stack.len(), "completed phase");

        if self.stack.is_empty() && !self.draining {
            self.drain_async_spawns();
        }
        Ok(Some(context))
    }

    /// Runs `f` inside `context`, completing the phase afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`PhaseError::OffThread`] from either end of the window.
    pub fn within<R>(
        &mut self,
        context: PhaseContext,
        f: impl FnOnce(&mut Self) -> R,
    ) -> Result<R, PhaseError> {
        let state = context.state();
        self.switch_to(context)?;
        let result = f(self);
        self.complete_phase(state)?;
        Ok(result)
    }

    fn process(&mut self, context: &mut PhaseContext) {
        let _span = logging::phase_span(context.state(), context.depth()).entered();
        let processor = processor_for(context.state().policy().processing);
        let outcome = {
            let mut scope = ProcessScope::new(
                &mut self.stack,
                &mut self.printer,
                &mut self.config,
                self.capabilities.as_ref(),
                &mut self.host,
            );
            unwind::catch_traced(|| processor.process(&mut scope, context))
        };
        if let Err(failure) = outcome {
            tracing::error!(
                state = %context.state(),
                message = %failure.message,
                location = failure.location.as_deref().unwrap_or("unknown"),
                "phase processing panicked"
            );
            self.printer
                .phase_exception(self.config.settings(), &self.stack, context, &failure);
            context.clear_captures();
        }
    }

    fn ensure_engine_thread(&self, state: PhaseState, operation: &'static str) -> Result<(), PhaseError> {
        if !state.policy().requires_engine_thread || self.is_engine_thread() {
            return Ok(());
        }
        let thread = current_thread_label();
        self.printer
            .async_tracker_access(&self.stack, state, operation, &thread);
        Err(PhaseError::OffThread {
            state,
            operation,
            thread,
        })
    }

    /// Depth guard for `context` at `depth`.
    pub fn check_max_depth(&mut self, context: &PhaseContext, depth: usize) -> bool {
        process::check_max_depth(&mut self.printer, &mut self.config, context, depth)
    }

    // ========================================================================
    // Capture hooks
    // ========================================================================

    /// Offers a block change to the active phase.
    ///
    /// Off-thread changes are reported and rejected. Changes are passed
    /// through when no phase is active, when the active state does not
    /// capture blocks, or when the replacement block opts out of bulk
    /// capture.
    pub fn capture_block_change(&mut self, change: BlockChange) -> CaptureOutcome {
        if !self.is_engine_thread() {
            let thread = current_thread_label();
            self.printer
                .async_block_change(self.config.settings(), &change, &thread);
            return CaptureOutcome::Rejected;
        }

        let flags = self.capabilities.block_flags(&change.replacement);
        let Some(top) = self.stack.peek_mut() else {
            return CaptureOutcome::Passthrough;
        };
        if top.is_halted() {
            return CaptureOutcome::Rejected;
        }
        if !top.state().policy().captures_blocks || !flags.block_bulk_capture {
            return CaptureOutcome::Passthrough;
        }
        top.capture_block_change(change);
        CaptureOutcome::Captured
    }

    /// Offers an entity spawn to the active phase.
    ///
    /// Off the engine thread the spawn is handed to the async queue (or
    /// dropped, per `capture_entities_async`). Otherwise it follows the same
    /// rules as [`capture_block_change`](Self::capture_block_change).
    pub fn capture_entity_spawn(&mut self, entity: CapturedEntity) -> CaptureOutcome {
        if !self.is_engine_thread() {
            return self.async_spawner().spawn(entity);
        }

        let flags = self.capabilities.entity_flags(&entity.kind);
        let Some(top) = self.stack.peek_mut() else {
            return CaptureOutcome::Passthrough;
        };
        if top.is_halted() {
            return CaptureOutcome::Rejected;
        }
        if !top.state().policy().captures_entities || !flags.entity_bulk_capture {
            return CaptureOutcome::Passthrough;
        }
        top.capture_entity(entity);
        CaptureOutcome::Captured
    }

    /// Reports a block change the host made outside any capture. Only
    /// printed when `verbose`.
    pub fn report_untracked_block_change(&mut self, change: &BlockChange) -> bool {
        self.printer
            .untracked_block_change(self.config.settings(), &self.stack, change)
    }

    /// Reports a neighbor notification the host sent without a source
    /// block. Always printed.
    pub fn report_null_notification_source(&self, notification: &NullSourceNotification) {
        self.printer.null_notification_source(&self.stack, notification);
    }

    /// Hands a failure the host caught itself to the diagnostic sink, with
    /// the active phase and stack attached.
    pub fn report_caught_exception(
        &self,
        header: &str,
        subheader: &str,
        error: Option<&(dyn std::error::Error + 'static)>,
    ) {
        self.printer
            .caught_exception(&self.stack, header, subheader, self.phase_context(), error);
    }

    // ========================================================================
    // Async hand-off and tick boundary
    // ========================================================================

    /// Handle for worker threads to submit entity spawns.
    #[must_use]
    pub fn async_spawner(&self) -> AsyncSpawner {
        AsyncSpawner::new(
            self.async_tx.clone(),
            self.config.settings().clone(),
            Arc::clone(self.printer.sink()),
            self.printer.async_entity_flag(),
        )
    }

    /// Replays queued off-thread spawns inside an
    /// [`AsyncSpawnReplay`](PhaseState::AsyncSpawnReplay) phase.
    ///
    /// Does nothing off the engine thread or while phases are active.
    /// Returns the number of entities replayed.
    pub fn drain_async_spawns(&mut self) -> usize {
        if self.draining || !self.stack.is_empty() || !self.is_engine_thread() {
            return 0;
        }
        let mut queued = Vec::new();
        while let Ok(entity) = self.async_rx.try_recv() {
            queued.push(entity);
        }
        if queued.is_empty() {
            return 0;
        }

        let count = queued.len();
        self.draining = true;
        let mut context = PhaseContext::new(PhaseState::AsyncSpawnReplay)
            .with_source(Cause::World("async spawn queue".to_owned()));
        for entity in queued {
            context.capture_entity(entity);
        }
        let replayed = self
            .switch_to(context)
            .and_then(|()| self.complete_phase(PhaseState::AsyncSpawnReplay));
        self.draining = false;

        if let Err(error) = replayed {
            tracing::warn!(%error, "async spawn replay failed");
            return 0;
        }
        metrics::record_async_spawn(AsyncSpawnOutcome::Replayed, count as u64);
        tracing::debug!(count, "replayed async entity spawns");
        count
    }

    /// Tick boundary check.
    ///
    /// A non-empty stack is reported and force-completed top-down. Queued
    /// async spawns are replayed afterwards. Returns the number of phases
    /// that had to be force-completed.
    pub fn end_tick(&mut self) -> usize {
        if self.stack.is_empty() {
            self.drain_async_spawns();
            return 0;
        }

        self.printer.phases_not_completed(&self.stack);
        let mut forced = 0;
        while let Some(state) = self.stack.peek().map(PhaseContext::state) {
            if let Err(error) = self.complete_phase(state) {
                tracing::warn!(%error, "could not force-complete phase");
                break;
            }
            forced += 1;
        }
        self.drain_async_spawns();
        forced
    }
}

fn current_thread_label() -> String {
    let current = thread::current();
    current
        .name()
        .map_or_else(|| format!("{:?}", current.id()), str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::AllowAll;
    use crate::diagnostics::report::AnomalyKind;
    use crate::diagnostics::sink::MemorySink;
    use crate::error::HostError;
    use crate::phase::context::{BlockPos, BlockState};
    use crate::phase::event::WorldEvent;

    #[derive(Default)]
    struct RecordingHost {
        applied: Vec<BlockChange>,
        spawned: Vec<CapturedEntity>,
        events: usize,
        panic_on_apply: bool,
    }

    impl EngineHost for RecordingHost {
        fn post_event(&mut self, _event: &mut WorldEvent) {
            self.events += 1;
        }

        fn apply_block_change(&mut self, change: &BlockChange) -> Result<Vec<BlockChange>, HostError> {
            assert!(!self.panic_on_apply, "host blew up");
            self.applied.push(change.clone());
            Ok(Vec::new())
        }

        fn spawn_entity(&mut self, entity: &CapturedEntity) -> Result<(), HostError> {
            self.spawned.push(entity.clone());
            Ok(())
        }
    }

    fn tracker() -> (PhaseTracker<RecordingHost>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let tracker = PhaseTracker::with_capabilities(
            RecordingHost::default(),
            ConfigHandle::default(),
            sink.clone(),
            Box::new(AllowAll),
        );
        (tracker, sink)
    }

    fn stone() -> BlockChange {
        BlockChange::new(
            BlockPos::new(1, 64, 1),
            BlockState::air(),
            BlockState::new("minecraft:stone"),
        )
    }

    #[test]
    fn test_idle_tracker_is_empty() {
        let (tracker, _) = tracker();
        assert_eq!(tracker.current_state(), PhaseState::Empty);
        assert!(!tracker.phase_context().is_open());
        assert!(tracker.stack().is_empty());
    }

    #[test]
    fn test_switch_capture_complete() {
        let (mut tracker, sink) = tracker();
        tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
        assert_eq!(tracker.current_state(), PhaseState::TickBlock);
        assert_eq!(tracker.capture_block_change(stone()), CaptureOutcome::Captured);

        let closed = tracker.complete_phase(PhaseState::TickBlock).unwrap().unwrap();
        assert!(!closed.is_open());
        assert_eq!(tracker.host().applied, vec![stone()]);
        assert_eq!(tracker.host().events, 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_capture_without_phase_passes_through() {
        let (mut tracker, _) = tracker();
        let outcome = tracker.capture_block_change(stone());
        assert_eq!(outcome, CaptureOutcome::Passthrough);
        assert!(outcome.applies_directly());
    }

    #[test]
    fn test_empty_completion_reported_once() {
        let (mut tracker, sink) = tracker();
        assert!(tracker.complete_phase(PhaseState::TickBlock).unwrap().is_none());
        assert!(tracker.complete_phase(PhaseState::TickBlock).unwrap().is_none());
        assert_eq!(sink.count(AnomalyKind::EmptyStackCompletion), 1);
    }

    #[test]
    fn test_mismatch_completes_actual_top() {
        let (mut tracker, sink) = tracker();
        tracker.switch_to(PhaseContext::new(PhaseState::TickEntity)).unwrap();
        let closed = tracker.complete_phase(PhaseState::TickBlock).unwrap().unwrap();
        assert_eq!(closed.state(), PhaseState::TickEntity);
        assert!(tracker.stack().is_empty());
        assert_eq!(sink.count(AnomalyKind::IncorrectCompletion), 1);
    }

    #[test]
    fn test_panicking_host_is_reported() {
        let (mut tracker, sink) = tracker();
        tracker.host_mut().panic_on_apply = true;
        tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
        tracker.capture_block_change(stone());
        let closed = tracker.complete_phase(PhaseState::TickBlock).unwrap().unwrap();
        assert!(!closed.has_captures());
        assert_eq!(sink.count(AnomalyKind::PhaseException), 1);
        assert_eq!(sink.count(AnomalyKind::UnprocessedObjects), 0);

        let report = &sink.reports()[0];
        assert!(report.body.contains("Panic: host blew up"));
        assert!(report.body.contains("tracker.rs"), "{}", report.body);
        assert!(report.backtrace.as_deref().is_some_and(|t| !t.is_empty()));
    }

    #[test]
    fn test_halted_leftovers_are_reported() {
        let (mut tracker, sink) = tracker();
        tracker.config.settings_mut().max_block_processing_depth = 1;
        tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
        tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
        assert!(tracker.phase_context().is_halted());

        tracker.phase_context_mut().unwrap().capture_block_change(stone());
        let closed = tracker.complete_phase(PhaseState::TickBlock).unwrap().unwrap();
        assert!(!closed.has_captures());
        assert!(tracker.host().applied.is_empty());
        assert_eq!(sink.count(AnomalyKind::UnprocessedObjects), 1);
    }

    #[test]
    fn test_off_thread_switch_is_refused() {
        let (mut tracker, sink) = tracker();
        let handle = std::thread::Builder::new()
            .name("worker-1".to_owned())
            .spawn(move || {
                let err = tracker
                    .switch_to(PhaseContext::new(PhaseState::TickBlock))
                    .unwrap_err();
                (tracker, err)
            })
            .unwrap();
        let (tracker, err) = handle.join().unwrap();
        assert!(err.to_string().contains("worker-1"));
        assert!(tracker.stack().is_empty());
        assert_eq!(sink.count(AnomalyKind::AsyncTrackerAccess), 1);
    }

    #[test]
    fn test_end_tick_force_completes() {
        let (mut tracker, sink) = tracker();
        tracker.switch_to(PhaseContext::new(PhaseState::PluginCommand)).unwrap();
        tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
        tracker.capture_block_change(stone());
        assert_eq!(tracker.end_tick(), 2);
        assert!(tracker.stack().is_empty());
        assert_eq!(tracker.host().applied.len(), 1);
        assert_eq!(sink.count(AnomalyKind::PhasesNotCompleted), 1);
    }

    #[test]
    fn test_async_spawns_replay_when_stack_empties() {
        let (mut tracker, _) = tracker();
        let spawner = tracker.async_spawner();
        std::thread::spawn(move || {
            spawner.spawn(CapturedEntity::new("minecraft:zombie"));
        })
        .join()
        .unwrap();

        tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
        assert_eq!(tracker.drain_async_spawns(), 0, "not while a phase is active");
        tracker.complete_phase(PhaseState::TickBlock).unwrap();
        assert_eq!(tracker.host().spawned.len(), 1);
        assert_eq!(tracker.host().spawned[0].kind, "minecraft:zombie");
    }
}
