mod common;

use common::{place, tracker, tracker_with};
use phase_tracker::config::{PhaseTrackerSettings, TrackerConfig};
use phase_tracker::diagnostics::AnomalyKind;
use phase_tracker::phase::{CaptureOutcome, Cause, PhaseContext, PhaseState};
use phase_tracker::sim::SimWorldConfig;

fn config(settings: PhaseTrackerSettings) -> TrackerConfig {
    TrackerConfig {
        phase_tracker: settings,
        ..TrackerConfig::default()
    }
}

// ============================================================================
// Stack discipline
// ============================================================================

#[test]
fn nested_phases_complete_in_lifo_order() {
    let (mut tracker, sink) = tracker();
    tracker
        .switch_to(PhaseContext::new(PhaseState::PluginCommand).with_source(Cause::Plugin("worldedit".into())))
        .unwrap();
    tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
    tracker.switch_to(PhaseContext::new(PhaseState::NeighborNotify)).unwrap();

    let states: Vec<_> = tracker.stack().iter().map(PhaseContext::state).collect();
    assert_eq!(
        states,
        vec![PhaseState::NeighborNotify, PhaseState::TickBlock, PhaseState::PluginCommand]
    );

    for state in [PhaseState::NeighborNotify, PhaseState::TickBlock, PhaseState::PluginCommand] {
        let closed = tracker.complete_phase(state).unwrap().unwrap();
        assert_eq!(closed.state(), state);
    }
    assert_eq!(tracker.current_state(), PhaseState::Empty);
    assert!(sink.is_empty(), "clean nesting reports nothing: {:?}", sink.reports());
}

#[test]
fn phase_context_reflects_top() {
    let (mut tracker, _) = tracker();
    let source = Cause::Command("/give @p diamond".into());
    tracker
        .switch_to(PhaseContext::new(PhaseState::PluginCommand).with_source(source.clone()))
        .unwrap();
    assert_eq!(tracker.phase_context().source(), Some(&source));
    assert!(tracker.phase_context().is_open());
    assert_eq!(tracker.phase_context().depth(), 1);

    tracker.complete_phase(PhaseState::PluginCommand).unwrap();
    assert_eq!(tracker.phase_context().state(), PhaseState::Empty);
    assert!(tracker.phase_context_mut().is_none());
}

#[test]
fn within_brackets_the_closure() {
    let (mut tracker, sink) = tracker();
    let outcome = tracker
        .within(PhaseContext::new(PhaseState::TickBlock), |t| {
            assert_eq!(t.current_state(), PhaseState::TickBlock);
            t.capture_block_change(place(0, 64, 0, "minecraft:stone"))
        })
        .unwrap();
    assert_eq!(outcome, CaptureOutcome::Captured);
    assert!(tracker.stack().is_empty());
    assert_eq!(tracker.host().changes_applied(), 1);
    assert!(sink.is_empty());
}

// ============================================================================
// Completion anomalies
// ============================================================================

#[test]
fn mismatched_completion_reported_once_per_pair() {
    let (mut tracker, sink) = tracker();
    for _ in 0..3 {
        tracker.switch_to(PhaseContext::new(PhaseState::TickEntity)).unwrap();
        tracker.complete_phase(PhaseState::TickBlock).unwrap();
    }
    tracker.switch_to(PhaseContext::new(PhaseState::TickFluid)).unwrap();
    tracker.complete_phase(PhaseState::TickBlock).unwrap();

    assert!(tracker.stack().is_empty());
    assert_eq!(sink.count(AnomalyKind::IncorrectCompletion), 2);
}

#[test]
fn verbose_repeats_mismatch_reports() {
    let settings = PhaseTrackerSettings {
        verbose: true,
        ..PhaseTrackerSettings::default()
    };
    let (mut tracker, sink) = tracker_with(config(settings), SimWorldConfig::default());
    for _ in 0..3 {
        tracker.switch_to(PhaseContext::new(PhaseState::TickEntity)).unwrap();
        tracker.complete_phase(PhaseState::TickBlock).unwrap();
    }
    assert_eq!(sink.count(AnomalyKind::IncorrectCompletion), 3);
}

#[test]
fn empty_stack_completion_is_harmless() {
    let (mut tracker, sink) = tracker();
    assert!(tracker.complete_phase(PhaseState::ChunkLoad).unwrap().is_none());
    assert!(tracker.complete_phase(PhaseState::TickBlock).unwrap().is_none());
    assert_eq!(sink.count(AnomalyKind::EmptyStackCompletion), 1);

    // the tracker keeps working
    tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
    assert!(tracker.complete_phase(PhaseState::TickBlock).unwrap().is_some());
}

#[test]
fn leftover_captures_are_reported_and_cleared() {
    let (mut tracker, sink) = tracker();
    // the idle state's policy captures nothing, so its processor leaves this
    tracker.switch_to(PhaseContext::new(PhaseState::Empty)).unwrap();
    tracker
        .phase_context_mut()
        .unwrap()
        .capture_block_change(place(0, 0, 0, "minecraft:stone"));

    let closed = tracker.complete_phase(PhaseState::Empty).unwrap().unwrap();
    assert!(!closed.has_captures());
    assert_eq!(tracker.host().changes_applied(), 0);
    assert_eq!(sink.count(AnomalyKind::UnprocessedObjects), 1);
}

// ============================================================================
// Runaways and nesting
// ============================================================================

#[test]
fn runaway_reports_share_one_cap() {
    let (mut tracker, sink) = tracker();
    for _ in 0..5 {
        tracker.switch_to(PhaseContext::new(PhaseState::TickEntity)).unwrap();
    }
    for _ in 0..5 {
        tracker.complete_phase(PhaseState::TickEntity).unwrap();
    }
    // 4 runaway switches + 4 runaway completions, capped at the default of 3
    assert_eq!(sink.count(AnomalyKind::RunawayPhase), 3);
    assert!(tracker.stack().is_empty());
}

#[test]
fn runaway_cap_lifted_when_verbose() {
    let settings = PhaseTrackerSettings {
        verbose: true,
        ..PhaseTrackerSettings::default()
    };
    let (mut tracker, sink) = tracker_with(config(settings), SimWorldConfig::default());
    for _ in 0..3 {
        tracker.switch_to(PhaseContext::new(PhaseState::TickTileEntity)).unwrap();
    }
    for _ in 0..3 {
        tracker.complete_phase(PhaseState::TickTileEntity).unwrap();
    }
    assert_eq!(sink.count(AnomalyKind::RunawayPhase), 4);
}

#[test]
fn reentrant_states_are_not_runaways() {
    let (mut tracker, sink) = tracker();
    for _ in 0..10 {
        tracker.switch_to(PhaseContext::new(PhaseState::NeighborNotify)).unwrap();
    }
    assert_eq!(tracker.stack().activations(PhaseState::NeighborNotify), 10);
    assert_eq!(tracker.phase_context().depth(), 10);
    for _ in 0..10 {
        tracker.complete_phase(PhaseState::NeighborNotify).unwrap();
    }
    assert!(sink.is_empty());
}

#[test]
fn illegal_nesting_is_reported_and_tolerated() {
    let (mut tracker, sink) = tracker();
    tracker.switch_to(PhaseContext::new(PhaseState::TerrainGeneration)).unwrap();
    tracker.switch_to(PhaseContext::new(PhaseState::PluginCommand)).unwrap();
    assert_eq!(tracker.current_state(), PhaseState::PluginCommand);
    tracker.complete_phase(PhaseState::PluginCommand).unwrap();

    // same pair again: muted
    tracker.switch_to(PhaseContext::new(PhaseState::PluginCommand)).unwrap();
    tracker.complete_phase(PhaseState::PluginCommand).unwrap();
    // generation states nest fine
    tracker.switch_to(PhaseContext::new(PhaseState::Population)).unwrap();
    tracker.complete_phase(PhaseState::Population).unwrap();
    tracker.complete_phase(PhaseState::TerrainGeneration).unwrap();

    assert_eq!(sink.count(AnomalyKind::IllegalNesting), 1);
}

// ============================================================================
// Depth ceiling
// ============================================================================

#[test]
fn phases_past_the_ceiling_are_halted() {
    let settings = PhaseTrackerSettings {
        max_block_processing_depth: 2,
        ..PhaseTrackerSettings::default()
    };
    let (mut tracker, sink) = tracker_with(config(settings), SimWorldConfig::default());
    tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
    tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
    assert!(!tracker.phase_context().is_halted());

    tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
    assert!(tracker.phase_context().is_halted());
    assert_eq!(
        tracker.capture_block_change(place(0, 0, 0, "minecraft:stone")),
        CaptureOutcome::Rejected
    );

    // children of a halted phase are halted too
    tracker.switch_to(PhaseContext::new(PhaseState::TickEntity)).unwrap();
    assert!(tracker.phase_context().is_halted());

    assert_eq!(tracker.end_tick(), 4);
    assert_eq!(tracker.host().changes_applied(), 0);
    assert_eq!(sink.count(AnomalyKind::MaxDepthExceeded), 1);
}

// ============================================================================
// Tick boundary and untracked changes
// ============================================================================

#[test]
fn end_tick_processes_force_completed_phases() {
    let (mut tracker, sink) = tracker();
    tracker.switch_to(PhaseContext::new(PhaseState::ScheduledTask)).unwrap();
    tracker.capture_block_change(place(0, 64, 0, "minecraft:torch"));
    assert_eq!(tracker.end_tick(), 1);
    assert_eq!(tracker.host().changes_applied(), 1);
    assert_eq!(sink.count(AnomalyKind::PhasesNotCompleted), 1);

    // an empty stack at tick end is fine
    assert_eq!(tracker.end_tick(), 0);
    assert_eq!(sink.count(AnomalyKind::PhasesNotCompleted), 1);
}

#[test]
fn untracked_changes_reported_only_when_verbose() {
    let (mut quiet, quiet_sink) = tracker();
    assert!(!quiet.report_untracked_block_change(&place(0, 0, 0, "minecraft:stone")));
    assert!(quiet_sink.is_empty());

    let settings = PhaseTrackerSettings {
        verbose: true,
        ..PhaseTrackerSettings::default()
    };
    let (mut loud, loud_sink) = tracker_with(config(settings), SimWorldConfig::default());
    assert!(loud.report_untracked_block_change(&place(0, 0, 0, "minecraft:stone")));
    assert_eq!(loud_sink.count(AnomalyKind::UntrackedBlockChange), 1);
}

#[test]
fn deep_reentry_reports_the_ceiling_once() {
    let (mut tracker, sink) = tracker();
    for _ in 0..150 {
        tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
    }
    assert_eq!(tracker.stack().len(), 150);
    assert_eq!(sink.count(AnomalyKind::MaxDepthExceeded), 1);
    // tick_block is not migrated
    assert_eq!(tracker.config().settings().max_block_processing_depth, 100);

    for _ in 0..150 {
        tracker.complete_phase(PhaseState::TickBlock).unwrap();
    }
    assert!(tracker.stack().is_empty());
    assert_eq!(sink.len(), 1);
}

#[test]
fn single_capture_posts_one_event() {
    use phase_tracker::phase::{BlockPos, BlockState, WorldEvent};

    let (mut tracker, _) = tracker();
    tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
    tracker.capture_block_change(place(10, 64, 10, "minecraft:stone"));
    let closed = tracker.complete_phase(PhaseState::TickBlock).unwrap().unwrap();
    assert!(!closed.has_captures());

    let events = tracker.host().posted_events();
    assert_eq!(events.len(), 1);
    let WorldEvent::ChangeBlock(event) = &events[0] else {
        panic!("expected a block event");
    };
    assert_eq!(event.transactions.len(), 1);
    let transaction = &event.transactions[0];
    assert_eq!(transaction.pos, BlockPos::new(10, 64, 10));
    assert_eq!(transaction.original, BlockState::air());
    assert_eq!(transaction.replacement, BlockState::new("minecraft:stone"));
}
