mod common;

use common::{place, tracker, tracker_with, world};
use phase_tracker::config::{
    ConfigHandle, ModTrackerCategory, PhaseTrackerSettings, TrackerCategory, TrackerConfig,
};
use phase_tracker::diagnostics::AnomalyKind;
use phase_tracker::phase::{
    BlockPos, BlockState, CaptureOutcome, CapturedEntity, Cause, PhaseContext, PhaseState, WorldEvent,
};
use phase_tracker::scenario::{RunOptions, RunSummary, load_builtin, run};
use phase_tracker::sim::SimWorldConfig;

async fn run_builtin(name: &str) -> RunSummary {
    let scenario = load_builtin(name).unwrap();
    run(&scenario, RunOptions::default()).await.unwrap()
}

// ============================================================================
// Built-in scenarios
// ============================================================================

#[tokio::test]
async fn block_tick_cancels_the_refused_change() {
    let summary = run_builtin("block-tick").await;
    assert_eq!(summary.events_posted, 3);
    assert_eq!(summary.events_cancelled, 1);
    assert_eq!(summary.blocks, 2);
    assert_eq!(summary.entities, vec!["minecraft:sheep".to_owned()]);
    assert_eq!(summary.captures.captured, 3);
    assert_eq!(summary.anomaly_count(), 0);
    assert_eq!(summary.open_phases, 0);
}

#[tokio::test]
async fn plugin_command_posts_one_batch() {
    let summary = run_builtin("plugin-command-batch").await;
    // blocks and entities of the command, then the task's torch
    assert_eq!(summary.events_posted, 3);
    assert_eq!(summary.block_changes_applied, 5);
    assert_eq!(summary.blocks, 5);
    assert_eq!(summary.entities, vec!["minecraft:armor_stand".to_owned()]);
    assert_eq!(summary.anomaly_count(), 0);
}

#[tokio::test]
async fn mismatched_completion_survives_misuse() {
    let summary = run_builtin("mismatched-completion").await;
    assert_eq!(summary.anomalies.get("incorrect_completion"), Some(&1));
    assert_eq!(summary.anomalies.get("empty_stack_completion"), Some(&1));
    assert_eq!(summary.anomalies.get("illegal_nesting"), Some(&1));
    assert_eq!(summary.anomalies.get("phases_not_completed"), Some(&1));
    assert_eq!(summary.open_phases, 0);
    // the stone captured by the plugin command is still applied
    assert_eq!(summary.blocks, 1);
}

#[tokio::test]
async fn runaway_recursion_is_capped() {
    let summary = run_builtin("runaway-recursion").await;
    assert_eq!(summary.anomalies.get("runaway_phase"), Some(&3));
    assert_eq!(summary.entities, vec!["minecraft:item".to_owned()]);
    assert_eq!(summary.open_phases, 0);
}

#[tokio::test]
async fn redstone_chain_raises_the_ceiling_once() {
    let summary = run_builtin("redstone-chain").await;
    assert_eq!(summary.max_block_processing_depth, 1000);
    assert_eq!(summary.block_changes_applied, 1000);
    assert_eq!(summary.events_posted, 1000);
    assert_eq!(summary.anomalies.get("max_depth_exceeded"), Some(&1));
}

#[tokio::test]
async fn redstone_chain_saves_the_migrated_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracker.yaml");
    std::fs::write(&path, "phase_tracker:\n  max_block_processing_depth: 100\n").unwrap();

    let scenario = load_builtin("redstone-chain").unwrap();
    let options = RunOptions {
        config: Some(ConfigHandle::load(&path).unwrap()),
        ..RunOptions::default()
    };
    let summary = run(&scenario, options).await.unwrap();
    assert_eq!(summary.max_block_processing_depth, 1000);

    let saved = std::fs::read_to_string(&path).unwrap();
    assert!(saved.contains("max_block_processing_depth: 1000"), "{saved}");
    let reloaded = ConfigHandle::load(&path).unwrap();
    assert_eq!(reloaded.settings().max_block_processing_depth, 1000);
}

#[tokio::test]
async fn async_entities_are_replayed_on_the_engine_thread() {
    let summary = run_builtin("async-entities").await;
    assert_eq!(summary.captures.queued, 3);
    assert_eq!(summary.captures.rejected, 1);
    assert_eq!(summary.events_posted, 4);
    assert_eq!(summary.entities, vec!["minecraft:zombie".to_owned(); 3]);
    assert_eq!(summary.anomalies.get("async_block_change"), Some(&1));
    assert_eq!(summary.anomalies.get("entity_spawn_exception"), Some(&1));
}

// ============================================================================
// Processing modes
// ============================================================================

#[test]
fn deferred_captures_move_to_the_parent() {
    let (mut tracker, sink) = tracker();
    tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
    tracker.switch_to(PhaseContext::new(PhaseState::ChunkLoad)).unwrap();
    tracker.capture_block_change(place(0, 60, 0, "minecraft:stone"));
    tracker.capture_entity_spawn(CapturedEntity::new("minecraft:bat"));

    tracker.complete_phase(PhaseState::ChunkLoad).unwrap();
    assert_eq!(tracker.host().changes_applied(), 0);
    assert_eq!(tracker.phase_context().capture_count(), 2);

    tracker.complete_phase(PhaseState::TickBlock).unwrap();
    assert_eq!(tracker.host().changes_applied(), 1);
    assert_eq!(tracker.host().entities().len(), 1);
    assert_eq!(tracker.host().posted_events().len(), 2);
    assert!(sink.is_empty());
}

#[test]
fn deferred_without_parent_processes_immediately() {
    let (mut tracker, _) = tracker();
    tracker.switch_to(PhaseContext::new(PhaseState::ChunkLoad)).unwrap();
    tracker.capture_block_change(place(0, 60, 0, "minecraft:stone"));
    tracker.capture_block_change(place(1, 60, 0, "minecraft:stone"));
    tracker.complete_phase(PhaseState::ChunkLoad).unwrap();
    assert_eq!(tracker.host().changes_applied(), 2);
    assert_eq!(tracker.host().posted_events().len(), 2);
}

#[test]
fn population_spawns_without_events() {
    let (mut tracker, _) = tracker();
    tracker.switch_to(PhaseContext::new(PhaseState::TerrainGeneration)).unwrap();
    tracker.switch_to(PhaseContext::new(PhaseState::Population)).unwrap();
    assert_eq!(
        tracker.capture_entity_spawn(CapturedEntity::new("minecraft:cow")),
        CaptureOutcome::Captured
    );
    // generation does not capture blocks
    assert_eq!(
        tracker.capture_block_change(place(0, 40, 0, "minecraft:oak_log")),
        CaptureOutcome::Passthrough
    );
    tracker.complete_phase(PhaseState::Population).unwrap();
    tracker.complete_phase(PhaseState::TerrainGeneration).unwrap();

    assert_eq!(tracker.host().entities().len(), 1);
    assert!(tracker.host().posted_events().is_empty());
}

#[test]
fn event_causes_follow_the_source() {
    let (mut tracker, _) = tracker();
    let source = Cause::Block {
        state: BlockState::new("minecraft:piston"),
        pos: BlockPos::new(5, 64, 5),
    };
    tracker
        .switch_to(
            PhaseContext::new(PhaseState::TickBlock)
                .with_source(source.clone())
                .with_cause(Cause::World("overworld".into())),
        )
        .unwrap();
    tracker.capture_block_change(place(6, 64, 5, "minecraft:piston_head"));
    tracker.complete_phase(PhaseState::TickBlock).unwrap();

    let events = tracker.host().posted_events();
    assert_eq!(events.len(), 1);
    let WorldEvent::ChangeBlock(event) = &events[0] else {
        panic!("expected a block event, got {:?}", events[0]);
    };
    assert_eq!(event.phase, PhaseState::TickBlock);
    assert_eq!(event.causes.first(), Some(&source));
    assert_eq!(event.causes.len(), 2);
}

#[test]
fn world_rejection_is_reported_per_change() {
    let world = world("reject_blocks: [minecraft:bedrock]\n");
    let (mut tracker, sink) = tracker_with(TrackerConfig::default(), world);
    tracker.switch_to(PhaseContext::new(PhaseState::PluginCommand)).unwrap();
    tracker.capture_block_change(place(0, 0, 0, "minecraft:bedrock"));
    tracker.capture_block_change(place(1, 0, 0, "minecraft:dirt"));
    tracker.complete_phase(PhaseState::PluginCommand).unwrap();

    assert_eq!(tracker.host().changes_applied(), 1);
    assert_eq!(sink.count(AnomalyKind::BlockCaptureException), 1);
}

#[test]
fn cascades_run_as_neighbor_notifications() {
    let world = world(
        r"
cascades:
  - when: minecraft:sand
    place:
      - offset: [0, -1, 0]
        state: minecraft:sand
",
    );
    let settings = PhaseTrackerSettings {
        max_block_processing_depth: 5,
        ..PhaseTrackerSettings::default()
    };
    let config = TrackerConfig {
        phase_tracker: settings,
        ..TrackerConfig::default()
    };
    let (mut tracker, sink) = tracker_with(config, world);
    tracker.switch_to(PhaseContext::new(PhaseState::TickFluid)).unwrap();
    tracker.capture_block_change(place(0, 64, 0, "minecraft:sand"));
    tracker.complete_phase(PhaseState::TickFluid).unwrap();

    // depth 1 from the tick, 2..=5 from notifications
    assert_eq!(tracker.host().changes_applied(), 5);
    assert_eq!(sink.count(AnomalyKind::MaxDepthExceeded), 1);
    // the ceiling is not migrated away from a non-legacy value
    assert_eq!(tracker.config().settings().max_block_processing_depth, 5);
}

// ============================================================================
// Capability overrides
// ============================================================================

fn disabled_mod_config() -> TrackerConfig {
    let mut blocks = TrackerCategory::default();
    blocks.mods.insert(
        "examplemod".to_owned(),
        ModTrackerCategory {
            enabled: false,
            ..ModTrackerCategory::default()
        },
    );
    let mut vanilla = ModTrackerCategory::default();
    vanilla.block_event_creation.insert("stone".to_owned(), false);
    blocks.mods.insert("minecraft".to_owned(), vanilla);
    TrackerConfig {
        block_tracker: blocks,
        ..TrackerConfig::default()
    }
}

#[test]
fn disabled_mod_blocks_pass_through() {
    let (mut tracker, _) = tracker_with(disabled_mod_config(), SimWorldConfig::default());
    tracker.switch_to(PhaseContext::new(PhaseState::TickBlock)).unwrap();
    assert_eq!(
        tracker.capture_block_change(place(0, 0, 0, "examplemod:reactor")),
        CaptureOutcome::Passthrough
    );
    assert_eq!(
        tracker.capture_block_change(place(1, 0, 0, "minecraft:dirt")),
        CaptureOutcome::Captured
    );
    tracker.complete_phase(PhaseState::TickBlock).unwrap();
    assert_eq!(tracker.host().changes_applied(), 1);
}

#[test]
fn event_creation_opt_out_still_applies() {
    let (mut tracker, _) = tracker_with(disabled_mod_config(), SimWorldConfig::default());
    tracker.switch_to(PhaseContext::new(PhaseState::PluginCommand)).unwrap();
    tracker.capture_block_change(place(0, 0, 0, "minecraft:stone"));
    tracker.capture_block_change(place(1, 0, 0, "minecraft:dirt"));
    tracker.complete_phase(PhaseState::PluginCommand).unwrap();

    assert_eq!(tracker.host().changes_applied(), 2);
    let events = tracker.host().posted_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].len(), 1, "only the dirt is evented");
    assert_eq!(
        tracker.host().block_at(BlockPos::new(0, 0, 0)).id(),
        "minecraft:stone"
    );
}
