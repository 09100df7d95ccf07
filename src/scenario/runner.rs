//! Executes a [`Scenario`] against a tracker over a [`SimWorld`].
//!
//! The runner plays the engine: it enters and completes phases, feeds the
//! capture hooks, and applies passthrough side effects itself. Off-thread
//! steps run on blocking worker threads. For `off_thread_block` the whole
//! tracker is handed to the worker and handed back when it finishes.

use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;

use crate::config::handle::ConfigHandle;
use crate::config::schema::TrackerConfig;
use crate::diagnostics::sink::{DiagnosticSink, FanoutSink, MemorySink};
use crate::error::ScenarioError;
use crate::observability::events::{Event, EventEmitter};
use crate::phase::context::{BlockChange, CapturedEntity, PhaseContext};
use crate::phase::tracker::{CaptureOutcome, PhaseTracker};
use crate::sim::SimWorld;

use super::script::{Scenario, Step};

/// Options for one run.
#[derive(Default)]
pub struct RunOptions {
    /// Tracker configuration. When absent, the scenario's own `tracker`
    /// section (or the defaults) is used with no backing file.
    pub config: Option<ConfigHandle>,

    /// Extra sink that receives every report, e.g. [`TracingSink`](crate::diagnostics::TracingSink).
    pub sink: Option<Arc<dyn DiagnosticSink>>,

    /// JSONL event stream.
    pub emitter: Option<Arc<EventEmitter>>,
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("config", &self.config)
            .field("sink", &self.sink.is_some())
            .field("emitter", &self.emitter)
            .finish()
    }
}

/// Capture hook outcomes over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureCounts {
    pub captured: usize,
    pub passthrough: usize,
    pub queued: usize,
    pub rejected: usize,
}

impl CaptureCounts {
    fn record(&mut self, outcome: CaptureOutcome) {
        match outcome {
            CaptureOutcome::Captured => self.captured += 1,
            CaptureOutcome::Passthrough => self.passthrough += 1,
            CaptureOutcome::Queued => self.queued += 1,
            CaptureOutcome::Rejected => self.rejected += 1,
        }
    }
}

/// Result of a scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub name: String,
    pub steps: usize,
    /// Events posted to listeners.
    pub events_posted: usize,
    /// Posted events listeners cancelled outright.
    pub events_cancelled: usize,
    /// Block changes the world applied.
    pub block_changes_applied: usize,
    /// Non-air blocks at the end.
    pub blocks: usize,
    /// Kinds of the entities spawned, in spawn order.
    pub entities: Vec<String>,
    pub captures: CaptureCounts,
    /// Phases still open when the script ended.
    pub open_phases: usize,
    /// Depth ceiling at the end, after any migration.
    pub max_block_processing_depth: usize,
    /// Emitted reports per anomaly kind.
    pub anomalies: IndexMap<String, usize>,
}

impl RunSummary {
    /// Total reports emitted.
    #[must_use]
    pub fn anomaly_count(&self) -> usize {
        self.anomalies.values().sum()
    }
}

/// Runs `scenario` to completion.
///
/// Protocol violations are collected in the summary; they do not stop the
/// run.
///
/// # Errors
///
/// Returns [`ScenarioError::Phase`] if a step drives the tracker from the
/// wrong thread, or [`ScenarioError::Worker`] if a worker thread panics.
pub async fn run(scenario: &Scenario, options: RunOptions) -> Result<RunSummary, ScenarioError> {
    let config = options.config.unwrap_or_else(|| {
        ConfigHandle::new(TrackerConfig {
            phase_tracker: scenario.tracker.clone().unwrap_or_default(),
            ..TrackerConfig::default()
        })
    });

    let memory = Arc::new(MemorySink::new());
    let mut fanout = FanoutSink::new().with(memory.clone());
    if let Some(sink) = options.sink {
        fanout = fanout.with(sink);
    }
    let mut world = SimWorld::new(scenario.world.clone());
    if let Some(emitter) = &options.emitter {
        fanout = fanout.with(emitter.clone());
        world = world.with_emitter(emitter.clone());
        emitter.emit(Event::ScenarioStarted {
            timestamp: Utc::now(),
            name: scenario.name.clone(),
            steps: scenario.steps.len(),
        });
    }

    tracing::info!(scenario = %scenario.name, steps = scenario.steps.len(), "running scenario");
    let mut tracker = PhaseTracker::new(world, config, Arc::new(fanout));
    let mut captures = CaptureCounts::default();

    for (index, step) in scenario.steps.iter().enumerate() {
        tracing::debug!(index, step = %step, "executing step");
        tracker = execute(tracker, index, step, &mut captures).await?;
        if let Some(emitter) = &options.emitter {
            emitter.emit(Event::StepExecuted {
                timestamp: Utc::now(),
                index,
                step: step.to_string(),
                current_state: tracker.current_state(),
                stack_depth: tracker.stack().len(),
            });
        }
    }

    let world = tracker.host();
    let mut anomalies = IndexMap::new();
    for report in memory.reports() {
        *anomalies.entry(report.kind.as_str().to_owned()).or_insert(0) += 1;
    }
    let summary = RunSummary {
        name: scenario.name.clone(),
        steps: scenario.steps.len(),
        events_posted: world.posted_events().len(),
        events_cancelled: world
            .posted_events()
            .iter()
            .filter(|e| e.is_cancelled())
            .count(),
        block_changes_applied: world.changes_applied(),
        blocks: world.blocks().count(),
        entities: world.entities().iter().map(|e| e.kind.clone()).collect(),
        captures,
        open_phases: tracker.stack().len(),
        max_block_processing_depth: tracker.config().settings().max_block_processing_depth,
        anomalies,
    };

    if let Some(emitter) = &options.emitter {
        emitter.emit(Event::ScenarioFinished {
            timestamp: Utc::now(),
            name: summary.name.clone(),
            events_posted: summary.events_posted,
            anomalies: summary.anomaly_count(),
        });
    }
    tracing::info!(
        scenario = %summary.name,
        events = summary.events_posted,
        anomalies = summary.anomaly_count(),
        "scenario finished"
    );
    Ok(summary)
}

async fn execute(
    mut tracker: PhaseTracker<SimWorld>,
    index: usize,
    step: &Step,
    captures: &mut CaptureCounts,
) -> Result<PhaseTracker<SimWorld>, ScenarioError> {
    match step {
        Step::Switch {
            state,
            source,
            repeat,
        } => {
            for _ in 0..*repeat {
                let mut context = PhaseContext::new(*state);
                if let Some(source) = source {
                    context = context.with_source(source.clone());
                }
                tracker
                    .switch_to(context)
                    .map_err(|e| ScenarioError::phase(index, e))?;
            }
        }
        Step::Complete { state, repeat } => {
            for _ in 0..*repeat {
                tracker
                    .complete_phase(*state)
                    .map_err(|e| ScenarioError::phase(index, e))?;
            }
        }
        Step::CaptureBlock { pos, old, new } => {
            let change = BlockChange::new(*pos, old.clone(), new.clone());
            let outcome = tracker.capture_block_change(change.clone());
            captures.record(outcome);
            if outcome.applies_directly() {
                if let Err(error) = tracker.host_mut().apply_direct(&change) {
                    tracing::warn!(%error, "direct block change failed");
                }
            }
        }
        Step::SpawnEntity { kind, pos } => {
            let mut entity = CapturedEntity::new(kind.clone());
            if let Some(pos) = pos {
                entity = entity.at(*pos);
            }
            let outcome = tracker.capture_entity_spawn(entity.clone());
            captures.record(outcome);
            if outcome.applies_directly() {
                if let Err(error) = tracker.host_mut().spawn_direct(&entity) {
                    tracing::warn!(%error, "direct entity spawn failed");
                }
            }
        }
        Step::AsyncSpawn { kind, count } => {
            let spawner = tracker.async_spawner();
            let entity = CapturedEntity::new(kind.clone());
            let count = *count;
            let outcomes = tokio::task::spawn_blocking(move || {
                (0..count)
                    .map(|_| spawner.spawn(entity.clone()))
                    .collect::<Vec<_>>()
            })
            .await
            .map_err(|e| ScenarioError::Worker {
                step: index,
                message: e.to_string(),
            })?;
            for outcome in outcomes {
                captures.record(outcome);
            }
        }
        Step::OffThreadBlock { pos, old, new } => {
            let change = BlockChange::new(*pos, old.clone(), new.clone());
            let (returned, outcome) = tokio::task::spawn_blocking(move || {
                let outcome = tracker.capture_block_change(change);
                (tracker, outcome)
            })
            .await
            .map_err(|e| ScenarioError::Worker {
                step: index,
                message: e.to_string(),
            })?;
            tracker = returned;
            captures.record(outcome);
        }
        Step::UntrackedBlock { pos, old, new } => {
            let change = BlockChange::new(*pos, old.clone(), new.clone());
            tracker.report_untracked_block_change(&change);
            if let Err(error) = tracker.host_mut().apply_direct(&change) {
                tracing::warn!(%error, "untracked block change failed");
            }
        }
        Step::EndTick => {
            let forced = tracker.end_tick();
            if forced > 0 {
                tracing::debug!(forced, "force-completed phases at tick end");
            }
        }
        Step::DrainAsync => {
            let replayed = tracker.drain_async_spawns();
            tracing::debug!(replayed, "drained async spawns");
        }
    }
    Ok(tracker)
}
