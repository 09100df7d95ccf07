//! Scenario script format.
//!
//! A scenario is a YAML document describing a world and a list of steps
//! that drive a tracker the way an engine would:
//!
//! ```yaml
//! name: block-tick
//! world:
//!   cancel_blocks: [minecraft:tnt]
//! steps:
//!   - switch: { state: tick_block }
//!   - capture_block: { pos: [0, 64, 0], new: minecraft:stone }
//!   - complete: { state: tick_block }
//!   - end_tick
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::schema::PhaseTrackerSettings;
use crate::error::{Result, ScenarioError};
use crate::phase::context::{BlockPos, BlockState, Cause};
use crate::phase::state::PhaseState;
use crate::sim::SimWorldConfig;

/// Maximum scenario file size (1 MiB).
const MAX_SCENARIO_SIZE: u64 = 1024 * 1024;

const fn one() -> usize {
    1
}

/// A parsed scenario script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Scenario name, used in summaries and events.
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Initial world and listener rules.
    #[serde(default)]
    pub world: SimWorldConfig,

    /// Tracker settings used when no configuration file is supplied.
    #[serde(default)]
    pub tracker: Option<PhaseTrackerSettings>,

    /// Steps, executed in order.
    pub steps: Vec<Step>,
}

/// One scripted engine action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Step {
    /// Enter a phase, `repeat` times.
    Switch {
        state: PhaseState,
        #[serde(default)]
        source: Option<Cause>,
        #[serde(default = "one")]
        repeat: usize,
    },

    /// Complete a phase, `repeat` times.
    Complete {
        state: PhaseState,
        #[serde(default = "one")]
        repeat: usize,
    },

    /// Offer a block change to the capture hook.
    CaptureBlock {
        pos: BlockPos,
        #[serde(default = "BlockState::air")]
        old: BlockState,
        new: BlockState,
    },

    /// Offer an entity spawn to the capture hook.
    SpawnEntity {
        kind: String,
        #[serde(default)]
        pos: Option<BlockPos>,
    },

    /// Spawn entities from a worker thread.
    AsyncSpawn {
        kind: String,
        #[serde(default = "one")]
        count: usize,
    },

    /// Offer a block change from a worker thread.
    OffThreadBlock {
        pos: BlockPos,
        #[serde(default = "BlockState::air")]
        old: BlockState,
        new: BlockState,
    },

    /// Change a block behind the tracker's back.
    UntrackedBlock {
        pos: BlockPos,
        #[serde(default = "BlockState::air")]
        old: BlockState,
        new: BlockState,
    },

    /// Tick boundary.
    EndTick,

    /// Replay queued async spawns.
    DrainAsync,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch { state, repeat, .. } if *repeat > 1 => write!(f, "switch {state} x{repeat}"),
            Self::Switch { state, .. } => write!(f, "switch {state}"),
            Self::Complete { state, repeat } if *repeat > 1 => write!(f, "complete {state} x{repeat}"),
            Self::Complete { state, .. } => write!(f, "complete {state}"),
            Self::CaptureBlock { pos, new, .. } => write!(f, "capture_block {new} at {pos}"),
            Self::SpawnEntity { kind, .. } => write!(f, "spawn_entity {kind}"),
            Self::AsyncSpawn { kind, count } => write!(f, "async_spawn {kind} x{count}"),
            Self::OffThreadBlock { pos, new, .. } => write!(f, "off_thread_block {new} at {pos}"),
            Self::UntrackedBlock { pos, new, .. } => write!(f, "untracked_block {new} at {pos}"),
            Self::EndTick => f.write_str("end_tick"),
            Self::DrainAsync => f.write_str("drain_async"),
        }
    }
}

impl Scenario {
    /// Parses a scenario document. `origin` names it in errors.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Parse`] for malformed YAML, unknown keys,
    /// or a script without steps.
    pub fn from_yaml(raw: &str, origin: &str) -> std::result::Result<Self, ScenarioError> {
        let scenario: Self = serde_yaml::from_str(raw).map_err(|e| ScenarioError::Parse {
            origin: origin.to_owned(),
            message: e.to_string(),
        })?;
        if scenario.steps.is_empty() {
            return Err(ScenarioError::Parse {
                origin: origin.to_owned(),
                message: "scenario has no steps".to_owned(),
            });
        }
        Ok(scenario)
    }

    /// Reads and parses a scenario file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or a scenario error
    /// if it is too large or does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let size = std::fs::metadata(path)?.len();
        if size > MAX_SCENARIO_SIZE {
            return Err(ScenarioError::Parse {
                origin,
                message: format!("file is {size} bytes, limit is {MAX_SCENARIO_SIZE}"),
            }
            .into());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&raw, &origin)?)
    }
}
