//! Phase states and their behavior table.
//!
//! A [`PhaseState`] names a category of engine operation. Every variant maps
//! to exactly one static [`PhasePolicy`] through [`PhaseState::policy`]; the
//! match is exhaustive, so adding a state without deciding its behavior does
//! not compile.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of engine operation that a phase activation represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    /// Base state reported when no phase is active.
    Empty,
    /// Scheduled block tick.
    TickBlock,
    /// Random block tick (crop growth, leaf decay).
    TickRandomBlock,
    /// Fluid tick.
    TickFluid,
    /// Entity update.
    TickEntity,
    /// Tile entity update.
    TickTileEntity,
    /// Neighbor notification following a block change.
    NeighborNotify,
    /// Queued block event (pistons, note blocks).
    BlockEvent,
    /// Chunk load from disk.
    ChunkLoad,
    /// Terrain generation for a fresh chunk.
    TerrainGeneration,
    /// Chunk population (features, structures, initial mobs).
    Population,
    /// Natural mob spawning pass.
    WorldSpawnerSpawning,
    /// Plugin command execution.
    PluginCommand,
    /// Plugin scheduled task.
    ScheduledTask,
    /// Plugin event listener callback.
    PluginListener,
    /// Replay of entities queued from other threads.
    AsyncSpawnReplay,
    /// Fallback for work the tracker cannot attribute, tolerated off-thread.
    UnsafeAsync,
}

/// Broad family a state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseGroup {
    /// Tracker bookkeeping states.
    General,
    /// Per-tick world simulation.
    Tick,
    /// World generation and loading.
    Generation,
    /// Plugin-initiated work.
    Plugin,
}

/// How captured side effects are drained when a phase completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Processing {
    /// One outward event per captured block change or entity.
    Immediate,
    /// One outward event per kind covering everything captured.
    Batched,
    /// Hand captures to the parent phase; process immediately when there is none.
    Deferred,
    /// Apply captures directly without outward events.
    Passthrough,
}

/// Which states may be pushed on top of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Nesting {
    /// Any state may nest.
    Any,
    /// Only states of the same [`PhaseGroup`] may nest.
    SameGroup,
}

/// Static behavior descriptor for a [`PhaseState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasePolicy {
    /// Family the state belongs to.
    pub group: PhaseGroup,
    /// Drain strategy on completion.
    pub processing: Processing,
    /// Whether the state may be active more than once on the stack.
    pub allows_reentry: bool,
    /// Whether entering or completing requires the engine thread.
    pub requires_engine_thread: bool,
    /// Whether capture hooks record block changes into this phase.
    pub captures_blocks: bool,
    /// Whether capture hooks record entity spawns into this phase.
    pub captures_entities: bool,
    /// Which states may nest on top.
    pub nesting: Nesting,
}

impl PhasePolicy {
    const fn tick(allows_reentry: bool) -> Self {
        Self {
            group: PhaseGroup::Tick,
            processing: Processing::Immediate,
            allows_reentry,
            requires_engine_thread: true,
            captures_blocks: true,
            captures_entities: true,
            nesting: Nesting::Any,
        }
    }

    const fn plugin(processing: Processing, allows_reentry: bool) -> Self {
        Self {
            group: PhaseGroup::Plugin,
            processing,
            allows_reentry,
            requires_engine_thread: true,
            captures_blocks: true,
            captures_entities: true,
            nesting: Nesting::Any,
        }
    }

    /// Returns whether `child` may be pushed while a phase with this policy
    /// is on top of the stack.
    #[must_use]
    pub const fn accepts_child(&self, child: PhaseState) -> bool {
        match self.nesting {
            Nesting::Any => true,
            Nesting::SameGroup => {
                matches!(
                    (self.group, child.policy().group),
                    (PhaseGroup::General, PhaseGroup::General)
                        | (PhaseGroup::Tick, PhaseGroup::Tick)
                        | (PhaseGroup::Generation, PhaseGroup::Generation)
                        | (PhaseGroup::Plugin, PhaseGroup::Plugin)
                )
            }
        }
    }
}

const EMPTY: PhasePolicy = PhasePolicy {
    group: PhaseGroup::General,
    processing: Processing::Passthrough,
    allows_reentry: false,
    requires_engine_thread: false,
    captures_blocks: false,
    captures_entities: false,
    nesting: Nesting::Any,
};

const TICK_REENTRANT: PhasePolicy = PhasePolicy::tick(true);
const TICK_SINGLE: PhasePolicy = PhasePolicy::tick(false);

const CHUNK_LOAD: PhasePolicy = PhasePolicy {
    group: PhaseGroup::Generation,
    processing: Processing::Deferred,
    allows_reentry: true,
    requires_engine_thread: true,
    captures_blocks: true,
    captures_entities: true,
    nesting: Nesting::Any,
};

const TERRAIN_GENERATION: PhasePolicy = PhasePolicy {
    group: PhaseGroup::Generation,
    processing: Processing::Passthrough,
    allows_reentry: false,
    requires_engine_thread: true,
    captures_blocks: false,
    captures_entities: false,
    nesting: Nesting::SameGroup,
};

const POPULATION: PhasePolicy = PhasePolicy {
    group: PhaseGroup::Generation,
    processing: Processing::Passthrough,
    allows_reentry: false,
    requires_engine_thread: true,
    captures_blocks: false,
    captures_entities: true,
    nesting: Nesting::SameGroup,
};

const WORLD_SPAWNER: PhasePolicy = PhasePolicy {
    group: PhaseGroup::Generation,
    processing: Processing::Batched,
    allows_reentry: false,
    requires_engine_thread: true,
    captures_blocks: false,
    captures_entities: true,
    nesting: Nesting::Any,
};

const PLUGIN_COMMAND: PhasePolicy = PhasePolicy::plugin(Processing::Batched, true);
const SCHEDULED_TASK: PhasePolicy = PhasePolicy::plugin(Processing::Batched, false);
const PLUGIN_LISTENER: PhasePolicy = PhasePolicy::plugin(Processing::Immediate, true);

const ASYNC_SPAWN_REPLAY: PhasePolicy = PhasePolicy {
    group: PhaseGroup::General,
    processing: Processing::Immediate,
    allows_reentry: false,
    requires_engine_thread: true,
    captures_blocks: false,
    captures_entities: true,
    nesting: Nesting::Any,
};

const UNSAFE_ASYNC: PhasePolicy = PhasePolicy {
    group: PhaseGroup::General,
    processing: Processing::Passthrough,
    allows_reentry: true,
    requires_engine_thread: false,
    captures_blocks: false,
    captures_entities: false,
    nesting: Nesting::Any,
};

impl PhaseState {
    /// Number of states.
    pub const COUNT: usize = 17;

    /// Every state, in declaration order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Empty,
        Self::TickBlock,
        Self::TickRandomBlock,
        Self::TickFluid,
        Self::TickEntity,
        Self::TickTileEntity,
        Self::NeighborNotify,
        Self::BlockEvent,
        Self::ChunkLoad,
        Self::TerrainGeneration,
        Self::Population,
        Self::WorldSpawnerSpawning,
        Self::PluginCommand,
        Self::ScheduledTask,
        Self::PluginListener,
        Self::AsyncSpawnReplay,
        Self::UnsafeAsync,
    ];

    /// Returns the behavior descriptor for this state.
    #[must_use]
    pub const fn policy(self) -> &'static PhasePolicy {
        match self {
            Self::Empty => &EMPTY,
            Self::TickBlock
            | Self::TickRandomBlock
            | Self::TickFluid
            | Self::NeighborNotify
            | Self::BlockEvent => &TICK_REENTRANT,
            Self::TickEntity | Self::TickTileEntity => &TICK_SINGLE,
            Self::ChunkLoad => &CHUNK_LOAD,
            Self::TerrainGeneration => &TERRAIN_GENERATION,
            Self::Population => &POPULATION,
            Self::WorldSpawnerSpawning => &WORLD_SPAWNER,
            Self::PluginCommand => &PLUGIN_COMMAND,
            Self::ScheduledTask => &SCHEDULED_TASK,
            Self::PluginListener => &PLUGIN_LISTENER,
            Self::AsyncSpawnReplay => &ASYNC_SPAWN_REPLAY,
            Self::UnsafeAsync => &UNSAFE_ASYNC,
        }
    }

    /// Returns the stable snake-case name of this state.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TickBlock => "tick_block",
            Self::TickRandomBlock => "tick_random_block",
            Self::TickFluid => "tick_fluid",
            Self::TickEntity => "tick_entity",
            Self::TickTileEntity => "tick_tile_entity",
            Self::NeighborNotify => "neighbor_notify",
            Self::BlockEvent => "block_event",
            Self::ChunkLoad => "chunk_load",
            Self::TerrainGeneration => "terrain_generation",
            Self::Population => "population",
            Self::WorldSpawnerSpawning => "world_spawner_spawning",
            Self::PluginCommand => "plugin_command",
            Self::ScheduledTask => "scheduled_task",
            Self::PluginListener => "plugin_listener",
            Self::AsyncSpawnReplay => "async_spawn_replay",
            Self::UnsafeAsync => "unsafe_async",
        }
    }

    /// Dense index in `0..COUNT`, used for per-state counters.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns the state with the given name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.name() == name)
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
