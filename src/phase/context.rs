//! Per-activation capture area.
//!
//! A [`PhaseContext`] is created for one phase activation, receives the side
//! effects captured while that phase is on top of the stack, and is drained
//! by the state's processor when the phase completes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::state::PhaseState;

// ============================================================================
// World values
// ============================================================================

/// Integer block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[i32; 3]", into = "[i32; 3]")]
pub struct BlockPos {
    /// East-west coordinate
    pub x: i32,
    /// Vertical coordinate
    pub y: i32,
    /// North-south coordinate
    pub z: i32,
}

impl BlockPos {
    /// Creates a position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns this position shifted by the given deltas (saturating).
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
        }
    }
}

impl From<[i32; 3]> for BlockPos {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<BlockPos> for [i32; 3] {
    fn from(pos: BlockPos) -> Self {
        [pos.x, pos.y, pos.z]
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Namespaced block state id, e.g. `minecraft:stone`.
///
/// Ids without a namespace are treated as belonging to `minecraft`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockState(String);

impl BlockState {
    /// Creates a block state from its id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The air block.
    #[must_use]
    pub fn air() -> Self {
        Self::new("minecraft:air")
    }

    /// Returns the full id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }

    /// Returns whether this is air.
    #[must_use]
    pub fn is_air(&self) -> bool {
        matches!(self.0.as_str(), "minecraft:air" | "air")
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single captured block change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockChange {
    /// Where the change happens
    pub pos: BlockPos,
    /// State before the change
    pub original: BlockState,
    /// State after the change
    pub replacement: BlockState,
}

impl BlockChange {
    /// Creates a change record.
    #[must_use]
    pub const fn new(pos: BlockPos, original: BlockState, replacement: BlockState) -> Self {
        Self {
            pos,
            original,
            replacement,
        }
    }
}

impl fmt::Display for BlockChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.pos, self.original, self.replacement)
    }
}

/// A captured entity spawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedEntity {
    /// Namespaced entity type id, e.g. `minecraft:zombie`
    pub kind: String,
    /// Spawn position, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<BlockPos>,
}

impl CapturedEntity {
    /// Creates an entity record without a position.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            pos: None,
        }
    }

    /// Sets the spawn position.
    #[must_use]
    pub const fn at(mut self, pos: BlockPos) -> Self {
        self.pos = Some(pos);
        self
    }
}

impl fmt::Display for CapturedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pos {
            Some(pos) => write!(f, "{} @ {pos}", self.kind),
            None => f.write_str(&self.kind),
        }
    }
}

/// Something that caused a phase to be entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    /// A block at a position
    Block {
        /// Block state id
        state: BlockState,
        /// Block position
        pos: BlockPos,
    },
    /// An entity of a type
    Entity {
        /// Entity type id
        kind: String,
    },
    /// A plugin, by id
    Plugin(String),
    /// A command line
    Command(String),
    /// A world, by name
    World(String),
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block { state, pos } => write!(f, "block {state} at {pos}"),
            Self::Entity { kind } => write!(f, "entity {kind}"),
            Self::Plugin(id) => write!(f, "plugin {id}"),
            Self::Command(line) => write!(f, "command '{line}'"),
            Self::World(name) => write!(f, "world {name}"),
        }
    }
}

/// What sent a neighbor notification whose source block was missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifierOrigin {
    /// A plain block; nothing else is known about the sender.
    Block,
    /// A tile entity of a known type.
    Tile {
        /// Tile entity type id
        kind: String,
        /// Whether the tile's own block was used to recover the source
        recovered_from_tile: bool,
    },
    /// A tile entity that could not be identified.
    UnknownTile,
}

/// A neighbor notification the host sent out without a source block.
///
/// The host recovers a stand-in source (usually the block at the source
/// position) and reports the notification so it can be traced back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullSourceNotification {
    /// Position the notification was sent from
    pub source_pos: BlockPos,
    /// Block used in place of the missing source
    pub recovered: BlockState,
    /// Position being notified
    pub notified_pos: BlockPos,
    /// Sender, as far as the host could tell
    pub origin: NotifierOrigin,
}

impl NullSourceNotification {
    /// A notification from an unidentified plain block.
    #[must_use]
    pub const fn from_block(source_pos: BlockPos, recovered: BlockState, notified_pos: BlockPos) -> Self {
        Self {
            source_pos,
            recovered,
            notified_pos,
            origin: NotifierOrigin::Block,
        }
    }

    /// Replaces the sender.
    #[must_use]
    pub fn with_origin(mut self, origin: NotifierOrigin) -> Self {
        self.origin = origin;
        self
    }
}

// ============================================================================
// PhaseContext
// ============================================================================

/// Capture area and owner metadata for one phase activation.
///
/// The context is opened by `PhaseTracker::switch_to`, filled by the capture
/// hooks while its phase is on top, and drained when the phase completes.
/// A drained context must hold no captures; anything left over is reported.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    state: PhaseState,
    source: Option<Cause>,
    causes: Vec<Cause>,
    blocks: Vec<BlockChange>,
    entities: Vec<CapturedEntity>,
    open: bool,
    depth: usize,
    halted: bool,
}

impl PhaseContext {
    /// Creates an unopened context for `state`.
    #[must_use]
    pub const fn new(state: PhaseState) -> Self {
        Self {
            state,
            source: None,
            causes: Vec::new(),
            blocks: Vec::new(),
            entities: Vec::new(),
            open: false,
            depth: 0,
            halted: false,
        }
    }

    /// Sets the direct source of this activation.
    #[must_use]
    pub fn with_source(mut self, source: Cause) -> Self {
        self.source = Some(source);
        self
    }

    /// Appends an indirect cause.
    #[must_use]
    pub fn with_cause(mut self, cause: Cause) -> Self {
        self.causes.push(cause);
        self
    }

    /// Returns the owning state.
    #[must_use]
    pub const fn state(&self) -> PhaseState {
        self.state
    }

    /// Returns the direct source, if any.
    #[must_use]
    pub const fn source(&self) -> Option<&Cause> {
        self.source.as_ref()
    }

    /// Returns the full cause chain: source first, then indirect causes.
    pub fn cause_chain(&self) -> impl Iterator<Item = &Cause> {
        self.source.iter().chain(self.causes.iter())
    }

    /// Returns the captured block changes in capture order.
    #[must_use]
    pub fn captured_blocks(&self) -> &[BlockChange] {
        &self.blocks
    }

    /// Returns the captured entities in capture order.
    #[must_use]
    pub fn captured_entities(&self) -> &[CapturedEntity] {
        &self.entities
    }

    /// Records a block change.
    ///
    /// Capture hooks on the tracker call this after checking policy and
    /// capability flags; calling it directly bypasses those checks.
    pub fn capture_block_change(&mut self, change: BlockChange) {
        self.blocks.push(change);
    }

    /// Records an entity spawn. See [`capture_block_change`](Self::capture_block_change).
    pub fn capture_entity(&mut self, entity: CapturedEntity) {
        self.entities.push(entity);
    }

    /// Removes and returns all captured block changes.
    pub fn take_blocks(&mut self) -> Vec<BlockChange> {
        std::mem::take(&mut self.blocks)
    }

    /// Removes and returns all captured entities.
    pub fn take_entities(&mut self) -> Vec<CapturedEntity> {
        std::mem::take(&mut self.entities)
    }

    /// Returns whether anything is still captured.
    #[must_use]
    pub fn has_captures(&self) -> bool {
        !self.blocks.is_empty() || !self.entities.is_empty()
    }

    /// Number of captured objects of any kind.
    #[must_use]
    pub fn capture_count(&self) -> usize {
        self.blocks.len() + self.entities.len()
    }

    /// Drops every capture.
    pub fn clear_captures(&mut self) {
        self.blocks.clear();
        self.entities.clear();
    }

    /// Returns whether the context is between switch and completion.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Processing depth assigned when the context was opened.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Returns whether the depth guard truncated this activation.
    ///
    /// A halted context accepts no captures and is not processed.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    pub(crate) const fn open(&mut self, depth: usize) {
        self.open = true;
        self.depth = depth;
    }

    pub(crate) const fn halt(&mut self) {
        self.halted = true;
    }

    pub(crate) const fn close(&mut self) {
        self.open = false;
    }
}
