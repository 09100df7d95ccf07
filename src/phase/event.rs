//! Outward events posted to the host when captures are processed.
//!
//! Listeners on the host side may cancel a whole event or invalidate single
//! block transactions; processors skip anything cancelled or invalid.

use serde::Serialize;

use super::context::{BlockChange, BlockPos, BlockState, CapturedEntity, Cause};
use super::state::PhaseState;

/// One block transaction inside a [`ChangeBlockEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockTransaction {
    /// Position of the change
    pub pos: BlockPos,
    /// State before
    pub original: BlockState,
    /// State after
    pub replacement: BlockState,
    /// Cleared by a listener to drop just this change
    pub valid: bool,
}

impl From<BlockChange> for BlockTransaction {
    fn from(change: BlockChange) -> Self {
        Self {
            pos: change.pos,
            original: change.original,
            replacement: change.replacement,
            valid: true,
        }
    }
}

impl BlockTransaction {
    /// Converts back to the change applied to the world.
    #[must_use]
    pub fn to_change(&self) -> BlockChange {
        BlockChange::new(self.pos, self.original.clone(), self.replacement.clone())
    }
}

/// Block changes produced by one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeBlockEvent {
    /// Phase the changes were captured in
    pub phase: PhaseState,
    /// Cause chain of that phase, source first
    pub causes: Vec<Cause>,
    /// Captured transactions in capture order
    pub transactions: Vec<BlockTransaction>,
    /// Set by a listener to drop every transaction
    pub cancelled: bool,
}

/// Entity spawns produced by one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnEntityEvent {
    /// Phase the entities were captured in
    pub phase: PhaseState,
    /// Cause chain of that phase, source first
    pub causes: Vec<Cause>,
    /// Captured entities in capture order
    pub entities: Vec<CapturedEntity>,
    /// Set by a listener to drop every entity
    pub cancelled: bool,
}

/// An event posted to the host's event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldEvent {
    /// Block changes
    ChangeBlock(ChangeBlockEvent),
    /// Entity spawns
    SpawnEntity(SpawnEntityEvent),
}

impl WorldEvent {
    /// Builds a block event from captured changes.
    #[must_use]
    pub fn change_block(phase: PhaseState, causes: Vec<Cause>, changes: Vec<BlockChange>) -> Self {
        Self::ChangeBlock(ChangeBlockEvent {
            phase,
            causes,
            transactions: changes.into_iter().map(BlockTransaction::from).collect(),
            cancelled: false,
        })
    }

    /// Builds a spawn event from captured entities.
    #[must_use]
    pub const fn spawn_entity(
        phase: PhaseState,
        causes: Vec<Cause>,
        entities: Vec<CapturedEntity>,
    ) -> Self {
        Self::SpawnEntity(SpawnEntityEvent {
            phase,
            causes,
            entities,
            cancelled: false,
        })
    }

    /// Phase that produced the event.
    #[must_use]
    pub const fn phase(&self) -> PhaseState {
        match self {
            Self::ChangeBlock(e) => e.phase,
            Self::SpawnEntity(e) => e.phase,
        }
    }

    /// Returns whether a listener cancelled the event.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        match self {
            Self::ChangeBlock(e) => e.cancelled,
            Self::SpawnEntity(e) => e.cancelled,
        }
    }

    /// Cancels the event.
    pub const fn cancel(&mut self) {
        match self {
            Self::ChangeBlock(e) => e.cancelled = true,
            Self::SpawnEntity(e) => e.cancelled = true,
        }
    }

    /// Number of objects carried by the event.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::ChangeBlock(e) => e.transactions.len(),
            Self::SpawnEntity(e) => e.entities.len(),
        }
    }

    /// Returns whether the event carries nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
