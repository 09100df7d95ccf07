//! In-memory world used by the scenario runner and tests.
//!
//! [`SimWorld`] implements [`EngineHost`] over a block map and an entity
//! list. Listener behavior (cancellation), host refusals and cascades are
//! all driven by [`SimWorldConfig`], so a scenario file can describe them.

use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::observability::events::{Event, EventEmitter};
use crate::phase::context::{BlockChange, BlockPos, BlockState, CapturedEntity};
use crate::phase::event::WorldEvent;
use crate::phase::host::EngineHost;

// ============================================================================
// Configuration
// ============================================================================

/// Initial world contents and listener rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimWorldConfig {
    /// Blocks present before the first step.
    pub blocks: Vec<PlacedBlock>,

    /// Block ids whose change transactions listeners invalidate.
    pub cancel_blocks: Vec<String>,

    /// Entity kinds listeners remove from spawn events.
    pub cancel_entities: Vec<String>,

    /// Block ids the world refuses to place.
    pub reject_blocks: Vec<String>,

    /// Entity kinds the world refuses to spawn.
    pub reject_entities: Vec<String>,

    /// Follow-up changes triggered by placing a block.
    pub cascades: Vec<CascadeRule>,
}

/// A block at a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlacedBlock {
    pub pos: BlockPos,
    pub state: BlockState,
}

/// When `when` is placed, each entry in `place` is set relative to it.
///
/// A rule whose placements include its own block id at a non-zero offset
/// chains indefinitely and is bounded only by the depth ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CascadeRule {
    /// Block id that triggers the rule.
    pub when: String,
    /// Relative placements.
    pub place: Vec<CascadeStep>,
}

/// One relative placement of a [`CascadeRule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CascadeStep {
    /// Offset from the triggering block.
    pub offset: [i32; 3],
    /// Block to place.
    pub state: BlockState,
}

// ============================================================================
// World
// ============================================================================

/// In-memory [`EngineHost`].
#[derive(Debug, Default)]
pub struct SimWorld {
    config: SimWorldConfig,
    blocks: IndexMap<BlockPos, BlockState>,
    entities: Vec<CapturedEntity>,
    posted: Vec<WorldEvent>,
    applied: usize,
    emitter: Option<Arc<EventEmitter>>,
}

impl SimWorld {
    /// Builds a world from its description.
    #[must_use]
    pub fn new(config: SimWorldConfig) -> Self {
        let blocks = config
            .blocks
            .iter()
            .map(|b| (b.pos, b.state.clone()))
            .collect();
        Self {
            config,
            blocks,
            ..Self::default()
        }
    }

    /// Mirrors every posted event to `emitter`.
    #[must_use]
    pub fn with_emitter(mut self, emitter: Arc<EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Block at `pos`; unset positions are air.
    #[must_use]
    pub fn block_at(&self, pos: BlockPos) -> BlockState {
        self.blocks.get(&pos).cloned().unwrap_or_else(BlockState::air)
    }

    /// Non-air blocks in placement order.
    pub fn blocks(&self) -> impl Iterator<Item = (&BlockPos, &BlockState)> {
        self.blocks.iter().filter(|(_, s)| !s.is_air())
    }

    /// Entities spawned so far.
    #[must_use]
    pub fn entities(&self) -> &[CapturedEntity] {
        &self.entities
    }

    /// Events as listeners left them.
    #[must_use]
    pub fn posted_events(&self) -> &[WorldEvent] {
        &self.posted
    }

    /// Block changes applied, including direct ones.
    #[must_use]
    pub const fn changes_applied(&self) -> usize {
        self.applied
    }

    /// Applies a change outside the tracker, the way the engine does for
    /// passthrough captures. Cascades are not followed.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::BlockRejected`] for rejected block ids.
    pub fn apply_direct(&mut self, change: &BlockChange) -> Result<(), HostError> {
        self.set_block(change).map(|_| ())
    }

    /// Spawns an entity outside the tracker.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::EntityRejected`] for rejected kinds.
    pub fn spawn_direct(&mut self, entity: &CapturedEntity) -> Result<(), HostError> {
        self.spawn_entity(entity)
    }

    fn set_block(&mut self, change: &BlockChange) -> Result<bool, HostError> {
        let id = change.replacement.id();
        if self.config.reject_blocks.iter().any(|b| b == id) {
            return Err(HostError::BlockRejected {
                pos: change.pos,
                reason: format!("'{id}' is not placeable here"),
            });
        }
        self.applied += 1;
        let previous = self.blocks.insert(change.pos, change.replacement.clone());
        Ok(previous.as_ref() != Some(&change.replacement))
    }

    fn cascade(&self, change: &BlockChange) -> Vec<BlockChange> {
        let id = change.replacement.id();
        self.config
            .cascades
            .iter()
            .filter(|rule| rule.when == id)
            .flat_map(|rule| &rule.place)
            .map(|step| {
                let [dx, dy, dz] = step.offset;
                let pos = change.pos.offset(dx, dy, dz);
                BlockChange::new(pos, self.block_at(pos), step.state.clone())
            })
            .collect()
    }
}

impl EngineHost for SimWorld {
    fn post_event(&mut self, event: &mut WorldEvent) {
        match event {
            WorldEvent::ChangeBlock(e) => {
                for tx in &mut e.transactions {
                    if self.config.cancel_blocks.iter().any(|b| b == tx.replacement.id()) {
                        tx.valid = false;
                    }
                }
                if !e.transactions.is_empty() && e.transactions.iter().all(|t| !t.valid) {
                    e.cancelled = true;
                }
            }
            WorldEvent::SpawnEntity(e) => {
                let before = e.entities.len();
                e.entities
                    .retain(|ent| !self.config.cancel_entities.contains(&ent.kind));
                if before > 0 && e.entities.is_empty() {
                    e.cancelled = true;
                }
            }
        }

        if let Some(emitter) = &self.emitter {
            emitter.emit(Event::WorldEventPosted {
                timestamp: Utc::now(),
                event: event.clone(),
            });
        }
        self.posted.push(event.clone());
    }

    fn apply_block_change(&mut self, change: &BlockChange) -> Result<Vec<BlockChange>, HostError> {
        if self.set_block(change)? {
            Ok(self.cascade(change))
        } else {
            // unchanged blocks notify nobody
            Ok(Vec::new())
        }
    }

    fn spawn_entity(&mut self, entity: &CapturedEntity) -> Result<(), HostError> {
        if self.config.reject_entities.contains(&entity.kind) {
            return Err(HostError::EntityRejected {
                kind: entity.kind.clone(),
                reason: "spawning disabled for this kind".to_owned(),
            });
        }
        self.entities.push(entity.clone());
        Ok(())
    }
}
