//! Engine-side seam used when captured side effects are replayed.

use crate::error::HostError;

use super::context::{BlockChange, CapturedEntity};
use super::event::WorldEvent;

/// The engine the tracker drives.
///
/// Processors post outward events through this trait and then apply whatever
/// survived cancellation. The tracker never touches world state directly.
pub trait EngineHost {
    /// Posts an event to listeners. Listeners may cancel it or invalidate
    /// individual transactions in place.
    fn post_event(&mut self, event: &mut WorldEvent);

    /// Applies one block change to the world.
    ///
    /// Returns the follow-up changes the world produced in reaction
    /// (neighbor updates, fluid flow). The tracker replays those as nested
    /// neighbor notifications.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::BlockRejected`] when the world refuses the change.
    fn apply_block_change(&mut self, change: &BlockChange) -> Result<Vec<BlockChange>, HostError>;

    /// Spawns one entity into the world.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::EntityRejected`] when the world refuses the spawn.
    fn spawn_entity(&mut self, entity: &CapturedEntity) -> Result<(), HostError>;
}

impl<H: EngineHost + ?Sized> EngineHost for Box<H> {
    fn post_event(&mut self, event: &mut WorldEvent) {
        (**self).post_event(event);
    }

    fn apply_block_change(&mut self, change: &BlockChange) -> Result<Vec<BlockChange>, HostError> {
        (**self).apply_block_change(change)
    }

    fn spawn_entity(&mut self, entity: &CapturedEntity) -> Result<(), HostError> {
        (**self).spawn_entity(entity)
    }
}
