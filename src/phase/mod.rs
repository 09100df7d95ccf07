//! Phase tracking.
//!
//! A phase is one activation of an engine operation (a block tick, a chunk
//! load, a plugin command). Phases nest on a stack; side effects raised
//! while a phase is on top are captured into its [`PhaseContext`] and
//! processed when the phase completes.

pub mod async_spawn;
pub mod context;
pub mod event;
pub mod host;
pub mod process;
pub mod stack;
pub mod state;
pub mod tracker;
pub mod unwind;

pub use async_spawn::AsyncSpawner;
pub use context::{
    BlockChange, BlockPos, BlockState, CapturedEntity, Cause, NotifierOrigin, NullSourceNotification,
    PhaseContext,
};
pub use event::{BlockTransaction, ChangeBlockEvent, SpawnEntityEvent, WorldEvent};
pub use host::EngineHost;
pub use process::{PhaseProcessor, ProcessScope, processor_for};
pub use stack::PhaseStack;
pub use state::{Nesting, PhaseGroup, PhasePolicy, PhaseState, Processing};
pub use tracker::{CaptureOutcome, PhaseTracker};
pub use unwind::PanicTrace;
