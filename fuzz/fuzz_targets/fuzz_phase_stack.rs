#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use phase_tracker::config::{ConfigHandle, TrackerConfig};
use phase_tracker::diagnostics::MemorySink;
use phase_tracker::phase::{
    BlockChange, BlockPos, BlockState, CapturedEntity, PhaseContext, PhaseState, PhaseTracker,
};
use phase_tracker::sim::{SimWorld, SimWorldConfig};

// Each byte is one operation: the low two bits pick switch, complete,
// capture block or spawn entity; the rest pick the state.
fuzz_target!(|data: &[u8]| {
    let mut tracker = PhaseTracker::new(
        SimWorld::new(SimWorldConfig::default()),
        ConfigHandle::new(TrackerConfig::default()),
        Arc::new(MemorySink::new()),
    );

    for (i, byte) in data.iter().enumerate() {
        let state = PhaseState::ALL[usize::from(byte >> 2) % PhaseState::COUNT];
        let x = i32::try_from(i).unwrap_or(i32::MAX);
        match byte & 0b11 {
            0 => {
                let _ = tracker.switch_to(PhaseContext::new(state));
            }
            1 => {
                let _ = tracker.complete_phase(state);
            }
            2 => {
                let change = BlockChange::new(
                    BlockPos::new(x, 64, 0),
                    BlockState::air(),
                    BlockState::new("minecraft:stone"),
                );
                let _ = tracker.capture_block_change(change);
            }
            _ => {
                let _ = tracker.capture_entity_spawn(CapturedEntity::new("minecraft:pig"));
            }
        }
    }

    tracker.end_tick();
    assert!(tracker.stack().is_empty());
});
