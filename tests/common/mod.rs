//! Shared integration-test harness: running the `phase-tracker` binary and
//! building trackers over a simulated world.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::Arc;

use phase_tracker::config::{ConfigHandle, TrackerConfig};
use phase_tracker::diagnostics::MemorySink;
use phase_tracker::phase::{BlockChange, BlockPos, BlockState, PhaseTracker};
use phase_tracker::sim::{SimWorld, SimWorldConfig};

/// The `phase-tracker` binary under test.
pub struct PhaseTrackerCli;

impl PhaseTrackerCli {
    /// Runs the binary with `args` and waits for it to exit.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_command(args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_phase-tracker"))
            .args(args)
            .env_remove("PHASE_TRACKER_LOG_LEVEL")
            .env_remove("PHASE_TRACKER_CONFIG")
            .env("NO_COLOR", "1")
            .output()
            .expect("failed to run phase-tracker")
    }

    /// Returns the path to a test fixture.
    #[must_use]
    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }
}

/// Tracker over an empty world with default settings.
pub fn tracker() -> (PhaseTracker<SimWorld>, Arc<MemorySink>) {
    tracker_with(TrackerConfig::default(), SimWorldConfig::default())
}

/// Tracker over a world described by `world`, configured by `config`.
pub fn tracker_with(
    config: TrackerConfig,
    world: SimWorldConfig,
) -> (PhaseTracker<SimWorld>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let tracker = PhaseTracker::new(SimWorld::new(world), ConfigHandle::new(config), sink.clone());
    (tracker, sink)
}

/// Parses a YAML world description.
#[allow(clippy::missing_panics_doc)]
pub fn world(yaml: &str) -> SimWorldConfig {
    serde_yaml::from_str(yaml).expect("invalid world yaml")
}

/// Change placing `id` over air at `(x, y, z)`.
pub fn place(x: i32, y: i32, z: i32, id: &str) -> BlockChange {
    BlockChange::new(BlockPos::new(x, y, z), BlockState::air(), BlockState::new(id))
}
