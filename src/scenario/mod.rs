//! Scenario scripts.
//!
//! A scenario drives a [`PhaseTracker`](crate::phase::PhaseTracker) over a
//! [`SimWorld`](crate::sim::SimWorld) from a YAML script, standing in for
//! the engine's instrumentation points.

pub mod builtin;
pub mod runner;
pub mod script;

pub use builtin::{
    BuiltinScenario, ScenarioCategory, find_scenario, list_scenario_names, list_scenarios,
    load_builtin, suggest_scenario,
};
pub use runner::{CaptureCounts, RunOptions, RunSummary, run};
pub use script::{Scenario, Step};
