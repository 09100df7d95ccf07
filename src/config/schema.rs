//! Configuration schema.
//!
//! Serde types for the tracker configuration document. Every field has a
//! default, so an empty mapping is a valid configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// Root
// ============================================================================

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Tracker limits and diagnostic verbosity.
    pub phase_tracker: PhaseTrackerSettings,

    /// Per-mod capability overrides for block types.
    pub block_tracker: TrackerCategory,

    /// Per-mod capability overrides for entity types.
    pub entity_tracker: TrackerCategory,
}

// ============================================================================
// Phase Tracker Settings
// ============================================================================

/// Limits and verbosity flags read on every anomaly check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhaseTrackerSettings {
    /// Ceiling for recursive processing depth per state.
    pub max_block_processing_depth: usize,

    /// How many runaway-phase reports are printed before they are muted.
    pub max_runaway_phase_count: usize,

    /// Disables every report suppression.
    pub verbose: bool,

    /// Repeats some otherwise one-shot reports.
    pub verbose_errors: bool,

    /// Queue off-thread entity spawns for replay instead of dropping them.
    pub capture_entities_async: bool,
}

impl PhaseTrackerSettings {
    /// Legacy depth ceiling that is migrated for neighbor notifications.
    pub const LEGACY_MAX_DEPTH: usize = 100;

    /// Depth ceiling neighbor notifications are raised to on first breach.
    pub const NEIGHBOR_NOTIFY_MAX_DEPTH: usize = 1000;
}

impl Default for PhaseTrackerSettings {
    fn default() -> Self {
        Self {
            max_block_processing_depth: Self::LEGACY_MAX_DEPTH,
            max_runaway_phase_count: 3,
            verbose: false,
            verbose_errors: false,
            capture_entities_async: true,
        }
    }
}

// ============================================================================
// Capability Overrides
// ============================================================================

/// Capability overrides for one category (blocks or entities), keyed by mod id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerCategory {
    /// Per-mod settings. Mods not listed use the defaults.
    pub mods: IndexMap<String, ModTrackerCategory>,
}

/// Capability overrides for one mod.
///
/// Each map is keyed by the path part of the id (`stone` for
/// `minecraft:stone`). Ids missing from a map default to `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModTrackerCategory {
    /// When `false`, every flag is `false` for every id of this mod.
    pub enabled: bool,

    /// Whether block changes may be captured in bulk.
    pub block_bulk_capture: IndexMap<String, bool>,

    /// Whether entity spawns may be captured in bulk.
    pub entity_bulk_capture: IndexMap<String, bool>,

    /// Whether block events may be created.
    pub block_event_creation: IndexMap<String, bool>,

    /// Whether entity events may be created.
    pub entity_event_creation: IndexMap<String, bool>,
}

impl Default for ModTrackerCategory {
    fn default() -> Self {
        Self {
            enabled: true,
            block_bulk_capture: IndexMap::new(),
            entity_bulk_capture: IndexMap::new(),
            block_event_creation: IndexMap::new(),
            entity_event_creation: IndexMap::new(),
        }
    }
}
