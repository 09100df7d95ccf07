//! Per-type capability flags.
//!
//! Before a block change or entity spawn is captured, the tracker asks
//! whether the type allows bulk capture; processors ask whether events may
//! be created for it. Flags come from the per-mod overrides in the
//! `block_tracker` and `entity_tracker` configuration sections.

use crate::config::schema::{ModTrackerCategory, TrackerCategory, TrackerConfig};
use crate::phase::context::BlockState;

/// Namespace assumed for ids without one.
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// Resolved capability flags for one block or entity type.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityFlags {
    /// Block changes may be captured in bulk.
    pub block_bulk_capture: bool,
    /// Entity spawns may be captured in bulk.
    pub entity_bulk_capture: bool,
    /// Block events may be created.
    pub block_event_creation: bool,
    /// Entity events may be created.
    pub entity_event_creation: bool,
}

impl CapabilityFlags {
    /// Every capability enabled.
    pub const ALL: Self = Self {
        block_bulk_capture: true,
        entity_bulk_capture: true,
        block_event_creation: true,
        entity_event_creation: true,
    };

    /// Every capability disabled.
    pub const NONE: Self = Self {
        block_bulk_capture: false,
        entity_bulk_capture: false,
        block_event_creation: false,
        entity_event_creation: false,
    };
}

impl Default for CapabilityFlags {
    fn default() -> Self {
        Self::ALL
    }
}

/// Source of capability flags.
pub trait CapabilityQuery: Send + Sync {
    /// Flags for a block state.
    fn block_flags(&self, state: &BlockState) -> CapabilityFlags;

    /// Flags for an entity type id.
    fn entity_flags(&self, kind: &str) -> CapabilityFlags;
}

/// Splits `mod:path` into its parts, defaulting the namespace.
#[must_use]
pub fn split_id(id: &str) -> (&str, &str) {
    id.split_once(':').unwrap_or((DEFAULT_NAMESPACE, id))
}

/// Capability flags resolved from a configuration snapshot.
#[derive(Debug, Clone, Default)]
pub struct ConfigCapabilities {
    blocks: TrackerCategory,
    entities: TrackerCategory,
}

impl ConfigCapabilities {
    /// Builds the query from the two tracker sections of `config`.
    #[must_use]
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            blocks: config.block_tracker.clone(),
            entities: config.entity_tracker.clone(),
        }
    }

    fn resolve(category: &TrackerCategory, id: &str) -> CapabilityFlags {
        let (mod_id, path) = split_id(id);
        category
            .mods
            .get(mod_id)
            .map_or(CapabilityFlags::ALL, |settings| Self::resolve_mod(settings, path))
    }

    fn resolve_mod(settings: &ModTrackerCategory, path: &str) -> CapabilityFlags {
        if !settings.enabled {
            return CapabilityFlags::NONE;
        }
        let flag = |map: &indexmap::IndexMap<String, bool>| map.get(path).copied().unwrap_or(true);
        CapabilityFlags {
            block_bulk_capture: flag(&settings.block_bulk_capture),
            entity_bulk_capture: flag(&settings.entity_bulk_capture),
            block_event_creation: flag(&settings.block_event_creation),
            entity_event_creation: flag(&settings.entity_event_creation),
        }
    }
}

impl CapabilityQuery for ConfigCapabilities {
    fn block_flags(&self, state: &BlockState) -> CapabilityFlags {
        Self::resolve(&self.blocks, state.id())
    }

    fn entity_flags(&self, kind: &str) -> CapabilityFlags {
        Self::resolve(&self.entities, kind)
    }
}

/// Every type gets every capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl CapabilityQuery for AllowAll {
    fn block_flags(&self, _state: &BlockState) -> CapabilityFlags {
        CapabilityFlags::ALL
    }

    fn entity_flags(&self, _kind: &str) -> CapabilityFlags {
        CapabilityFlags::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(yaml: &str) -> ConfigCapabilities {
        let config: TrackerConfig = serde_yaml::from_str(yaml).unwrap();
        ConfigCapabilities::from_config(&config)
    }

    #[test]
    fn test_split_id() {
        assert_eq!(split_id("examplemod:noisy_block"), ("examplemod", "noisy_block"));
        assert_eq!(split_id("stone"), ("minecraft", "stone"));
    }

    #[test]
    fn test_unknown_mod_allows_everything() {
        let caps = config("{}");
        assert_eq!(
            caps.block_flags(&BlockState::new("othermod:thing")),
            CapabilityFlags::ALL
        );
    }

    #[test]
    fn test_disabled_mod_disables_all_flags() {
        let caps = config("entity_tracker:\n  mods:\n    examplemod:\n      enabled: false\n");
        assert_eq!(caps.entity_flags("examplemod:golem"), CapabilityFlags::NONE);
        assert_eq!(caps.entity_flags("minecraft:pig"), CapabilityFlags::ALL);
    }

    #[test]
    fn test_per_id_override() {
        let caps = config(
            "block_tracker:\n  mods:\n    examplemod:\n      block_bulk_capture: { noisy_block: false }\n",
        );
        let noisy = caps.block_flags(&BlockState::new("examplemod:noisy_block"));
        assert!(!noisy.block_bulk_capture);
        assert!(noisy.block_event_creation);
        let quiet = caps.block_flags(&BlockState::new("examplemod:quiet_block"));
        assert!(quiet.block_bulk_capture);
    }

    #[test]
    fn test_bare_ids_resolve_to_default_namespace() {
        let caps = config(
            "block_tracker:\n  mods:\n    minecraft:\n      block_event_creation: { stone: false }\n",
        );
        assert!(!caps.block_flags(&BlockState::new("stone")).block_event_creation);
        assert!(!caps.block_flags(&BlockState::new("minecraft:stone")).block_event_creation);
    }
}
