//! Built-in scenarios.
//!
//! Scenario scripts embedded in the binary at compile time, so
//! `phase-tracker simulate --builtin redstone-chain` works with no files.

use std::fmt;
use std::sync::LazyLock;

use crate::error::ScenarioError;

use super::script::Scenario;

// ============================================================================
// Types
// ============================================================================

/// A scenario embedded in the binary.
pub struct BuiltinScenario {
    /// Unique identifier (kebab-case, e.g., "redstone-chain").
    pub name: &'static str,

    /// Short human-readable description.
    pub description: &'static str,

    /// Category for organization.
    pub category: ScenarioCategory,

    /// Tags for filtering.
    pub tags: &'static [&'static str],

    /// Raw YAML content (embedded at compile time).
    pub yaml: &'static str,
}

impl BuiltinScenario {
    /// Parses the embedded script.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Parse`] if the embedded YAML is invalid.
    pub fn parse(&self) -> Result<Scenario, ScenarioError> {
        Scenario::from_yaml(self.yaml, self.name)
    }
}

/// Category for organizing built-in scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioCategory {
    /// Ordinary capture and processing.
    Processing,
    /// Stack misuse: mismatches, runaways, illegal nesting.
    Protocol,
    /// Depth ceilings and cascades.
    Limits,
    /// Off-thread access.
    Async,
}

impl ScenarioCategory {
    /// Returns the human-readable title-case label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Processing => "Processing",
            Self::Protocol => "Protocol",
            Self::Limits => "Limits",
            Self::Async => "Async",
        }
    }

    /// Returns all category variants in display order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Processing, Self::Protocol, Self::Limits, Self::Async]
    }
}

impl fmt::Display for ScenarioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Protocol => write!(f, "protocol"),
            Self::Limits => write!(f, "limits"),
            Self::Async => write!(f, "async"),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

static BUILTIN_SCENARIOS: LazyLock<Vec<BuiltinScenario>> = LazyLock::new(|| {
    vec![
        BuiltinScenario {
            name: "block-tick",
            description: "Block tick capturing blocks and entities, one listener cancelling TNT",
            category: ScenarioCategory::Processing,
            tags: &["tick", "immediate", "cancellation"],
            yaml: include_str!("../../scenarios/block-tick.yaml"),
        },
        BuiltinScenario {
            name: "plugin-command-batch",
            description: "Plugin command batching its block changes into one event",
            category: ScenarioCategory::Processing,
            tags: &["plugin", "batched", "cancellation"],
            yaml: include_str!("../../scenarios/plugin-command-batch.yaml"),
        },
        BuiltinScenario {
            name: "mismatched-completion",
            description: "Wrong-state and empty-stack completions, illegal nesting, tick-end cleanup",
            category: ScenarioCategory::Protocol,
            tags: &["mismatch", "nesting", "tick-end"],
            yaml: include_str!("../../scenarios/mismatched-completion.yaml"),
        },
        BuiltinScenario {
            name: "runaway-recursion",
            description: "Non-reentrant entity tick entered recursively",
            category: ScenarioCategory::Protocol,
            tags: &["runaway", "recursion"],
            yaml: include_str!("../../scenarios/runaway-recursion.yaml"),
        },
        BuiltinScenario {
            name: "redstone-chain",
            description: "Self-propagating neighbor notifications hitting the depth ceiling",
            category: ScenarioCategory::Limits,
            tags: &["depth", "neighbor-notify", "cascade"],
            yaml: include_str!("../../scenarios/redstone-chain.yaml"),
        },
        BuiltinScenario {
            name: "async-entities",
            description: "Worker threads spawning entities and changing blocks",
            category: ScenarioCategory::Async,
            tags: &["async", "replay", "rejection"],
            yaml: include_str!("../../scenarios/async-entities.yaml"),
        },
    ]
});

// ============================================================================
// Public API
// ============================================================================

/// Look up a scenario by exact name.
#[must_use]
pub fn find_scenario(name: &str) -> Option<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS.iter().find(|s| s.name == name)
}

/// Look up and parse a scenario, suggesting a close name on a miss.
///
/// # Errors
///
/// Returns [`ScenarioError::UnknownBuiltin`] for an unknown name, or
/// [`ScenarioError::Parse`] if the embedded YAML is invalid.
pub fn load_builtin(name: &str) -> Result<Scenario, ScenarioError> {
    find_scenario(name)
        .ok_or_else(|| ScenarioError::UnknownBuiltin {
            name: name.to_owned(),
            suggestion: suggest_scenario(name),
        })?
        .parse()
}

/// List all scenarios, optionally filtered by category and/or tag.
#[must_use]
pub fn list_scenarios(
    category: Option<ScenarioCategory>,
    tag: Option<&str>,
) -> Vec<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS
        .iter()
        .filter(|s| category.is_none_or(|c| s.category == c))
        .filter(|s| tag.is_none_or(|t| s.tags.contains(&t)))
        .collect()
}

/// Suggest a similar scenario name for typo correction.
///
/// Returns the closest match if its Damerau-Levenshtein distance is ≤ 3.
#[must_use]
pub fn suggest_scenario(input: &str) -> Option<String> {
    BUILTIN_SCENARIOS
        .iter()
        .map(|s| (s.name, strsim::damerau_levenshtein(input, s.name)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name.to_string())
}

/// Returns all scenario names in registry order.
#[must_use]
pub fn list_scenario_names() -> Vec<&'static str> {
    BUILTIN_SCENARIOS.iter().map(|s| s.name).collect()
}

// ============================================================================
// Tests
// ============================================================================
