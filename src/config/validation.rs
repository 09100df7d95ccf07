//! Configuration validation.
//!
//! Semantic checks run after deserialization. Validation collects every
//! issue rather than stopping at the first one.

use crate::config::schema::{TrackerCategory, TrackerConfig};
use crate::error::{Severity, ValidationIssue};

/// Depth ceilings above this are accepted but flagged.
const SUSPICIOUS_DEPTH: usize = 10_000;

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns the result.
    pub fn validate(&mut self, config: &TrackerConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_settings(config);
        self.validate_category("block_tracker", &config.block_tracker);
        self.validate_category("entity_tracker", &config.entity_tracker);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Checks
    // ========================================================================

    fn validate_settings(&mut self, config: &TrackerConfig) {
        let settings = &config.phase_tracker;

        if settings.max_block_processing_depth == 0 {
            self.add_error(
                "phase_tracker.max_block_processing_depth",
                "must be at least 1",
            );
        } else if settings.max_block_processing_depth > SUSPICIOUS_DEPTH {
            self.add_warning(
                "phase_tracker.max_block_processing_depth",
                &format!(
                    "{} is unusually high (> {SUSPICIOUS_DEPTH}); runaway recursion may exhaust the host",
                    settings.max_block_processing_depth
                ),
            );
        }

        if settings.max_runaway_phase_count == 0 {
            self.add_error("phase_tracker.max_runaway_phase_count", "must be at least 1");
        }

        if settings.verbose_errors && settings.verbose {
            self.add_warning(
                "phase_tracker.verbose_errors",
                "has no additional effect while verbose is enabled",
            );
        }
    }

    fn validate_category(&mut self, section: &str, category: &TrackerCategory) {
        for (mod_id, settings) in &category.mods {
            let path = format!("{section}.mods.{mod_id}");
            if mod_id.trim().is_empty() {
                self.add_error(&path, "mod id cannot be empty");
            } else if mod_id.contains(':') {
                self.add_error(&path, "mod id cannot contain ':'");
            }

            let maps = [
                ("block_bulk_capture", &settings.block_bulk_capture),
                ("entity_bulk_capture", &settings.entity_bulk_capture),
                ("block_event_creation", &settings.block_event_creation),
                ("entity_event_creation", &settings.entity_event_creation),
            ];
            for (name, map) in maps {
                if !settings.enabled && !map.is_empty() {
                    self.add_warning(
                        &format!("{path}.{name}"),
                        "overrides are ignored because the mod is disabled",
                    );
                }
                for id in map.keys() {
                    if id.contains(':') {
                        self.add_error(
                            &format!("{path}.{name}.{id}"),
                            "keys are id paths without the mod namespace",
                        );
                    }
                }
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}
