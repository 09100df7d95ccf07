//! Live configuration snapshot with optional write-back.

use std::path::{Path, PathBuf};

use crate::config::loader::ConfigLoader;
use crate::config::schema::{PhaseTrackerSettings, TrackerConfig};
use crate::error::ConfigError;

/// The configuration the tracker reads on every anomaly check.
///
/// Holds the loaded document and, when it came from a file, the path it is
/// written back to by [`save`](Self::save).
#[derive(Debug, Clone, Default)]
pub struct ConfigHandle {
    config: TrackerConfig,
    path: Option<PathBuf>,
}

impl ConfigHandle {
    /// Wraps an in-memory configuration with no backing file.
    #[must_use]
    pub const fn new(config: TrackerConfig) -> Self {
        Self { config, path: None }
    }

    /// Wraps a configuration that is saved back to `path`.
    #[must_use]
    pub fn with_path(config: TrackerConfig, path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            path: Some(path.into()),
        }
    }

    /// Loads `path` with default limits. Load warnings are logged.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when the file is missing, too large,
    /// malformed, or invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let result = ConfigLoader::with_defaults().load(path)?;
        for warning in &result.warnings {
            tracing::warn!(path = %path.display(), "{warning}");
        }
        Ok(Self::with_path(result.config, path))
    }

    /// Full configuration document.
    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Tracker settings section.
    #[must_use]
    pub const fn settings(&self) -> &PhaseTrackerSettings {
        &self.config.phase_tracker
    }

    /// Mutable tracker settings section. Changes are in-memory until saved.
    pub const fn settings_mut(&mut self) -> &mut PhaseTrackerSettings {
        &mut self.config.phase_tracker
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the current document back to its file.
    ///
    /// Returns `Ok(false)` when there is no backing file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WriteFailed`] if serialization or the write fails.
    pub fn save(&self) -> Result<bool, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let yaml = serde_yaml::to_string(&self.config).map_err(|e| ConfigError::WriteFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(path, yaml).map_err(|e| ConfigError::WriteFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(true)
    }
}
