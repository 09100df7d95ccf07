//! Error types for the phase tracker.
//!
//! Only a handful of conditions are ever returned as errors: configuration
//! failures, scenario failures, and the thread-confinement violation on
//! `switch_to` / `complete_phase`. Every other tracking anomaly is reported
//! through the diagnostics printer and never interrupts the caller.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::phase::context::BlockPos;
use crate::phase::state::PhaseState;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `phase-tracker` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Phase tracker error (thread confinement violated)
    pub const PHASE_ERROR: i32 = 5;

    /// Scenario error (unknown built-in, malformed script)
    pub const SCENARIO_ERROR: i32 = 6;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `phase-tracker` operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Configuration loading, validation, or write-back error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Phase tracker misuse that cannot be continued safely
    #[error(transparent)]
    Phase(#[from] PhaseError),

    /// Scenario loading or execution error
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TrackerError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Phase(_) | Self::Scenario(ScenarioError::Phase { .. }) => ExitCode::PHASE_ERROR,
            Self::Scenario(_) => ExitCode::SCENARIO_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading, validation, and persistence errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}{}: {message}", line.map_or_else(String::new, |l| format!(" (line {l})")))]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Configuration file exceeds the size limit
    #[error("configuration file {path} is {size} bytes (limit: {limit})")]
    TooLarge {
        /// Path to the configuration file
        path: PathBuf,
        /// Actual file size in bytes
        size: usize,
        /// Configured size limit in bytes
        limit: usize,
    },

    /// Writing the configuration back to disk failed
    #[error("failed to save configuration to {path}: {message}")]
    WriteFailed {
        /// Destination path
        path: PathBuf,
        /// Underlying failure
        message: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "phase_tracker.max_block_processing_depth")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} at {}", self.severity, self.message, self.path)
    }
}

/// Severity level shared by validation issues and diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Something is wrong and has been worked around or refused
    Error,
    /// Potential issue that does not prevent operation
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

// ============================================================================
// Phase Tracker Errors
// ============================================================================

/// Phase tracker errors that the caller must handle.
///
/// Protocol violations (mismatched completion, runaway phases, and the like)
/// are never surfaced here; they go to the diagnostic sink instead.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// The tracker was driven from a thread other than the engine thread
    #[error("phase '{state}' cannot be {operation} off the engine thread (called from {thread})")]
    OffThread {
        /// State being entered or completed
        state: PhaseState,
        /// `"entered"` or `"completed"`
        operation: &'static str,
        /// Name (or id) of the offending thread
        thread: String,
    },
}

// ============================================================================
// Host Errors
// ============================================================================

/// Failures reported by the host engine while the tracker replays captures.
#[derive(Debug, Error)]
pub enum HostError {
    /// The world refused a block change
    #[error("block change at {pos} rejected: {reason}")]
    BlockRejected {
        /// Position of the rejected change
        pos: BlockPos,
        /// Host-supplied reason
        reason: String,
    },

    /// The world refused to spawn an entity
    #[error("entity '{kind}' could not be spawned: {reason}")]
    EntityRejected {
        /// Entity type id
        kind: String,
        /// Host-supplied reason
        reason: String,
    },
}

// ============================================================================
// Scenario Errors
// ============================================================================

/// Scenario script loading and execution errors.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// No built-in scenario with that name
    #[error("unknown built-in scenario '{name}'{}", suggestion.as_ref().map_or_else(String::new, |s| format!(" (did you mean '{s}'?)")))]
    UnknownBuiltin {
        /// Requested name
        name: String,
        /// Closest known name, if any
        suggestion: Option<String>,
    },

    /// The scenario YAML could not be parsed
    #[error("invalid scenario {origin}: {message}")]
    Parse {
        /// File path or built-in name
        origin: String,
        /// Parser message
        message: String,
    },

    /// A scenario step drove the tracker into a fatal condition
    #[error("step {step}: {source}")]
    Phase {
        /// Zero-based step index
        step: usize,
        /// Underlying tracker error
        #[source]
        source: PhaseError,
    },

    /// A worker thread used by an off-thread step failed
    #[error("step {step}: worker thread failed: {message}")]
    Worker {
        /// Zero-based step index
        step: usize,
        /// Join failure description
        message: String,
    },
}

impl ScenarioError {
    /// Wraps a tracker error raised while executing `step`.
    #[must_use]
    pub const fn phase(step: usize, source: PhaseError) -> Self {
        Self::Phase { step, source }
    }
}

/// Result type alias for `phase-tracker` operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

// ============================================================================
// Tests
// ============================================================================
