//! Configuration module.
//!
//! Loading, validation, and write-back of the tracker configuration: limits,
//! verbosity flags, and per-mod capability overrides.

pub mod handle;
pub mod loader;
pub mod schema;
pub mod validation;

pub use handle::ConfigHandle;
pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
