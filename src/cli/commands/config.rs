//! `config` commands.

use crate::cli::args::{ConfigValidateArgs, OutputFormat};
use crate::config::loader::ConfigLoader;
use crate::config::schema::TrackerConfig;
use crate::error::{ConfigError, Severity, TrackerError, ValidationIssue};

/// Validate configuration files.
///
/// Every file is checked before returning; the first failure is returned.
///
/// # Errors
///
/// Returns the first file's load or validation error. With `--strict`,
/// warnings count as validation errors.
pub fn validate(args: &ConfigValidateArgs) -> Result<(), TrackerError> {
    let loader = ConfigLoader::with_defaults();
    let mut results = Vec::new();
    let mut first_error: Option<ConfigError> = None;

    for path in &args.files {
        tracing::info!(file = %path.display(), "validating configuration");
        let outcome = loader.load(path).and_then(|loaded| {
            if args.strict && !loaded.warnings.is_empty() {
                return Err(ConfigError::ValidationError {
                    path: path.display().to_string(),
                    errors: loaded
                        .warnings
                        .iter()
                        .map(|w| ValidationIssue {
                            path: w.location.clone().unwrap_or_default(),
                            message: w.message.clone(),
                            severity: Severity::Error,
                        })
                        .collect(),
                });
            }
            Ok(loaded)
        });

        match outcome {
            Ok(loaded) => {
                for warning in &loaded.warnings {
                    tracing::warn!(
                        location = warning.location.as_deref().unwrap_or("<unknown>"),
                        "{}",
                        warning.message
                    );
                }
                let warnings: Vec<String> = loaded.warnings.iter().map(ToString::to_string).collect();
                results.push(serde_json::json!({
                    "file": path.display().to_string(),
                    "valid": true,
                    "warnings": warnings,
                }));
                if args.format == OutputFormat::Human {
                    println!("{}: ok ({} warnings)", path.display(), loaded.warnings.len());
                }
            }
            Err(error) => {
                results.push(serde_json::json!({
                    "file": path.display().to_string(),
                    "valid": false,
                    "error": error.to_string(),
                }));
                if args.format == OutputFormat::Human {
                    println!("{}: invalid", path.display());
                }
                first_error.get_or_insert(error);
            }
        }
    }

    if args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    match first_error {
        Some(error) => Err(error.into()),
        None => Ok(()),
    }
}

/// Print the default configuration as YAML.
///
/// # Errors
///
/// Returns an error if YAML serialization fails.
pub fn defaults() -> Result<(), TrackerError> {
    print!("{}", serde_yaml::to_string(&TrackerConfig::default())?);
    Ok(())
}
