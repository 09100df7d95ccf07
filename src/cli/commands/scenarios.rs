//! `scenarios` commands.

use crate::cli::args::{OutputFormat, ScenariosListArgs, ScenariosShowArgs};
use crate::error::{ScenarioError, TrackerError};
use crate::scenario::{ScenarioCategory, find_scenario, list_scenarios, suggest_scenario};

/// List built-in scenarios grouped by category.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn list(args: &ScenariosListArgs) -> Result<(), TrackerError> {
    let scenarios = list_scenarios(args.category, args.tag.as_deref());

    match args.format {
        OutputFormat::Human => {
            if scenarios.is_empty() {
                println!("No scenarios match.");
                return Ok(());
            }
            for category in ScenarioCategory::all() {
                let in_category: Vec<_> = scenarios.iter().filter(|s| s.category == *category).collect();
                if in_category.is_empty() {
                    continue;
                }
                println!("{}:", category.label());
                for s in in_category {
                    println!("  {:<24} {}", s.name, s.description);
                }
            }
        }
        OutputFormat::Json => {
            let items: Vec<_> = scenarios
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "name": s.name,
                        "description": s.description,
                        "category": s.category.to_string(),
                        "tags": s.tags,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }
    Ok(())
}

/// Print a built-in scenario's YAML.
///
/// # Errors
///
/// Returns [`ScenarioError::UnknownBuiltin`] for an unknown name.
pub fn show(args: &ScenariosShowArgs) -> Result<(), TrackerError> {
    let scenario = find_scenario(&args.name).ok_or_else(|| ScenarioError::UnknownBuiltin {
        name: args.name.clone(),
        suggestion: suggest_scenario(&args.name),
    })?;
    print!("{}", scenario.yaml);
    Ok(())
}
