//! CLI command dispatch and handlers.
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod config;
pub mod scenarios;
pub mod simulate;
pub mod version;

use crate::cli::args::{Cli, Commands, ConfigSubcommand, ScenariosSubcommand};
use crate::error::TrackerError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli) -> Result<(), TrackerError> {
    match cli.command {
        Commands::Simulate(args) => simulate::run(&args).await,
        Commands::Scenarios(cmd) => match cmd.subcommand {
            ScenariosSubcommand::List(args) => scenarios::list(&args),
            ScenariosSubcommand::Show(args) => scenarios::show(&args),
        },
        Commands::Config(cmd) => match cmd.subcommand {
            ConfigSubcommand::Validate(args) => config::validate(&args),
            ConfigSubcommand::Defaults => config::defaults(),
        },
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}
