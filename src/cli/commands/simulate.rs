//! `simulate` command.
//!
//! Loads a scenario (file or built-in), runs it over a simulated world and
//! prints the run summary. Anomaly reports go to the log as they happen.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::cli::args::{OutputFormat, SimulateArgs};
use crate::config::handle::ConfigHandle;
use crate::diagnostics::sink::TracingSink;
use crate::error::TrackerError;
use crate::observability::events::EventEmitter;
use crate::scenario::{RunOptions, RunSummary, Scenario, load_builtin};

/// Run a scenario and print its summary.
///
/// # Errors
///
/// Returns an error if the scenario or configuration cannot be loaded, the
/// events file cannot be created, or the run hits a fatal tracker error.
pub async fn run(args: &SimulateArgs) -> Result<(), TrackerError> {
    let scenario = if let Some(path) = &args.scenario {
        Scenario::load(path)?
    } else if let Some(name) = &args.builtin {
        load_builtin(name)?
    } else {
        return Err(TrackerError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no scenario given",
        )));
    };

    let config = args.config.as_deref().map(ConfigHandle::load).transpose()?;
    let emitter = match &args.events_file {
        Some(path) => Some(Arc::new(EventEmitter::from_file(path)?)),
        None => None,
    };

    let options = RunOptions {
        config,
        sink: Some(Arc::new(TracingSink)),
        emitter,
    };
    let summary = crate::scenario::run(&scenario, options).await?;

    match args.format {
        OutputFormat::Human => print!("{}", render_human(&summary)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}

fn render_human(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Scenario: {} ({} steps)", summary.name, summary.steps);
    let _ = writeln!(
        out,
        "  events posted      {} ({} cancelled)",
        summary.events_posted, summary.events_cancelled
    );
    let _ = writeln!(out, "  block changes      {}", summary.block_changes_applied);
    let _ = writeln!(out, "  blocks             {}", summary.blocks);
    let _ = writeln!(out, "  entities           {}", summary.entities.len());
    let c = &summary.captures;
    let _ = writeln!(
        out,
        "  captures           {} captured, {} passthrough, {} queued, {} rejected",
        c.captured, c.passthrough, c.queued, c.rejected
    );
    let _ = writeln!(out, "  open phases        {}", summary.open_phases);
    let _ = writeln!(out, "  depth ceiling      {}", summary.max_block_processing_depth);
    if summary.anomalies.is_empty() {
        let _ = writeln!(out, "  anomalies          none");
    } else {
        let _ = writeln!(out, "  anomalies          {}", summary.anomaly_count());
        for (kind, count) in &summary.anomalies {
            let _ = writeln!(out, "    {kind:<28} {count}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::scenario::CaptureCounts;

    fn summary(anomalies: IndexMap<String, usize>) -> RunSummary {
        RunSummary {
            name: "block-tick".to_owned(),
            steps: 6,
            events_posted: 3,
            events_cancelled: 1,
            block_changes_applied: 1,
            blocks: 2,
            entities: vec!["minecraft:sheep".to_owned()],
            captures: CaptureCounts {
                captured: 3,
                ..CaptureCounts::default()
            },
            open_phases: 0,
            max_block_processing_depth: 100,
            anomalies,
        }
    }

    #[test]
    fn human_summary_without_anomalies() {
        let out = render_human(&summary(IndexMap::new()));
        assert!(out.starts_with("Scenario: block-tick (6 steps)\n"));
        assert!(out.contains("events posted      3 (1 cancelled)"));
        assert!(out.contains("anomalies          none"));
    }

    #[test]
    fn human_summary_lists_anomalies() {
        let mut anomalies = IndexMap::new();
        anomalies.insert("runaway_phase".to_owned(), 3);
        let out = render_human(&summary(anomalies));
        assert!(out.contains("anomalies          3"));
        assert!(out.contains("runaway_phase"));
    }
}
