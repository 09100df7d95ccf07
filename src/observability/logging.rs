//! Logging setup for the tracker and its CLI.
//!
//! Verbosity flags raise the level of this crate's own targets only;
//! dependencies stay at `warn`. Anomaly reports arrive through
//! [`TracingSink`](crate::diagnostics::TracingSink) at warn or error, so
//! they are visible at every verbosity. `PHASE_TRACKER_LOG_LEVEL` replaces
//! the computed filter entirely.

use std::io::IsTerminal;

use tracing::Span;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;
use crate::phase::state::PhaseState;

/// Environment variable holding a full filter directive.
pub const LOG_LEVEL_ENV: &str = "PHASE_TRACKER_LOG_LEVEL";

/// Target prefix of every event this crate emits.
const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Text lines, coloured on a terminal.
    #[default]
    Human,
    /// One JSON object per line, with the enclosing phase span.
    Json,
}

/// Level for this crate's targets at a given `-v` count.
///
/// `0` is `warn`, and each `-v` lowers it one step down to `trace`.
#[must_use]
pub const fn verbosity_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Filter directive for a `-v` count: `warn` everywhere, this crate at
/// [`verbosity_level`].
#[must_use]
pub fn tracker_directive(verbosity: u8) -> String {
    match verbosity {
        0 => "warn".to_owned(),
        v => format!("warn,{CRATE_TARGET}={}", verbosity_level(v)),
    }
}

/// Span wrapping the processing of one completed phase. Events logged by
/// processors and hosts inside it carry the phase and its depth.
#[must_use]
pub fn phase_span(state: PhaseState, depth: usize) -> Span {
    tracing::debug_span!("phase", phase = state.name(), depth)
}

/// Installs the global subscriber on stderr.
///
/// A second call is a no-op, so tests may call it freely.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = EnvFilter::try_from_env(LOG_LEVEL_ENV)
        .unwrap_or_else(|_| EnvFilter::new(tracker_directive(verbosity)));
    let with_target = verbosity >= 2;

    match format {
        LogFormat::Human => {
            let ansi = match color {
                ColorChoice::Auto => {
                    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
                }
                ColorChoice::Always => true,
                ColorChoice::Never => false,
            };
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(ansi)
                .with_target(with_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_env_filter(filter)
                .with_target(with_target)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
