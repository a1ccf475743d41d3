//! Tracing setup for the CLI and tests.

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above.
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// Map a `-v` count to a verbosity.
    pub fn from_occurrences(count: u8) -> Self {
        match count {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Trace,
        }
    }

    /// Verbosity from the CLI's `-q` and `-v` flags; `-q` wins.
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            Self::Quiet
        } else {
            Self::from_occurrences(verbose)
        }
    }

    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

/// Initialize the global subscriber. `RUST_LOG` overrides `verbosity`.
///
/// Calling it again is harmless; only the first call installs a subscriber.
pub fn init_logging(verbosity: Verbosity) {
    let default_filter = format!("logbook_media={}", verbosity.to_level_filter());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    let _ = subscriber.try_init();
}

/// Warnings and errors only, routed through the test harness writer.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
