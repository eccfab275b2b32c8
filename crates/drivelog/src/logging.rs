//! Logging setup for drivelog.
//!
//! The engine emits `tracing` events; the host installs a subscriber once at
//! startup with [`init_logging`].

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Suppress all output except errors.
    Quiet,
    /// Normal output level (info and above).
    #[default]
    Normal,
    /// Verbose output (debug and above).
    Verbose,
    /// Very verbose output (trace level).
    Trace,
}

impl Verbosity {
    /// Convert verbosity to tracing level filter.
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

/// Install the global subscriber for the `drivelog` binary.
///
/// Only events under the `drivelog` target are shown, at the level the CLI
/// flags map to. A `RUST_LOG` directive replaces that filter entirely. Lines
/// are written to stderr; a second call is a no-op.
///
/// ```no_run
/// use clap::Parser;
/// use drivelog::{cli::Cli, init_logging};
///
/// let cli = Cli::parse();
/// init_logging(cli.verbosity());
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let default_filter = format!("drivelog={}", verbosity.to_level_filter());

    // RUST_LOG wins over the CLI flags
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&default_filter));

    // Log lines go to stderr so command output on stdout stays pipeable.
    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time(),
    );

    // Already set by an earlier call
    let _ = subscriber.try_init();
}

/// Initialize logging for tests, warnings and errors only.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
