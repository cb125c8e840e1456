//! Logging initialization for the CLI.
//!
//! Logging is owned by the CLI crate to keep the engine crate quiet by
//! default. The npm-style `--loglevel` names map onto tracing levels;
//! `RUST_LOG` is honored as an override.

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// npm-style log levels accepted by `--loglevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum LogLevel {
    Critical,
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
    Silly,
}

impl LogLevel {
    /// The tracing level this name maps to. Seven npm names fold onto five
    /// tracing levels.
    #[must_use]
    pub fn tracing_level(self) -> Level {
        match self {
            Self::Critical | Self::Error => Level::ERROR,
            Self::Warn => Level::WARN,
            Self::Info => Level::INFO,
            Self::Verbose | Self::Debug => Level::DEBUG,
            Self::Silly => Level::TRACE,
        }
    }
}

/// Initialize the tracing subscriber.
///
/// # Panics
/// Panics if the subscriber cannot be installed (e.g., called twice).
pub fn init(level: LogLevel) {
    let level = level.tracing_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"))
        .add_directive(format!("hoister={level}").parse().unwrap())
        .add_directive(format!("hoister_core={level}").parse().unwrap())
        .add_directive(level.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
