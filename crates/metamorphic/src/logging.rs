//! Logging setup for programs embedding the factory.
//!
//! The log level is chosen in order of precedence:
//! 1. `RUST_LOG` environment variable (if set)
//! 2. the verbosity count (ERROR, WARN, INFO, DEBUG, TRACE)
//! 3. no logging at all (OFF)

use std::{fs::File, path::PathBuf};

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The log file could not be created.
    #[error("Failed to create log file: {0}")]
    LogFile(#[from] std::io::Error),

    /// A global subscriber is already installed.
    #[error("Failed to install tracing subscriber: {0}")]
    Init(Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    /// Verbosity: 1 = error, 2 = warn, 3 = info, 4 = debug, 5+ = trace.
    pub verbose: u8,
    /// Write logs to this file instead of stderr.
    pub log_file: Option<PathBuf>,
    /// Disable colors on stderr. Files never get colors.
    pub no_color: bool,
}

impl LogConfig {
    /// Creates a configuration logging at `verbose` to stderr.
    pub fn new(verbose: u8) -> Self {
        Self { verbose, ..Default::default() }
    }

    /// The filter directive derived from the verbosity.
    pub fn directive(&self) -> String {
        let level = match self.verbose {
            0 => return "off".to_string(),
            1 => Level::ERROR,
            2 => Level::WARN,
            3 => Level::INFO,
            4 => Level::DEBUG,
            _ => Level::TRACE,
        };
        format!("metamorphic={level}")
    }

    /// The filter to install, honoring `RUST_LOG` first.
    pub fn env_filter(&self) -> EnvFilter {
        if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(self.directive())
        }
    }

    /// Installs the global tracing subscriber.
    ///
    /// The log target is only shown from DEBUG on.
    pub fn init(&self) -> Result<(), LoggingError> {
        let filter = self.env_filter();
        let show_target = self.verbose >= 4;

        if let Some(log_file) = &self.log_file {
            let file = File::create(log_file)?;
            fmt()
                .with_env_filter(filter)
                .with_target(show_target)
                .with_writer(file)
                .with_ansi(false)
                .try_init()
                .map_err(LoggingError::Init)
        } else {
            fmt()
                .with_env_filter(filter)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .with_ansi(!self.no_color)
                .try_init()
                .map_err(LoggingError::Init)
        }
    }
}
