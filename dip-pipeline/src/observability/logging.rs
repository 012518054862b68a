//! `tracing` subscriber installation for hosts embedding the pipeline core.

use crate::config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Raised when a global subscriber could not be installed.
#[derive(Debug, Error)]
pub enum LoggingInitError {
    /// The configured filter directive is invalid.
    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter {
        /// The rejected directive.
        directive: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("Failed to install subscriber: {0}")]
    AlreadyInstalled(String),
}

/// Builds the filter: `RUST_LOG` if set, the configured level otherwise.
///
/// # Errors
///
/// Returns [`LoggingInitError::InvalidFilter`] if the configured level does
/// not parse.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingInitError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| LoggingInitError::InvalidFilter {
        directive: config.level.clone(),
        reason: e.to_string(),
    })
}

/// Installs a global fmt subscriber.
///
/// # Errors
///
/// Fails if the filter is invalid or a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| LoggingInitError::AlreadyInstalled(e.to_string()))
}
