//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// A command-line override does not make sense
    #[error("Invalid {option} value '{value}': {message}")]
    InvalidOverride {
        option: &'static str,
        value: String,
        message: String,
    },

    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] contracts::ContractError),

    /// The run ended with a fatal error
    #[error(transparent)]
    Run(#[from] coordinator::CoordinatorError),

    /// Reference file could not be read or written
    #[error(transparent)]
    Reference(#[from] statistics::StatisticsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_override(
        option: &'static str,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidOverride {
            option,
            value: value.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
