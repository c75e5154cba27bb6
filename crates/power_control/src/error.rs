//! Power control error types

use std::process::ExitStatus;

use contracts::ContractError;
use thiserror::Error;

use crate::PowerCommand;

/// Power control specific error
#[derive(Debug, Error)]
pub enum PowerError {
    /// The command could not be started at all
    #[error("failed to run {command} command `{shell}`: {source}")]
    Spawn {
        command: PowerCommand,
        shell: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited non-zero
    #[error("{command} command `{shell}` exited with {status}")]
    Failed {
        command: PowerCommand,
        shell: String,
        status: ExitStatus,
    },

    /// No shell command configured for this action
    #[error("no {0} command configured")]
    NotConfigured(PowerCommand),

    /// Wrapped ContractError (e.g. no restart method)
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl PowerError {
    /// Fatal errors abort the run; command failures are only warnings
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Contract(e) => e.is_fatal(),
            _ => false,
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, PowerError>;
