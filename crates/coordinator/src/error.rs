//! Coordinator error types

use std::path::PathBuf;

use contracts::ContractError;
use ingestion::IngestionError;
use power_control::PowerError;
use thiserror::Error;

/// Errors that end a run
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Configuration problem found at run start (unknown task, bad pattern)
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Power control failure; only fatal ones reach this point
    #[error(transparent)]
    Power(#[from] PowerError),

    /// Sources could not be started
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    /// A mirror output could not be opened
    #[error("failed to open mirror '{}': {source}", path.display())]
    Mirror {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pipeline receiver was already taken
    #[error("ingestion receiver already taken")]
    ReceiverTaken,
}

impl CoordinatorError {
    pub fn mirror(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Mirror {
            path: path.into(),
            source,
        }
    }
}
