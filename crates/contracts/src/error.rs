//! Layered error definitions
//!
//! Categorized by source: config / task / power / reference

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Run Errors =====
    /// A trigger or task section names a task that is not registered
    #[error("no task '{task_id}' found (referenced by '{referenced_by}')")]
    UnknownTask {
        task_id: String,
        referenced_by: String,
    },

    /// A stop condition was reached but nothing can restart the target
    #[error("no method specified to restart target (need a power-off command, manual power or hardware reset)")]
    NoRestartMethod,

    // ===== Reference Errors =====
    /// Reference file read/write/parse error
    #[error("reference file '{path}': {message}")]
    Reference { path: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create unknown task error
    pub fn unknown_task(task_id: impl Into<String>, referenced_by: impl Into<String>) -> Self {
        Self::UnknownTask {
            task_id: task_id.into(),
            referenced_by: referenced_by.into(),
        }
    }

    /// Create reference file error
    pub fn reference(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reference {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Fatal errors abort the run before any statistics are produced
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownTask { .. } | Self::NoRestartMethod | Self::ConfigValidation { .. }
        )
    }
}
