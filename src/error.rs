use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the imputation library
#[derive(Debug, Error)]
pub enum ImputeError {
    /// Input file absent, unreadable or malformed
    #[error("file error in {path:?}: {reason}")]
    File { path: PathBuf, reason: String },

    /// Table content does not match the expected column layout
    #[error("schema error: {0}")]
    Schema(String),

    /// Estimator misuse or numerical failure
    #[error("estimator error: {0}")]
    Estimator(String),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ImputeError {
    pub(crate) fn file<P: Into<PathBuf>>(path: P, reason: impl Into<String>) -> Self {
        ImputeError::File {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImputeError>;
