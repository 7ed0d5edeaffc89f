//! Error Types
//!
//! Failures that abort configuration loading or a production run.
//! Non-fatal planning results (an existing transformation, a missing
//! predecessor) are reported through [`crate::production::StepOutcome`].

use thiserror::Error;

use crate::backend::BackendError;
use crate::catalog::StoreError;

/// Configuration could not be loaded or validated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("configuration section [{0}] not found")]
    MissingSection(String),

    #[error("param \"{0}\" must be specified")]
    MissingRequiredParameter(String),

    #[error("invalid value '{value}' for \"{key}\": {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Errors surfaced by a production run.
#[derive(Debug, Error)]
pub enum ProdError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("convert tag param error for tag '{tag}': {message}")]
    TagConversion { tag: String, message: String },

    #[error("metadata store unavailable for '{path}': {message}")]
    StoreUnavailable { path: String, message: String },

    #[error("transformation name '{0}' already exists in the backend")]
    DuplicateStepName(String),

    #[error("add transformation '{name}' error: {message}")]
    Submission { name: String, message: String },
}

impl From<StoreError> for ProdError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable { path, message } => Self::StoreUnavailable { path, message },
            StoreError::Io { path, source } => Self::StoreUnavailable {
                path,
                message: source.to_string(),
            },
            StoreError::Corrupt { path, source } => Self::StoreUnavailable {
                path,
                message: source.to_string(),
            },
        }
    }
}

impl ProdError {
    /// Converts a backend failure for the named transformation.
    pub fn from_backend(name: &str, err: BackendError) -> Self {
        match err {
            BackendError::DuplicateName(existing) => Self::DuplicateStepName(existing),
            other => Self::Submission {
                name: name.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProdError>;
