use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("dimension mismatch: got {got}, want {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("corrupt gallery: {0}")]
    CorruptData(String),

    #[error("cannot access {}: {reason}", path.display())]
    Resource { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl Error {
    pub(crate) fn resource(path: impl Into<PathBuf>, err: impl ToString) -> Self {
        Error::Resource {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}
