//! Error types for the pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by preprocessing, analysis and file handling
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed timestamp or unparseable numeric cell; aborts the batch
    #[error("parse error at record {record}: {message}")]
    Parse { record: usize, message: String },

    /// Structurally present but invalid data
    #[error("invalid {field}: {message}")]
    Data { field: String, message: String },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn data(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Data {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
