//! Emission error types.

use std::path::PathBuf;

use capigen_core::{ClassificationError, ParseError};

/// A file could not be read, backed up or written.
#[derive(Debug, thiserror::Error)]
#[error("cannot write {}: {source}", path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl WriteError {
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WriteError {
            path: path.into(),
            source,
        }
    }
}

/// Errors that abort (or, with keep-going, degrade) a generation run.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// Missing or unreadable header, or a class filter naming an unknown class.
    #[error("invalid input: {detail}")]
    Input { detail: String },

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("invalid configuration: {detail}")]
    Config { detail: String },
}

impl EmitError {
    pub fn input(detail: impl Into<String>) -> Self {
        EmitError::Input {
            detail: detail.into(),
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        EmitError::Config {
            detail: detail.into(),
        }
    }
}

/// Result type alias for emission.
pub type Result<T> = std::result::Result<T, EmitError>;
