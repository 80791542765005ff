//! Errors in the library.
use std::path::PathBuf;
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum QlError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// The environment returned no legal action for a non-terminal state.
    #[error("No legal action in state {state}")]
    EmptyActionSet {
        /// Encoding of the offending state.
        state: String,
    },

    /// A hyperparameter is non-finite or out of its range.
    #[error("Invalid parameter {name}: {value}")]
    InvalidParameter {
        /// Name of the parameter.
        name: &'static str,
        /// The rejected value, formatted.
        value: String,
    },

    /// The store file could not be read or written.
    #[error("I/O error on value store {path:?}: {source}")]
    StoreIo {
        /// Path of the store file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The store file exists but its content could not be decoded.
    #[error("Corrupt value store {path:?}: {source}")]
    CorruptStore {
        /// Path of the store file.
        path: PathBuf,
        /// Underlying error.
        source: bincode::Error,
    },

    /// The store file was written with an unknown format version.
    #[error("Unsupported value store version {version} in {path:?}")]
    UnsupportedStoreVersion {
        /// Path of the store file.
        path: PathBuf,
        /// Version found in the file.
        version: u32,
    },
}

impl QlError {
    pub(crate) fn invalid(name: &'static str, value: impl ToString) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
        }
    }
}
