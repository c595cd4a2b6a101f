//! This module contains the error types for the persistence layer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while writing the state file.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Creating the state directory or writing the temporary file failed.
    #[error("Failed to write state file {path}: {source}")]
    Write {
        /// The file being written.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Moving the temporary file onto the state file failed.
    #[error("Failed to replace state file {path}: {source}")]
    Rename {
        /// The destination of the rename.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An error occurred during serialization.
    #[error("Failed to serialize state: {0}")]
    SerializationError(#[from] serde_json::Error),
}
