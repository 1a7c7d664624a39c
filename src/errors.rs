/*!
 * Error types for the mkvbatch application.
 *
 * This module contains custom error types for the different stages of a
 * batch, using the thiserror crate for ergonomic error definitions.
 * Per-pair failures (`MuxError`, `SanitizeError`) are recorded and the batch
 * moves on; `BatchError::Filesystem` aborts the remaining batch.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building or running an external tool invocation
#[derive(Error, Debug)]
pub enum MuxError {
    /// The configured program could not be found
    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    /// The program was found but could not be started
    #[error("Failed to start {tool}: {message}")]
    Spawn {
        /// Program name
        tool: String,
        /// OS error description
        message: String,
    },

    /// The program ran and reported failure
    #[error("{tool} failed with {}: {message}", exit_label(.code))]
    Failed {
        /// Program name
        tool: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Trimmed tool output
        message: String,
    },

    /// The program did not finish in time
    #[error("{tool} timed out after {secs} seconds")]
    Timeout {
        /// Program name
        tool: String,
        /// Timeout that elapsed
        secs: u64,
    },

    /// Track identification output could not be understood
    #[error("Failed to parse track identification output: {0}")]
    Parse(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code".to_string(),
    }
}

/// Errors that can occur while sanitizing a subtitle file
#[derive(Error, Debug)]
pub enum SanitizeError {
    /// The detected encoding could not decode the file without loss
    #[error("Could not decode {path:?} as {encoding}")]
    EncodingDecode {
        /// Subtitle file
        path: PathBuf,
        /// Encoding label reported by the detector
        encoding: String,
    },

    /// Reading or replacing the subtitle file failed
    #[error("Subtitle I/O error on {path:?}: {source}")]
    Io {
        /// Subtitle file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that end or describe a batch
#[derive(Error, Debug)]
pub enum BatchError {
    /// The matcher produced zero pairs
    #[error("No valid files were found in the source directory provided.")]
    NoFilesFound,

    /// A cleanup step failed; the tree may be partially rewritten
    #[error("Failed to {operation} {path:?}: {source}")]
    Filesystem {
        /// Operation that failed (e.g. "delete", "rename")
        operation: &'static str,
        /// Path the operation targeted
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The input directory could not be walked
    #[error("Cannot read input directory {path:?}: {message}")]
    InputDirectory {
        /// Directory requested
        path: PathBuf,
        /// Reason
        message: String,
    },

    /// Error from the external tool
    #[error("Mux error: {0}")]
    Mux(#[from] MuxError),

    /// Error from subtitle sanitizing
    #[error("Subtitle error: {0}")]
    Sanitize(#[from] SanitizeError),
}

impl BatchError {
    /// Build a filesystem error for a failed cleanup step
    pub fn filesystem(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether this error must stop the remaining batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Filesystem { .. } | Self::InputDirectory { .. })
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid configuration or request
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from batch processing
    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
