//! Error types for VGB file operations.

use thiserror::Error;

/// Errors that can occur while reading or writing VGB files.
#[derive(Error, Debug)]
pub enum VgbError {
    /// The path did not exist on disk.
    ///
    /// Carries the bare file name, not the full path; the message is shown
    /// to users as-is.
    #[error("{filename} not found")]
    NotFound {
        /// Bare file name of the missing file.
        filename: String,
    },

    /// An underlying I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a VGB file, or its structure is inconsistent.
    #[error("invalid volume file: {message}")]
    InvalidFormat {
        /// Description of the format error.
        message: String,
    },

    /// The grid directory ended before all declared records were read.
    ///
    /// Records parsed before the truncation point remain usable.
    #[error("grid directory truncated after {parsed} of {expected} records")]
    TruncatedDirectory {
        /// Records successfully parsed.
        parsed: usize,
        /// Records the header declared.
        expected: usize,
    },

    /// No grid with the requested name exists in the file.
    #[error("grid '{name}' not found in file")]
    GridNotFound {
        /// The requested grid name.
        name: String,
    },

    /// A tree block carried the wrong number of values.
    #[error("invalid block size: expected {expected} values, got {got}")]
    InvalidBlockSize {
        /// Expected number of values.
        expected: usize,
        /// Actual number of values provided.
        got: usize,
    },
}

/// Result type alias for VGB file operations.
pub type Result<T> = std::result::Result<T, VgbError>;
