//! Error types for the change tracker.

use std::path::PathBuf;

/// Errors raised by the change tracker.
///
/// Loading a corrupt build state is not an error (the tracker starts empty);
/// failing to walk the source tree or to save the state is.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// An I/O error occurred reading or fingerprinting a file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A directory in the source tree could not be listed.
    #[error("failed to walk {path}: {source}")]
    Walk {
        /// The directory that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The build state file could not be parsed.
    #[error("failed to parse build state {path}: {reason}")]
    Parse {
        /// The state file.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// The build state file was written with a different schema version.
    #[error("build state {path} has schema version {actual}, expected {expected}")]
    SchemaMismatch {
        /// The state file.
        path: PathBuf,
        /// The version this build understands.
        expected: u32,
        /// The version found in the file.
        actual: u32,
    },

    /// The build state could not be encoded.
    #[error("failed to encode build state: {reason}")]
    Encode {
        /// Description of the encoding failure.
        reason: String,
    },
}

impl TrackerError {
    /// Returns `true` if the error describes an unusable state file rather than
    /// a failed I/O operation.
    pub fn is_corrupt_state(&self) -> bool {
        matches!(
            self,
            TrackerError::Parse { .. } | TrackerError::SchemaMismatch { .. }
        )
    }
}
