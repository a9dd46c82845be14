//! Error types for graph persistence.
//!
//! Graph mutation and query operations are total and never fail; only loading
//! and saving a snapshot can.

use std::path::PathBuf;

/// Errors that can occur while persisting or restoring a [`DependencyGraph`](crate::DependencyGraph).
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// An I/O error occurred while reading or writing a snapshot file.
    #[error("graph I/O error at {path}: {source}")]
    Io {
        /// The snapshot path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The snapshot is not valid JSON or does not match the snapshot layout.
    #[error("failed to parse graph snapshot: {reason}")]
    Parse {
        /// Description of the parse failure.
        reason: String,
    },

    /// The graph could not be encoded, typically because a path is not valid UTF-8.
    #[error("failed to encode graph snapshot: {reason}")]
    Encode {
        /// Description of the encoding failure.
        reason: String,
    },

    /// The snapshot was written with a different schema version.
    #[error("graph snapshot schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch {
        /// The version this build understands.
        expected: u32,
        /// The version found in the snapshot.
        actual: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_display() {
        let err = GraphError::Parse {
            reason: "EOF while parsing".to_string(),
        };
        assert!(err.to_string().contains("EOF while parsing"));
    }

    #[test]
    fn schema_mismatch_display() {
        let err = GraphError::SchemaMismatch {
            expected: 1,
            actual: 7,
        };
        assert_eq!(
            err.to_string(),
            "graph snapshot schema mismatch: expected 1, got 7"
        );
    }

    #[test]
    fn io_display() {
        let err = GraphError::Io {
            path: PathBuf::from("/x/graph.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("graph.json"));
    }
}
