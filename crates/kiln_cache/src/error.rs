//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur inside the cache backends.
///
/// The public [`ContentCache`](crate::ContentCache) API never returns these:
/// cache reads are fail-safe and every error becomes a miss or a log event.
/// This enum is used for internal error propagation within the cache subsystem
/// and by callers driving a backend store directly.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An entry file exists but cannot be used.
    #[error("corrupt cache entry {path}: {reason}")]
    Corrupt {
        /// The entry file path.
        path: PathBuf,
        /// Description of the problem.
        reason: String,
    },

    /// The entry was written by an incompatible schema version.
    #[error("schema mismatch in {path}: expected {expected}, got {actual}")]
    SchemaMismatch {
        /// The entry file path.
        path: PathBuf,
        /// The schema version this build understands.
        expected: u32,
        /// The schema version found in the file.
        actual: u32,
    },

    /// A serialization error occurred while encoding an entry.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

impl CacheError {
    /// Returns `true` if the entry file should be deleted rather than retried.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            CacheError::Corrupt { .. } | CacheError::SchemaMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = CacheError::Io {
            path: PathBuf::from("/tmp/cache/abc.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let msg = err.to_string();
        assert!(msg.contains("cache I/O error"));
        assert!(msg.contains("abc.json"));
        assert!(!err.is_corruption());
    }

    #[test]
    fn corrupt_display() {
        let err = CacheError::Corrupt {
            path: PathBuf::from("bad.json"),
            reason: "expected value at line 1".to_string(),
        };
        assert!(err.to_string().contains("corrupt cache entry"));
        assert!(err.is_corruption());
    }

    #[test]
    fn schema_mismatch_display() {
        let err = CacheError::SchemaMismatch {
            path: PathBuf::from("old.json"),
            expected: 2,
            actual: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 2"));
        assert!(msg.contains("got 1"));
        assert!(err.is_corruption());
    }

    #[test]
    fn serialization_error_display() {
        let err = CacheError::Serialization {
            reason: "key must be a string".to_string(),
        };
        assert!(err.to_string().contains("key must be a string"));
    }
}
