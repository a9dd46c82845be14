//! File fingerprints and the cheap size/mtime comparison.

use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kiln_common::{ContentHash, Timestamp};

use crate::error::TrackerError;
use crate::hasher::SourceHasher;

/// How close a file's mtime may be to the moment it was fingerprinted before
/// the size/mtime shortcut stops being trusted.
///
/// A file rewritten within the filesystem's timestamp granularity after being
/// fingerprinted can keep both its size and its mtime. Such fingerprints are
/// "racy" and are always confirmed by hashing.
pub const RACY_WINDOW: Duration = Duration::from_secs(2);

/// What a source file looked like when it was last processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    /// The file path as it was walked.
    pub path: PathBuf,
    /// XXH3-128 hash of the content.
    pub hash: ContentHash,
    /// Size in bytes.
    pub size: u64,
    /// Modification time reported by the filesystem.
    pub modified_time: Timestamp,
    /// Files this file depended on when it was last processed.
    #[serde(default)]
    pub dependencies: Vec<PathBuf>,
    /// When this fingerprint was taken.
    #[serde(default)]
    pub recorded_at: Timestamp,
}

/// Outcome of comparing metadata against a stored fingerprint without hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QuickCheck {
    /// The size differs, so the content must differ.
    Changed,
    /// Size and mtime match a fingerprint that is safe to trust.
    Unchanged,
    /// Only a content hash can tell.
    Undecided,
}

/// Reads a file's modification time, falling back to the epoch on platforms
/// that do not report one.
pub(crate) fn modified_time(meta: &Metadata) -> Timestamp {
    meta.modified()
        .map(Timestamp::from_system_time)
        .unwrap_or(Timestamp::EPOCH)
}

impl FileFingerprint {
    /// Fingerprints `path` as it is on disk now.
    pub fn capture(path: &Path, dependencies: Vec<PathBuf>) -> Result<Self, TrackerError> {
        let meta = std::fs::metadata(path).map_err(|source| TrackerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let hash = SourceHasher::hash_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            hash,
            size: meta.len(),
            modified_time: modified_time(&meta),
            dependencies,
            recorded_at: Timestamp::now(),
        })
    }

    /// Returns `true` if the file's mtime lies within [`RACY_WINDOW`] of the
    /// moment the fingerprint was taken.
    pub fn is_racy(&self) -> bool {
        self.modified_time.abs_diff(self.recorded_at) < RACY_WINDOW
    }

    pub(crate) fn quick_check(&self, meta: &Metadata, verify_content: bool) -> QuickCheck {
        if meta.len() != self.size {
            return QuickCheck::Changed;
        }
        if !verify_content && modified_time(meta) == self.modified_time && !self.is_racy() {
            return QuickCheck::Unchanged;
        }
        QuickCheck::Undecided
    }
}
