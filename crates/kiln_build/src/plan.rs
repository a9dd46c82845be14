//! The result of planning a build run.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// What an incremental run has to rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    /// Files the tracker found new or modified, sorted.
    pub changed: Vec<PathBuf>,
    /// Tracked files that no longer exist, sorted.
    pub deleted: Vec<PathBuf>,
    /// Existing files to regenerate: the graph's transitive closure over the
    /// changes, unioned with the tracker's single-level result.
    pub files: BTreeSet<PathBuf>,
    /// Outputs to regenerate or remove, including outputs of deleted files.
    pub outputs: BTreeSet<PathBuf>,
    /// The tracker's single-level result on its own.
    pub tracker_files: BTreeSet<PathBuf>,
}

impl BuildPlan {
    /// Returns `true` if nothing has to be rebuilt.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty() && self.files.is_empty()
    }

    /// Returns `true` if `path` is in [`files`](Self::files).
    pub fn needs_rebuild(&self, path: impl AsRef<Path>) -> bool {
        self.files.contains(path.as_ref())
    }

    /// Files the graph added beyond the tracker's single-level result.
    pub fn transitive_only(&self) -> impl Iterator<Item = &Path> + '_ {
        self.files
            .difference(&self.tracker_files)
            .map(PathBuf::as_path)
    }
}
