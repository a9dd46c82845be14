//! Source tree walking, file hashing and change classification.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use kiln_common::ContentHash;

use crate::error::TrackerError;

/// Result of comparing a walked source tree against the stored fingerprints.
///
/// Categorizes all files into new (never seen), modified (content changed),
/// deleted (tracked but no longer on disk), and unchanged. Every list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Files with no stored fingerprint.
    pub new_files: Vec<PathBuf>,

    /// Files whose content differs from their fingerprint.
    pub modified_files: Vec<PathBuf>,

    /// Tracked files under the walked directory that no longer exist.
    pub deleted_files: Vec<PathBuf>,

    /// Files whose content matches their fingerprint.
    pub unchanged_files: Vec<PathBuf>,
}

impl ChangeSet {
    /// Returns `true` if there are no changes (no new, modified, or deleted files).
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty() && self.modified_files.is_empty() && self.deleted_files.is_empty()
    }

    /// New, modified and deleted files together, sorted.
    pub fn changed(&self) -> Vec<PathBuf> {
        let all: BTreeSet<&PathBuf> = self
            .new_files
            .iter()
            .chain(&self.modified_files)
            .chain(&self.deleted_files)
            .collect();
        all.into_iter().cloned().collect()
    }

    pub(crate) fn sort(&mut self) {
        self.new_files.sort();
        self.modified_files.sort();
        self.deleted_files.sort();
        self.unchanged_files.sort();
    }
}

/// Hashing and directory-walking helpers.
pub struct SourceHasher;

impl SourceHasher {
    /// Computes the content hash of a single file.
    ///
    /// The file is streamed rather than read whole.
    pub fn hash_file(path: &Path) -> Result<ContentHash, TrackerError> {
        let io_err = |source| TrackerError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        ContentHash::from_reader(BufReader::new(file)).map_err(io_err)
    }

    /// Recursively lists every regular file under `dir`, sorted.
    ///
    /// Directories whose file name appears in `ignore` are skipped entirely, as
    /// are symbolic links to directories. Any file in `skip` is left out.
    pub fn walk(dir: &Path, ignore: &[String], skip: &[PathBuf]) -> Result<Vec<PathBuf>, TrackerError> {
        let mut files = Vec::new();
        walk_dir(dir, ignore, skip, &mut files)?;
        files.sort();
        Ok(files)
    }
}

fn walk_dir(
    dir: &Path,
    ignore: &[String],
    skip: &[PathBuf],
    files: &mut Vec<PathBuf>,
) -> Result<(), TrackerError> {
    let walk_err = |source| TrackerError::Walk {
        path: dir.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(dir).map_err(walk_err)? {
        let entry = entry.map_err(walk_err)?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(walk_err)?;

        if file_type.is_dir() {
            let ignored = entry
                .file_name()
                .to_str()
                .is_some_and(|name| ignore.iter().any(|i| i == name));
            if !ignored {
                walk_dir(&path, ignore, skip, files)?;
            }
        } else if (file_type.is_file() || (file_type.is_symlink() && path.is_file()))
            && !skip.contains(&path)
        {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(files: &[PathBuf], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn hash_file_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.md");
        std::fs::write(&path, "# Page").unwrap();

        let h1 = SourceHasher::hash_file(&path).unwrap();
        let h2 = SourceHasher::hash_file(&path).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1, ContentHash::from_bytes(b"# Page"));
    }

    #[test]
    fn hash_file_different_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.md");
        let b = dir.path().join("b.md");
        std::fs::write(&a, "alpha").unwrap();
        std::fs::write(&b, "bravo").unwrap();
        assert_ne!(
            SourceHasher::hash_file(&a).unwrap(),
            SourceHasher::hash_file(&b).unwrap()
        );
    }

    #[test]
    fn hash_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SourceHasher::hash_file(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, TrackerError::Io { .. }));
    }

    #[test]
    fn walk_recurses_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("guide/advanced")).unwrap();
        std::fs::write(root.join("z.md"), "z").unwrap();
        std::fs::write(root.join("a.md"), "a").unwrap();
        std::fs::write(root.join("guide/intro.md"), "i").unwrap();
        std::fs::write(root.join("guide/advanced/deep.md"), "d").unwrap();

        let files = SourceHasher::walk(root, &[], &[]).unwrap();
        assert_eq!(
            names(&files, root),
            vec!["a.md", "guide/advanced/deep.md", "guide/intro.md", "z.md"]
        );
    }

    #[test]
    fn walk_skips_ignored_dirs_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::create_dir_all(root.join(".kiln")).unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        std::fs::write(root.join(".kiln/build-state.json"), "{}").unwrap();
        std::fs::write(root.join("state.json"), "{}").unwrap();
        std::fs::write(root.join("doc.md"), "d").unwrap();

        let ignore = vec!["node_modules".to_string(), ".kiln".to_string()];
        let files = SourceHasher::walk(root, &ignore, &[root.join("state.json")]).unwrap();
        assert_eq!(names(&files, root), vec!["doc.md"]);
    }

    #[test]
    fn walk_missing_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SourceHasher::walk(&dir.path().join("absent"), &[], &[]).unwrap_err();
        assert!(matches!(err, TrackerError::Walk { .. }));
    }

    #[test]
    fn changeset_helpers() {
        let mut cs = ChangeSet {
            new_files: vec![PathBuf::from("n")],
            modified_files: vec![PathBuf::from("m")],
            deleted_files: vec![PathBuf::from("d")],
            unchanged_files: vec![PathBuf::from("u")],
        };
        cs.sort();
        assert!(!cs.is_empty());
        assert_eq!(
            cs.changed(),
            vec![PathBuf::from("d"), PathBuf::from("m"), PathBuf::from("n")]
        );
        assert!(ChangeSet::default().is_empty());
    }
}
