//! Removal of all persisted engine state.

use std::io;
use std::path::{Path, PathBuf};

use kiln_config::ProjectConfig;

use crate::error::BuildError;

/// Deletes the cache directory, the build state file and the graph snapshot
/// named in an already-resolved `config`.
///
/// Returns the paths that existed and were removed. Missing paths are skipped.
pub fn clean(config: &ProjectConfig) -> Result<Vec<PathBuf>, BuildError> {
    let mut removed = Vec::new();

    if let Some(dir) = &config.cache.directory {
        if remove(dir, |p| std::fs::remove_dir_all(p))? {
            removed.push(dir.clone());
        }
    }
    for file in [&config.tracker.state_file, &config.graph.state_file] {
        if remove(file, |p| std::fs::remove_file(p))? {
            removed.push(file.clone());
        }
    }
    Ok(removed)
}

fn remove(path: &Path, op: fn(&Path) -> io::Result<()>) -> Result<bool, BuildError> {
    match op(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(BuildError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::resolve_config;

    #[test]
    fn removes_existing_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = resolve_config(dir.path(), &ProjectConfig::default());
        std::fs::create_dir_all(config.cache.directory.as_ref().unwrap()).unwrap();
        std::fs::write(config.cache.directory.as_ref().unwrap().join("k.json"), "{}").unwrap();
        std::fs::write(&config.tracker.state_file, "{}").unwrap();

        let removed = clean(&config).unwrap();
        assert_eq!(
            removed,
            vec![
                config.cache.directory.clone().unwrap(),
                config.tracker.state_file.clone()
            ]
        );
        assert!(!config.tracker.state_file.exists());
    }

    #[test]
    fn nothing_to_remove() {
        let dir = tempfile::tempdir().unwrap();
        let config = resolve_config(dir.path(), &ProjectConfig::default());
        assert!(clean(&config).unwrap().is_empty());
    }
}
