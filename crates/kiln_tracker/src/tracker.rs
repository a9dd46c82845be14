//! The change tracker.

use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use kiln_common::Timestamp;
use kiln_config::TrackerConfig;
use kiln_log::{Component, LogEvent, SharedSink};

use crate::error::TrackerError;
use crate::fingerprint::{FileFingerprint, QuickCheck};
use crate::hasher::{ChangeSet, SourceHasher};
use crate::state::BuildState;

/// How one walked file compares with its stored fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    New,
    Modified,
    Unchanged,
    /// Same content, but the stored fingerprint is stale (mtime moved or racy)
    /// and should be replaced so the next run can skip hashing.
    Refreshed,
}

struct Observation {
    path: PathBuf,
    status: Status,
    fingerprint: Option<FileFingerprint>,
}

/// Tracks source file fingerprints across runs.
///
/// Single-writer: mutating calls take `&mut self`. Hashing during a directory
/// scan runs in parallel over a shared borrow of the stored state; the results
/// are applied afterwards on the calling thread.
pub struct ChangeTracker {
    config: TrackerConfig,
    state: BuildState,
    dirty: bool,
    sink: SharedSink,
}

impl ChangeTracker {
    /// Creates a tracker and loads the state file named in `config`.
    ///
    /// A missing or corrupt state file yields an empty state.
    pub fn new(config: TrackerConfig, sink: SharedSink) -> Self {
        let state = BuildState::load_or_default(&config.state_file, &sink);
        Self {
            config,
            state,
            dirty: false,
            sink,
        }
    }

    /// The tracker configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The in-memory build state.
    pub fn state(&self) -> &BuildState {
        &self.state
    }

    fn forced(&self) -> bool {
        !self.config.enabled || self.config.force_rebuild
    }

    /// Returns whether `path` differs from its stored fingerprint.
    ///
    /// Always `true` when tracking is disabled or a rebuild is forced, for a
    /// path that was never tracked, and for a tracked path that no longer
    /// exists. Otherwise a size mismatch decides without hashing, matching size
    /// and mtime on a non-racy fingerprint decide "unchanged" without hashing,
    /// and anything else is settled by comparing content hashes.
    ///
    /// The shortcut trusts metadata: if a file's content is rewritten long
    /// after it was fingerprinted and its size and mtime are then restored,
    /// the edit goes unnoticed. Set `verify_content` to always hash, or
    /// `force_rebuild` to treat every file as changed.
    pub fn has_file_changed(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if self.forced() {
            return true;
        }
        let Some(stored) = self.state.files.get(path) else {
            return true;
        };
        let Ok(meta) = std::fs::metadata(path) else {
            return true;
        };
        match stored.quick_check(&meta, self.config.verify_content) {
            QuickCheck::Changed => true,
            QuickCheck::Unchanged => false,
            QuickCheck::Undecided => match SourceHasher::hash_file(path) {
                Ok(hash) => hash != stored.hash,
                Err(_) => true,
            },
        }
    }

    /// Re-fingerprints `path` with the given dependency list.
    ///
    /// If the file no longer exists its fingerprint is dropped instead.
    pub fn update_file_state(
        &mut self,
        path: impl AsRef<Path>,
        dependencies: Vec<PathBuf>,
    ) -> Result<(), TrackerError> {
        let path = path.as_ref();
        match FileFingerprint::capture(path, dependencies) {
            Ok(fp) => {
                self.state.files.insert(path.to_path_buf(), fp);
                self.dirty = true;
                Ok(())
            }
            Err(TrackerError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                if self.state.files.remove(path).is_some() {
                    self.dirty = true;
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Records the outputs produced from `input`, replacing earlier records.
    pub fn track_output_files(&mut self, input: impl AsRef<Path>, outputs: Vec<PathBuf>) {
        self.state
            .output_files
            .insert(input.as_ref().to_path_buf(), outputs);
        self.dirty = true;
    }

    /// Derives the files to regenerate from a set of changed files.
    ///
    /// The result holds the changed files, every tracked file whose stored
    /// dependencies include a changed file, and every input whose recorded
    /// outputs appear in that set. This looks one level deep only; a file that
    /// depends on a dependent of a changed file is not included. Use the
    /// dependency graph for transitive propagation.
    pub fn get_files_to_regenerate(&self, changed: &BTreeSet<PathBuf>) -> BTreeSet<PathBuf> {
        let mut result = changed.clone();

        for (path, fp) in &self.state.files {
            if fp.dependencies.iter().any(|dep| changed.contains(dep)) {
                result.insert(path.clone());
            }
        }

        let producers: Vec<PathBuf> = self
            .state
            .output_files
            .iter()
            .filter(|(_, outputs)| outputs.iter().any(|o| result.contains(o)))
            .map(|(input, _)| input.clone())
            .collect();
        result.extend(producers);

        result
    }

    /// Classifies every file under `dir` without modifying the stored state.
    pub fn detect_changes(&self, dir: &Path) -> Result<ChangeSet, TrackerError> {
        let (changes, _) = self.scan(dir)?;
        Ok(changes)
    }

    /// Walks `dir`, updates fingerprints for everything that changed, and
    /// returns the changed paths (new, modified and deleted), sorted.
    ///
    /// Modified files keep their stored dependency list. Deleted files lose
    /// their fingerprint but keep their output records, so stale outputs can
    /// still be found through [`outputs_of`](Self::outputs_of).
    pub fn get_changed_files(&mut self, dir: &Path) -> Result<Vec<PathBuf>, TrackerError> {
        let (changes, observations) = self.scan(dir)?;

        for obs in observations {
            if let Some(fp) = obs.fingerprint {
                self.state.files.insert(obs.path, fp);
                self.dirty = true;
            }
        }
        for path in &changes.deleted_files {
            self.state.files.remove(path);
            self.dirty = true;
        }

        self.sink.emit(LogEvent::debug(
            Component::Tracker,
            format!(
                "{}: {} new, {} modified, {} deleted, {} unchanged",
                dir.display(),
                changes.new_files.len(),
                changes.modified_files.len(),
                changes.deleted_files.len(),
                changes.unchanged_files.len()
            ),
        ));
        Ok(changes.changed())
    }

    fn scan(&self, dir: &Path) -> Result<(ChangeSet, Vec<Observation>), TrackerError> {
        let skip = self.skip_list();
        let files = SourceHasher::walk(dir, &self.config.ignore, &skip)?;

        let observations: Vec<Observation> = files
            .into_par_iter()
            .map(|path| self.observe(path))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();

        let mut changes = ChangeSet::default();
        let seen: HashSet<&Path> = observations.iter().map(|o| o.path.as_path()).collect();
        for obs in &observations {
            let bucket = match obs.status {
                Status::New => &mut changes.new_files,
                Status::Modified => &mut changes.modified_files,
                Status::Unchanged | Status::Refreshed => &mut changes.unchanged_files,
            };
            bucket.push(obs.path.clone());
        }
        changes.deleted_files = self
            .state
            .files
            .keys()
            .filter(|p| p.starts_with(dir) && !seen.contains(p.as_path()) && !p.exists())
            .cloned()
            .collect();
        changes.sort();

        Ok((changes, observations))
    }

    /// Compares one walked file with its stored fingerprint.
    ///
    /// Returns `Ok(None)` if the file vanished after the walk listed it.
    fn observe(&self, path: PathBuf) -> Result<Option<Observation>, TrackerError> {
        let stored = self.state.files.get(&path);
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(TrackerError::Io { path, source }),
        };

        if let (Some(fp), false) = (stored, self.forced()) {
            if fp.quick_check(&meta, self.config.verify_content) == QuickCheck::Unchanged {
                return Ok(Some(Observation {
                    path,
                    status: Status::Unchanged,
                    fingerprint: None,
                }));
            }
        }

        let dependencies = stored.map(|fp| fp.dependencies.clone()).unwrap_or_default();
        let fresh = match FileFingerprint::capture(&path, dependencies) {
            Ok(fp) => fp,
            Err(TrackerError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };
        let status = match stored {
            None => Status::New,
            Some(_) if self.forced() => Status::Modified,
            Some(fp) if fp.hash != fresh.hash => Status::Modified,
            Some(_) => Status::Refreshed,
        };
        Ok(Some(Observation {
            path,
            status,
            fingerprint: Some(fresh),
        }))
    }

    fn skip_list(&self) -> Vec<PathBuf> {
        let state_file = &self.config.state_file;
        let mut skip = vec![state_file.clone()];
        if let Ok(canonical) = state_file.canonicalize() {
            skip.push(canonical);
        }
        skip
    }

    /// Writes the state file if anything changed since the last save.
    ///
    /// Returns whether a write happened. A failed write is returned to the
    /// caller and the state stays dirty.
    pub fn save_state(&mut self) -> Result<bool, TrackerError> {
        if !self.dirty {
            return Ok(false);
        }
        self.state.timestamp = Timestamp::now();
        self.state.save(&self.config.state_file)?;
        self.dirty = false;
        self.sink.emit(LogEvent::debug(
            Component::Tracker,
            format!(
                "saved {} fingerprints to {}",
                self.state.files.len(),
                self.config.state_file.display()
            ),
        ));
        Ok(true)
    }

    /// The stored fingerprint for `path`.
    pub fn fingerprint(&self, path: impl AsRef<Path>) -> Option<&FileFingerprint> {
        self.state.files.get(path.as_ref())
    }

    /// Outputs recorded for `input`. Empty if none were recorded.
    pub fn outputs_of(&self, input: impl AsRef<Path>) -> &[PathBuf] {
        self.state
            .output_files
            .get(input.as_ref())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every tracked path, sorted.
    pub fn tracked_files(&self) -> impl Iterator<Item = &Path> + '_ {
        self.state.files.keys().map(PathBuf::as_path)
    }

    /// Returns `true` if the state has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forgets every fingerprint and output record.
    pub fn clear_state(&mut self) {
        self.state = BuildState::default();
        self.dirty = true;
    }
}
