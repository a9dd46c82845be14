//! The persisted build state document.
//!
//! Stored as pretty-printed JSON at the configured state file:
//!
//! ```json
//! {
//!   "schema_version": 1,
//!   "timestamp": 1718000000000,
//!   "files": { "docs/a.md": { "path": "docs/a.md", "hash": "…", "size": 12, … } },
//!   "output_files": { "docs/a.md": ["site/a.html"] }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use kiln_common::Timestamp;
use kiln_log::{Component, LogEvent, SharedSink};

use crate::error::TrackerError;
use crate::fingerprint::FileFingerprint;

/// Current build state layout version.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Everything the tracker remembers between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    /// Layout version, checked on load.
    pub schema_version: u32,
    /// When the state was last saved.
    pub timestamp: Timestamp,
    /// Fingerprint of every tracked source file.
    #[serde(default)]
    pub files: BTreeMap<PathBuf, FileFingerprint>,
    /// Outputs recorded for each input file.
    #[serde(default)]
    pub output_files: BTreeMap<PathBuf, Vec<PathBuf>>,
}

impl Default for BuildState {
    fn default() -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            timestamp: Timestamp::EPOCH,
            files: BTreeMap::new(),
            output_files: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    schema_version: u32,
}

impl BuildState {
    /// Reads the state file. Returns `Ok(None)` if it does not exist.
    pub fn read(path: &Path) -> Result<Option<Self>, TrackerError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(TrackerError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let parse_err = |e: serde_json::Error| TrackerError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let probe: VersionProbe = serde_json::from_str(&content).map_err(parse_err)?;
        if probe.schema_version != STATE_SCHEMA_VERSION {
            return Err(TrackerError::SchemaMismatch {
                path: path.to_path_buf(),
                expected: STATE_SCHEMA_VERSION,
                actual: probe.schema_version,
            });
        }
        serde_json::from_str(&content).map(Some).map_err(parse_err)
    }

    /// Loads the state file, falling back to an empty state.
    ///
    /// A missing file is the normal first-run case. An unreadable or corrupt
    /// file is reported as a warning; the next save overwrites it.
    pub fn load_or_default(path: &Path, sink: &SharedSink) -> Self {
        match Self::read(path) {
            Ok(Some(state)) => {
                sink.emit(LogEvent::debug(
                    Component::Tracker,
                    format!("loaded {} fingerprints from {}", state.files.len(), path.display()),
                ));
                state
            }
            Ok(None) => {
                sink.emit(LogEvent::debug(
                    Component::Tracker,
                    format!("no build state at {}, starting fresh", path.display()),
                ));
                Self::default()
            }
            Err(e) => {
                let message = if e.is_corrupt_state() {
                    format!("ignoring unusable build state: {e}")
                } else {
                    format!("could not read build state, starting fresh: {e}")
                };
                sink.emit(LogEvent::warn(Component::Tracker, message));
                Self::default()
            }
        }
    }

    /// Writes the state to `path`.
    ///
    /// Creates the parent directory if needed. The document is written to a
    /// temporary sibling and renamed into place, so an interrupted save leaves
    /// the previous state intact.
    pub fn save(&self, path: &Path) -> Result<(), TrackerError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| TrackerError::Encode {
            reason: e.to_string(),
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| TrackerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
        std::fs::write(&tmp, json).map_err(|source| TrackerError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| {
            let _ = std::fs::remove_file(&tmp);
            TrackerError::Io {
                path: path.to_path_buf(),
                source,
            }
        })
    }
}
