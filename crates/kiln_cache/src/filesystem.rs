//! One-file-per-entry cache backend.
//!
//! Each entry lives at `<dir>/<key>.json` as a serialized [`CacheEntry`]. Files
//! are independent, so distinct keys can be written concurrently; concurrent
//! writers to the same key race and the last rename wins.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

use crate::entry::{CacheEntry, ENTRY_SCHEMA_VERSION};
use crate::error::CacheError;

/// File extension of entry files.
const ENTRY_EXT: &str = "json";

/// File extension of in-flight writes.
const TEMP_EXT: &str = "tmp";

/// Content-addressed store of JSON entry files in a single directory.
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    /// Creates a store rooted at `dir`. Nothing is touched on disk until
    /// [`ensure_dir`](Self::ensure_dir) or a write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory holding the entry files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the entry directory if needed and checks it is a directory.
    pub fn ensure_dir(&self) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            source: e,
        })?;
        let meta = std::fs::metadata(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            source: e,
        })?;
        if !meta.is_dir() {
            return Err(CacheError::Io {
                path: self.dir.clone(),
                source: io::Error::new(io::ErrorKind::Other, "cache path is not a directory"),
            });
        }
        Ok(())
    }

    /// Returns the file path for the entry with the given key.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_EXT}"))
    }

    /// Writes an entry, replacing any existing file for the same key.
    ///
    /// The record is written to a temporary sibling and renamed into place so
    /// readers never observe a half-written entry.
    pub fn write<T: Serialize>(&self, entry: &CacheEntry<T>) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(entry).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        let path = self.entry_path(&entry.key);
        let tmp = self
            .dir
            .join(format!("{}.{}.{TEMP_EXT}", entry.key, std::process::id()));
        std::fs::write(&tmp, &bytes).map_err(|e| CacheError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            CacheError::Io { path, source: e }
        })
    }

    /// Reads and validates the entry for `key`.
    ///
    /// Returns `Ok(None)` if no file exists. Unparsable content, a schema
    /// mismatch, or a record whose key differs from its file name is reported as
    /// corruption so the caller can delete the file.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<CacheEntry<T>>, CacheError> {
        let path = self.entry_path(key);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io { path, source: e }),
        };
        Self::decode(&path, key, &raw).map(Some)
    }

    fn decode<T: DeserializeOwned>(
        path: &Path,
        key: &str,
        raw: &[u8],
    ) -> Result<CacheEntry<T>, CacheError> {
        let entry: CacheEntry<T> =
            serde_json::from_slice(raw).map_err(|e| CacheError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if entry.schema_version != ENTRY_SCHEMA_VERSION {
            return Err(CacheError::SchemaMismatch {
                path: path.to_path_buf(),
                expected: ENTRY_SCHEMA_VERSION,
                actual: entry.schema_version,
            });
        }
        if entry.key != key {
            return Err(CacheError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("record key {} does not match file name", entry.key),
            });
        }
        Ok(entry)
    }

    /// Removes the entry for `key`. Returns `true` if a file was removed.
    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }

    /// Lists the keys of all entry files. A missing directory has no keys.
    pub fn keys(&self) -> Result<Vec<String>, CacheError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CacheError::Io {
                    path: self.dir.clone(),
                    source: e,
                })
            }
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Number of entry files on disk.
    pub fn len(&self) -> usize {
        self.keys().map(|k| k.len()).unwrap_or(0)
    }

    /// Returns `true` if no entry files exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry file and leftover temporary file. Returns how many
    /// entries were removed. The directory itself is kept.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(CacheError::Io {
                    path: self.dir.clone(),
                    source: e,
                })
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some(ENTRY_EXT) => {
                    if std::fs::remove_file(&path).is_ok() {
                        removed += 1;
                    }
                }
                Some(TEMP_EXT) => {
                    let _ = std::fs::remove_file(&path);
                }
                _ => {}
            }
        }
        Ok(removed)
    }
}
