//! The content-addressed cache facade used by the build pipeline.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use kiln_common::Timestamp;
use kiln_config::{CacheBackend, CacheConfig};
use kiln_log::{Component, LogEvent, SharedSink};

use crate::entry::{key_for, CacheEntry};
use crate::error::CacheError;
use crate::filesystem::FsStore;
use crate::memory::MemoryStore;

/// Statistics snapshot returned by [`ContentCache::get_stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Whether the cache is currently serving reads and writes.
    pub enabled: bool,
    /// Configured backend.
    pub backend: CacheBackend,
    /// Number of stored entries.
    pub size: usize,
    /// Size bound (memory backend only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
    /// Entry lifetime, if entries expire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,
}

enum Store<T> {
    Memory(MemoryStore<T>),
    Filesystem(FsState),
}

/// Filesystem backend plus its one-time directory bootstrap outcome.
struct FsState {
    store: FsStore,
    ready: Option<bool>,
}

/// A content-addressed key→value cache.
///
/// Keys are the content hash of the raw input passed to each call, so the same
/// bytes always hit the same entry regardless of which file they came from.
/// The cache is an optimization and never a correctness boundary: every read
/// failure is a miss, and write failures are logged and dropped. If the
/// filesystem backend cannot create or access its directory on first use, the
/// cache disables itself for the rest of the process.
///
/// Instances are single-writer; callers must not issue concurrent mutating
/// calls against one cache.
pub struct ContentCache<T> {
    config: CacheConfig,
    store: Store<T>,
    disabled: bool,
    sink: SharedSink,
}

impl<T> ContentCache<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    /// Creates a cache from its configuration. No I/O happens here.
    pub fn new(config: CacheConfig, sink: SharedSink) -> Self {
        let store = match config.backend {
            CacheBackend::Memory => Store::Memory(MemoryStore::new(config.max_entries)),
            CacheBackend::Filesystem => Store::Filesystem(FsState {
                store: FsStore::new(config.directory_or_default()),
                ready: None,
            }),
        };
        Self {
            config,
            store,
            disabled: false,
            sink,
        }
    }

    /// Computes the key under which `raw` is cached.
    pub fn key_for(raw: impl AsRef<[u8]>) -> String {
        key_for(raw.as_ref())
    }

    /// The configuration this cache was built from.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Returns `false` if the cache is configured off or disabled itself.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && !self.disabled
    }

    /// Runs the filesystem bootstrap if needed and reports whether the cache
    /// may serve this call.
    fn activate(&mut self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let Store::Filesystem(fs) = &mut self.store else {
            return true;
        };
        if let Some(ready) = fs.ready {
            return ready;
        }
        match fs.store.ensure_dir() {
            Ok(()) => {
                fs.ready = Some(true);
                true
            }
            Err(e) => {
                fs.ready = Some(false);
                self.disabled = true;
                self.sink.emit(LogEvent::warn(
                    Component::Cache,
                    format!("disabling cache for this run: {e}"),
                ));
                false
            }
        }
    }

    /// Stores `data` under the key of `raw`.
    ///
    /// On the memory backend this may evict the oldest entries. On the
    /// filesystem backend a failed write is logged and otherwise ignored.
    pub fn set(&mut self, raw: impl AsRef<[u8]>, data: T) {
        if !self.activate() {
            return;
        }
        let entry = CacheEntry::new(key_for(raw.as_ref()), data);
        match &mut self.store {
            Store::Memory(mem) => {
                let evicted = mem.insert(entry);
                if evicted > 0 {
                    self.sink.emit(LogEvent::debug(
                        Component::Cache,
                        format!("evicted {evicted} entries"),
                    ));
                }
            }
            Store::Filesystem(fs) => {
                if let Err(e) = fs.store.write(&entry) {
                    self.sink.emit(LogEvent::warn(
                        Component::Cache,
                        format!("failed to write cache entry: {e}"),
                    ));
                }
            }
        }
    }

    /// Returns the value cached for `raw`, if present and unexpired.
    pub fn get(&mut self, raw: impl AsRef<[u8]>) -> Option<T> {
        let key = key_for(raw.as_ref());
        self.lookup(&key, |entry| entry.data.clone())
    }

    /// Returns `true` if [`get`](Self::get) would return a value.
    pub fn has(&mut self, raw: impl AsRef<[u8]>) -> bool {
        let key = key_for(raw.as_ref());
        self.lookup(&key, |_| ()).is_some()
    }

    /// Returns the cached value for `raw`, or computes, stores and returns it.
    pub fn get_or_insert_with<F>(&mut self, raw: impl AsRef<[u8]>, compute: F) -> T
    where
        F: FnOnce() -> T,
    {
        let raw = raw.as_ref();
        if let Some(hit) = self.get(raw) {
            return hit;
        }
        let value = compute();
        self.set(raw, value.clone());
        value
    }

    /// Validates the entry for `key`, dropping it if expired or corrupt, and
    /// projects the live entry through `project`.
    fn lookup<R>(&mut self, key: &str, project: impl FnOnce(&CacheEntry<T>) -> R) -> Option<R> {
        if !self.activate() {
            return None;
        }
        let ttl = self.config.effective_ttl();
        let now = Timestamp::now();
        match &mut self.store {
            Store::Memory(mem) => mem.get_live(key, ttl, now).map(project),
            Store::Filesystem(fs) => match fs.store.read::<T>(key) {
                Ok(Some(entry)) if entry.is_expired(ttl, now) => {
                    let _ = fs.store.remove(key);
                    None
                }
                Ok(Some(entry)) => Some(project(&entry)),
                Ok(None) => None,
                Err(e) => {
                    if e.is_corruption() {
                        let _ = fs.store.remove(key);
                        self.sink.emit(LogEvent::debug(
                            Component::Cache,
                            format!("removed unusable entry: {e}"),
                        ));
                    } else {
                        self.sink
                            .emit(LogEvent::debug(Component::Cache, format!("cache miss: {e}")));
                    }
                    None
                }
            },
        }
    }

    /// Removes the entry for `raw`. A missing entry is not an error.
    pub fn delete(&mut self, raw: impl AsRef<[u8]>) {
        if !self.activate() {
            return;
        }
        let key = key_for(raw.as_ref());
        match &mut self.store {
            Store::Memory(mem) => {
                mem.remove(&key);
            }
            Store::Filesystem(fs) => {
                if let Err(e) = fs.store.remove(&key) {
                    self.report_best_effort("delete", &e);
                }
            }
        }
    }

    /// Removes every entry. Best-effort on the filesystem backend.
    pub fn clear(&mut self) {
        if !self.activate() {
            return;
        }
        match &mut self.store {
            Store::Memory(mem) => mem.clear(),
            Store::Filesystem(fs) => {
                if let Err(e) = fs.store.clear() {
                    self.report_best_effort("clear", &e);
                }
            }
        }
    }

    /// Removes every expired or unusable entry. Returns how many were removed.
    ///
    /// Expiry is otherwise lazy; this is the explicit sweep.
    pub fn prune_expired(&mut self) -> usize {
        if !self.activate() {
            return 0;
        }
        let ttl = self.config.effective_ttl();
        let now = Timestamp::now();
        match &mut self.store {
            Store::Memory(mem) => mem.remove_expired(ttl, now),
            Store::Filesystem(fs) => {
                let keys = match fs.store.keys() {
                    Ok(keys) => keys,
                    Err(e) => {
                        self.report_best_effort("prune", &e);
                        return 0;
                    }
                };
                let mut removed = 0;
                for key in keys {
                    let stale = match fs.store.read::<T>(&key) {
                        Ok(Some(entry)) => entry.is_expired(ttl, now),
                        Ok(None) => false,
                        Err(e) => e.is_corruption(),
                    };
                    if stale && matches!(fs.store.remove(&key), Ok(true)) {
                        removed += 1;
                    }
                }
                removed
            }
        }
    }

    /// Returns a snapshot of the cache's state.
    pub fn get_stats(&self) -> CacheStats {
        let enabled = self.is_enabled();
        let size = match &self.store {
            _ if !enabled => 0,
            Store::Memory(mem) => mem.len(),
            Store::Filesystem(fs) => fs.store.len(),
        };
        CacheStats {
            enabled,
            backend: self.config.backend,
            size,
            max_entries: match self.config.backend {
                CacheBackend::Memory => self.config.max_entries,
                CacheBackend::Filesystem => None,
            },
            ttl: self.config.effective_ttl(),
        }
    }

    fn report_best_effort(&self, op: &str, err: &CacheError) {
        self.sink.emit(LogEvent::debug(
            Component::Cache,
            format!("cache {op} incomplete: {err}"),
        ));
    }
}
