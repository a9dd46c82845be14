//! Configuration types deserialized from `kiln.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::duration::deserialize_opt_duration;

/// Default cache directory, relative to the project root.
pub const DEFAULT_CACHE_DIR: &str = ".kiln/cache";

/// Default build-state file, relative to the project root.
pub const DEFAULT_STATE_FILE: &str = ".kiln/build-state.json";

/// Default dependency-graph snapshot file, relative to the project root.
pub const DEFAULT_GRAPH_FILE: &str = ".kiln/graph.json";

/// The top-level configuration parsed from `kiln.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectConfig {
    /// Content-addressed cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// File change tracker settings.
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Dependency graph persistence settings.
    #[serde(default)]
    pub graph: GraphConfig,
}

impl ProjectConfig {
    /// Makes every relative path in the configuration absolute against `root`.
    pub fn resolve_paths(&mut self, root: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };
        if let Some(dir) = self.cache.directory.as_mut() {
            resolve(dir);
        }
        resolve(&mut self.tracker.state_file);
        resolve(&mut self.graph.state_file);
    }
}

/// Which storage backend the content-addressed cache uses.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// An in-process table, lost at exit.
    #[default]
    Memory,
    /// One file per entry in a cache directory.
    Filesystem,
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackend::Memory => write!(f, "memory"),
            CacheBackend::Filesystem => write!(f, "filesystem"),
        }
    }
}

/// Settings for the content-addressed cache.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Master switch. A disabled cache always misses and never stores.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Storage backend.
    #[serde(default)]
    pub backend: CacheBackend,
    /// Upper bound on the number of entries (memory backend only).
    #[serde(default)]
    pub max_entries: Option<usize>,
    /// Entry lifetime. Absent or zero means entries never expire.
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub ttl: Option<Duration>,
    /// Entry directory (filesystem backend only).
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl CacheConfig {
    /// An enabled in-memory cache with optional bounds.
    pub fn memory(max_entries: Option<usize>, ttl: Option<Duration>) -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            max_entries,
            ttl,
            directory: None,
        }
    }

    /// An enabled filesystem cache rooted at `directory`.
    pub fn filesystem(directory: impl Into<PathBuf>, ttl: Option<Duration>) -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Filesystem,
            max_entries: None,
            ttl,
            directory: Some(directory.into()),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// The TTL that actually applies: `None` when absent or zero.
    pub fn effective_ttl(&self) -> Option<Duration> {
        self.ttl.filter(|ttl| !ttl.is_zero())
    }

    /// The configured directory, or [`DEFAULT_CACHE_DIR`].
    pub fn directory_or_default(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
    }

    /// A copy of this configuration scoped to one kind of artifact.
    ///
    /// Filesystem entries move to the `namespace` subdirectory, so caches of
    /// different artifact types keyed on the same input never share a file.
    pub fn namespaced(&self, namespace: &str) -> Self {
        Self {
            directory: Some(self.directory_or_default().join(namespace)),
            ..self.clone()
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::memory(None, None)
    }
}

/// Settings for the file change tracker.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TrackerConfig {
    /// When `false`, every file is reported as changed.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Treat every file as changed for this run, regardless of fingerprints.
    #[serde(default)]
    pub force_rebuild: bool,
    /// Where the build state is persisted.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Directory names skipped while walking the source tree.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
    /// Always compare content hashes, skipping the size/mtime shortcut.
    #[serde(default)]
    pub verify_content: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            force_rebuild: false,
            state_file: default_state_file(),
            ignore: default_ignore(),
            verify_content: false,
        }
    }
}

/// Settings for dependency-graph persistence.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GraphConfig {
    /// Where the graph snapshot is persisted between runs.
    #[serde(default = "default_graph_file")]
    pub state_file: PathBuf,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            state_file: default_graph_file(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_state_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_FILE)
}

fn default_graph_file() -> PathBuf {
    PathBuf::from(DEFAULT_GRAPH_FILE)
}

fn default_ignore() -> Vec<String> {
    [".git", ".kiln", "node_modules", "target"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_ttl_treats_zero_as_none() {
        let mut cfg = CacheConfig::memory(None, Some(Duration::ZERO));
        assert_eq!(cfg.effective_ttl(), None);
        cfg.ttl = Some(Duration::from_secs(5));
        assert_eq!(cfg.effective_ttl(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn directory_fallback() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.directory_or_default(), PathBuf::from(DEFAULT_CACHE_DIR));
        let cfg = CacheConfig::filesystem("/tmp/kc", None);
        assert_eq!(cfg.directory_or_default(), PathBuf::from("/tmp/kc"));
    }

    #[test]
    fn namespaced_joins_subdirectory() {
        let cfg = CacheConfig::filesystem("/site/.kiln/cache", Some(Duration::from_secs(60)));
        let parsed = cfg.namespaced("parsed");
        assert_eq!(parsed.directory, Some(PathBuf::from("/site/.kiln/cache/parsed")));
        assert_eq!(parsed.ttl, cfg.ttl);
        assert_eq!(
            CacheConfig::default().namespaced("html").directory_or_default(),
            PathBuf::from(DEFAULT_CACHE_DIR).join("html")
        );
    }

    #[test]
    fn disabled_cache() {
        let cfg = CacheConfig::disabled();
        assert!(!cfg.enabled);
        assert_eq!(cfg.backend, CacheBackend::Memory);
    }

    #[test]
    fn resolve_paths_joins_relative_only() {
        let mut cfg = ProjectConfig::default();
        cfg.cache.directory = Some(PathBuf::from("cache"));
        cfg.graph.state_file = PathBuf::from("/abs/graph.json");
        cfg.resolve_paths(Path::new("/project"));
        assert_eq!(cfg.cache.directory, Some(PathBuf::from("/project/cache")));
        assert_eq!(
            cfg.tracker.state_file,
            PathBuf::from("/project/.kiln/build-state.json")
        );
        assert_eq!(cfg.graph.state_file, PathBuf::from("/abs/graph.json"));
    }

    #[test]
    fn backend_display() {
        assert_eq!(CacheBackend::Memory.to_string(), "memory");
        assert_eq!(CacheBackend::Filesystem.to_string(), "filesystem");
    }
}
