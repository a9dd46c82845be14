//! The incremental build orchestrator.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use kiln_cache::ContentCache;
use kiln_common::Timestamp;
use kiln_config::ProjectConfig;
use kiln_graph::DependencyGraph;
use kiln_log::{Component, LogEvent, SharedSink};
use kiln_tracker::ChangeTracker;

use crate::error::BuildError;
use crate::plan::BuildPlan;

/// Returns a copy of `config` with every path made absolute against `root`.
///
/// The cache directory is filled in with its default first, so a filesystem
/// cache and `clean` agree on where entries live.
pub fn resolve_config(root: &Path, config: &ProjectConfig) -> ProjectConfig {
    let mut config = config.clone();
    config.cache.directory = Some(config.cache.directory_or_default());
    config.resolve_paths(root);
    config
}

/// Per-project build session combining the tracker and the dependency graph.
pub struct IncrementalBuild {
    root: PathBuf,
    config: ProjectConfig,
    graph: DependencyGraph,
    tracker: ChangeTracker,
    sink: SharedSink,
}

impl IncrementalBuild {
    /// Opens the build session for the project at `root`.
    ///
    /// Loads the build state and the graph snapshot named in `config`. Either
    /// one falling back to empty is logged, never fatal: the run then simply
    /// rebuilds more.
    pub fn open(root: &Path, config: &ProjectConfig, sink: SharedSink) -> Self {
        let config = resolve_config(root, config);
        let tracker = ChangeTracker::new(config.tracker.clone(), sink.clone());
        let graph = load_graph(&config.graph.state_file, &sink);
        Self {
            root: root.to_path_buf(),
            config,
            graph,
            tracker,
            sink,
        }
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The configuration with all paths resolved.
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// The dependency graph.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Mutable access to the dependency graph.
    pub fn graph_mut(&mut self) -> &mut DependencyGraph {
        &mut self.graph
    }

    /// The change tracker.
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Mutable access to the change tracker.
    pub fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    /// Creates a content-addressed cache for one kind of artifact using the
    /// project's cache settings.
    ///
    /// Each pipeline step passes its own `namespace` (for example `"parsed"`
    /// and `"html"`), so steps keyed on the same raw content keep separate
    /// entries. On the filesystem backend the namespace is a subdirectory of
    /// the cache directory.
    pub fn cache<T>(&self, namespace: &str) -> ContentCache<T>
    where
        T: Clone + Serialize + DeserializeOwned,
    {
        ContentCache::new(self.config.cache.namespaced(namespace), self.sink.clone())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            self.root.join(path)
        } else {
            path.to_path_buf()
        }
    }

    /// Best known modification time of `path`: the tracker's fingerprint, then
    /// the filesystem, then the epoch.
    fn mtime_of(&self, path: &Path) -> Timestamp {
        if let Some(fp) = self.tracker.fingerprint(path) {
            return fp.modified_time;
        }
        std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map(Timestamp::from_system_time)
            .unwrap_or(Timestamp::EPOCH)
    }

    /// Detects changes under `source_dir` and computes what must be rebuilt.
    ///
    /// Every changed file is marked in the graph (gaining a node if it had
    /// none). Deleted files are marked too, so their dependents and outputs are
    /// folded into the plan, and are then removed from the graph. The tracker
    /// state is updated in memory; nothing is written until
    /// [`commit`](Self::commit).
    pub fn plan(&mut self, source_dir: &Path) -> Result<BuildPlan, BuildError> {
        let source_dir = self.resolve(source_dir);
        let (deleted, changed): (Vec<PathBuf>, Vec<PathBuf>) = self
            .tracker
            .get_changed_files(&source_dir)?
            .into_iter()
            .partition(|path| !path.exists());

        for path in &changed {
            let modified = self.mtime_of(path);
            if !self.graph.contains(path) {
                self.graph.add_node(path, modified);
            }
            self.graph.mark_changed(path, modified);
        }
        let now = Timestamp::now();
        for path in &deleted {
            self.graph.mark_changed(path, now);
        }

        let mut files = self.graph.get_files_to_regenerate();
        let mut outputs = self.graph.get_outputs_to_regenerate();
        for path in &deleted {
            self.graph.remove_node(path);
        }

        let changed_set: BTreeSet<PathBuf> = changed.iter().chain(&deleted).cloned().collect();
        let mut tracker_files = self.tracker.get_files_to_regenerate(&changed_set);
        files.extend(tracker_files.iter().cloned());
        for path in files.iter().chain(&deleted) {
            outputs.extend(self.tracker.outputs_of(path).iter().cloned());
        }

        let gone: BTreeSet<&PathBuf> = deleted.iter().collect();
        files.retain(|path| !gone.contains(path));
        tracker_files.retain(|path| !gone.contains(path));

        self.sink.emit(LogEvent::info(
            Component::Build,
            format!(
                "{} changed, {} deleted, {} files and {} outputs to regenerate",
                changed.len(),
                deleted.len(),
                files.len(),
                outputs.len()
            ),
        ));

        Ok(BuildPlan {
            changed,
            deleted,
            files,
            outputs,
            tracker_files,
        })
    }

    /// Records the files `path` depends on, replacing what was known before.
    ///
    /// Re-fingerprints `path` in the tracker with the new dependency list and
    /// rewrites its outgoing graph edges.
    pub fn record_dependencies(
        &mut self,
        path: impl AsRef<Path>,
        dependencies: Vec<PathBuf>,
    ) -> Result<(), BuildError> {
        let path = path.as_ref();
        self.tracker.update_file_state(path, dependencies.clone())?;

        let modified = self.mtime_of(path);
        for stale in self.graph.dependencies_of(path) {
            if !dependencies.contains(&stale) {
                self.graph.remove_dependency(path, &stale);
            }
        }
        self.graph.add_node(path, modified);
        for dep in &dependencies {
            let dep_modified = self.mtime_of(dep);
            self.graph.add_dependency(path, dep, modified, dep_modified);
        }
        Ok(())
    }

    /// Records the outputs produced by building `path`, replacing what was
    /// known before in both the graph and the tracker.
    pub fn record_outputs(&mut self, path: impl AsRef<Path>, outputs: Vec<PathBuf>) {
        let path = path.as_ref();
        let modified = self.mtime_of(path);
        self.graph.replace_outputs(path, outputs.iter().cloned(), modified);
        self.tracker.track_output_files(path, outputs);
    }

    /// Persists the run: saves the build state, writes the graph snapshot and
    /// clears the graph's changed flags.
    ///
    /// Call only after every file in the plan was rebuilt. A failure leaves the
    /// changed flags set so the work is not forgotten.
    pub fn commit(&mut self) -> Result<(), BuildError> {
        let wrote_state = self.tracker.save_state()?;
        self.graph.save(&self.config.graph.state_file)?;
        self.graph.reset_changed_state();
        self.sink.emit(LogEvent::debug(
            Component::Build,
            format!(
                "committed run ({} graph nodes, state {})",
                self.graph.len(),
                if wrote_state { "saved" } else { "unchanged" }
            ),
        ));
        Ok(())
    }
}

fn load_graph(path: &Path, sink: &SharedSink) -> DependencyGraph {
    if !path.exists() {
        return DependencyGraph::new(sink.clone());
    }
    match DependencyGraph::load(path, sink.clone()) {
        Ok(graph) => graph,
        Err(e) => {
            sink.emit(LogEvent::warn(
                Component::Build,
                format!("ignoring unusable dependency graph: {e}"),
            ));
            DependencyGraph::new(sink.clone())
        }
    }
}
