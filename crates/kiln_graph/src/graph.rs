//! The dependency graph and its change-closure queries.

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};

use kiln_common::Timestamp;
use kiln_log::{Component, LogEvent, SharedSink};

/// Per-node payload stored in the arena.
#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) path: PathBuf,
    pub(crate) last_modified: Timestamp,
    pub(crate) changed: bool,
    pub(crate) outputs: BTreeSet<PathBuf>,
}

/// A read-only view of one node and its edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// The file this node stands for.
    pub path: PathBuf,
    /// Files this file depends on.
    pub dependencies: BTreeSet<PathBuf>,
    /// Files that depend on this file.
    pub dependents: BTreeSet<PathBuf>,
    /// Last known modification time.
    pub last_modified: Timestamp,
    /// Whether the file was marked changed since the last reset.
    pub changed: bool,
    /// Files produced by building this file.
    pub outputs: BTreeSet<PathBuf>,
}

/// A directed graph of "depends on" relations between file paths.
///
/// Nodes live in a `StableDiGraph` arena addressed by `NodeIndex`, with a
/// path lookup table beside it. An edge `a → b` means `a` depends on `b`, so a
/// node's dependencies are its outgoing neighbours and its dependents are its
/// incoming neighbours. Because each relation is a single edge, the two views
/// cannot disagree, and removing a node removes every incident edge.
///
/// Every mutation is total: additive calls create missing nodes, and removing
/// or marking an unknown path does nothing.
pub struct DependencyGraph {
    graph: StableDiGraph<NodeData, ()>,
    index: HashMap<PathBuf, NodeIndex>,
    sink: SharedSink,
}

impl DependencyGraph {
    /// Creates an empty graph.
    pub fn new(sink: SharedSink) -> Self {
        Self {
            graph: StableDiGraph::default(),
            index: HashMap::new(),
            sink,
        }
    }

    pub(crate) fn sink(&self) -> &SharedSink {
        &self.sink
    }

    /// Returns the node for `path`, creating it if needed, and stamps `last_modified`.
    fn upsert(&mut self, path: &Path, last_modified: Timestamp) -> NodeIndex {
        if let Some(&idx) = self.index.get(path) {
            self.graph[idx].last_modified = last_modified;
            return idx;
        }
        let idx = self.graph.add_node(NodeData {
            path: path.to_path_buf(),
            last_modified,
            changed: false,
            outputs: BTreeSet::new(),
        });
        self.index.insert(path.to_path_buf(), idx);
        idx
    }

    /// Adds a node, or updates its modification time if it already exists.
    pub fn add_node(&mut self, path: impl AsRef<Path>, last_modified: Timestamp) {
        self.upsert(path.as_ref(), last_modified);
    }

    /// Removes a node and detaches it from all its neighbours.
    pub fn remove_node(&mut self, path: impl AsRef<Path>) {
        if let Some(idx) = self.index.remove(path.as_ref()) {
            self.graph.remove_node(idx);
        }
    }

    /// Records that `from` depends on `to`, creating either node if needed.
    pub fn add_dependency(
        &mut self,
        from: impl AsRef<Path>,
        to: impl AsRef<Path>,
        from_modified: Timestamp,
        to_modified: Timestamp,
    ) {
        let from = self.upsert(from.as_ref(), from_modified);
        let to = self.upsert(to.as_ref(), to_modified);
        self.graph.update_edge(from, to, ());
    }

    /// Removes the edge `from → to` if it exists.
    pub fn remove_dependency(&mut self, from: impl AsRef<Path>, to: impl AsRef<Path>) {
        let from = self.index.get(from.as_ref()).copied();
        let to = self.index.get(to.as_ref()).copied();
        let (Some(from), Some(to)) = (from, to) else {
            return;
        };
        if let Some(edge) = self.graph.find_edge(from, to) {
            self.graph.remove_edge(edge);
        }
    }

    /// Records that building `from` produces `output`.
    pub fn add_output(
        &mut self,
        from: impl AsRef<Path>,
        output: impl AsRef<Path>,
        from_modified: Timestamp,
    ) {
        let idx = self.upsert(from.as_ref(), from_modified);
        self.graph[idx].outputs.insert(output.as_ref().to_path_buf());
    }

    /// Replaces everything `from` is recorded as producing with `outputs`.
    pub fn replace_outputs<I, P>(
        &mut self,
        from: impl AsRef<Path>,
        outputs: I,
        from_modified: Timestamp,
    ) where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let idx = self.upsert(from.as_ref(), from_modified);
        self.graph[idx].outputs = outputs.into_iter().map(Into::into).collect();
    }

    /// Flags `path` as changed. Unknown paths are ignored.
    pub fn mark_changed(&mut self, path: impl AsRef<Path>, new_modified: Timestamp) {
        let path = path.as_ref();
        match self.index.get(path) {
            Some(&idx) => {
                let node = &mut self.graph[idx];
                node.changed = true;
                node.last_modified = new_modified;
            }
            None => self.sink.emit(LogEvent::debug(
                Component::Graph,
                format!("ignoring change to unknown path {}", path.display()),
            )),
        }
    }

    /// Returns every file affected by the current changes.
    ///
    /// Starts from the changed nodes and follows "depended on by" edges until no
    /// new node is reached. Each node is visited at most once, so cycles
    /// terminate and all their members end up in the result together.
    pub fn get_files_to_regenerate(&self) -> BTreeSet<PathBuf> {
        let mut seen: BTreeSet<NodeIndex> = BTreeSet::new();
        let mut queue: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| self.graph[idx].changed)
            .collect();
        seen.extend(queue.iter().copied());

        while let Some(idx) = queue.pop_front() {
            for dependent in self.graph.neighbors_directed(idx, Direction::Incoming) {
                if seen.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }

        seen.into_iter()
            .map(|idx| self.graph[idx].path.clone())
            .collect()
    }

    /// Returns the union of the outputs of [`get_files_to_regenerate`](Self::get_files_to_regenerate).
    pub fn get_outputs_to_regenerate(&self) -> BTreeSet<PathBuf> {
        self.get_files_to_regenerate()
            .iter()
            .filter_map(|path| self.index.get(path))
            .flat_map(|&idx| self.graph[idx].outputs.iter().cloned())
            .collect()
    }

    /// Clears the changed flag on every node.
    ///
    /// Call once a build over the current affected set has completed.
    pub fn reset_changed_state(&mut self) {
        for node in self.graph.node_weights_mut() {
            node.changed = false;
        }
    }

    /// Paths currently flagged as changed.
    pub fn changed_files(&self) -> BTreeSet<PathBuf> {
        self.graph
            .node_indices()
            .map(|idx| &self.graph[idx])
            .filter(|n| n.changed)
            .map(|n| n.path.clone())
            .collect()
    }

    fn neighbours(&self, path: &Path, dir: Direction) -> BTreeSet<PathBuf> {
        match self.index.get(path) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, dir)
                .map(|n| self.graph[n].path.clone())
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// Files `path` depends on. Empty for unknown paths.
    pub fn dependencies_of(&self, path: impl AsRef<Path>) -> BTreeSet<PathBuf> {
        self.neighbours(path.as_ref(), Direction::Outgoing)
    }

    /// Files that depend on `path`. Empty for unknown paths.
    pub fn dependents_of(&self, path: impl AsRef<Path>) -> BTreeSet<PathBuf> {
        self.neighbours(path.as_ref(), Direction::Incoming)
    }

    /// Outputs recorded for `path`. Empty for unknown paths.
    pub fn outputs_of(&self, path: impl AsRef<Path>) -> BTreeSet<PathBuf> {
        self.index
            .get(path.as_ref())
            .map(|&idx| self.graph[idx].outputs.clone())
            .unwrap_or_default()
    }

    /// Returns a full view of the node for `path`.
    pub fn node(&self, path: impl AsRef<Path>) -> Option<GraphNode> {
        let path = path.as_ref();
        let &idx = self.index.get(path)?;
        let data = &self.graph[idx];
        Some(GraphNode {
            path: data.path.clone(),
            dependencies: self.neighbours(path, Direction::Outgoing),
            dependents: self.neighbours(path, Direction::Incoming),
            last_modified: data.last_modified,
            changed: data.changed,
            outputs: data.outputs.clone(),
        })
    }

    /// All nodes, ordered by path.
    pub fn nodes(&self) -> Vec<GraphNode> {
        let mut paths: Vec<&PathBuf> = self.index.keys().collect();
        paths.sort();
        paths.into_iter().filter_map(|p| self.node(p)).collect()
    }

    /// Returns `true` if `path` has a node.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.index.contains_key(path.as_ref())
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Sets the outputs of `path` wholesale. Used when restoring a snapshot.
    pub(crate) fn set_outputs(&mut self, path: &Path, outputs: BTreeSet<PathBuf>) {
        if let Some(&idx) = self.index.get(path) {
            self.graph[idx].outputs = outputs;
        }
    }

    /// Adds the edge `from → to` without touching modification times.
    pub(crate) fn link(&mut self, from: &Path, to: &Path) {
        let from = self.upsert_keep_time(from);
        let to = self.upsert_keep_time(to);
        self.graph.update_edge(from, to, ());
    }

    fn upsert_keep_time(&mut self, path: &Path) -> NodeIndex {
        match self.index.get(path) {
            Some(&idx) => idx,
            None => self.upsert(path, Timestamp::EPOCH),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_log::{Level, MemorySink};

    fn t(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    fn graph() -> DependencyGraph {
        DependencyGraph::new(kiln_log::null_sink())
    }

    fn set(paths: &[&str]) -> BTreeSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    /// Checks `B ∈ A.dependencies ⇔ A ∈ B.dependents` for every node pair.
    fn assert_symmetric(g: &DependencyGraph) {
        for node in g.nodes() {
            for dep in &node.dependencies {
                assert!(g.dependents_of(dep).contains(&node.path));
            }
            for dependent in &node.dependents {
                assert!(g.dependencies_of(dependent).contains(&node.path));
            }
        }
    }

    #[test]
    fn add_node_is_idempotent() {
        let mut g = graph();
        g.add_node("a.md", t(1));
        g.add_node("a.md", t(5));
        assert_eq!(g.len(), 1);
        assert_eq!(g.node("a.md").unwrap().last_modified, t(5));
    }

    #[test]
    fn add_dependency_is_symmetric() {
        let mut g = graph();
        g.add_dependency("a.md", "b.md", t(1), t(2));
        let a = g.node("a.md").unwrap();
        let b = g.node("b.md").unwrap();
        assert!(a.dependencies.contains(Path::new("b.md")));
        assert!(b.dependents.contains(Path::new("a.md")));
        assert!(a.dependents.is_empty());
        assert_eq!(b.last_modified, t(2));
    }

    #[test]
    fn duplicate_dependency_is_single_edge() {
        let mut g = graph();
        g.add_dependency("a", "b", t(1), t(1));
        g.add_dependency("a", "b", t(1), t(1));
        assert_eq!(g.dependencies_of("a").len(), 1);
        assert_eq!(g.dependents_of("b").len(), 1);
    }

    #[test]
    fn remove_node_strips_neighbours() {
        let mut g = graph();
        g.add_dependency("a", "b", t(1), t(1));
        g.add_dependency("b", "c", t(1), t(1));
        g.add_dependency("d", "b", t(1), t(1));
        g.remove_node("b");
        assert!(!g.contains("b"));
        assert!(g.dependencies_of("a").is_empty());
        assert!(g.dependencies_of("d").is_empty());
        assert!(g.dependents_of("c").is_empty());
        assert_symmetric(&g);
    }

    #[test]
    fn removed_path_can_be_readded() {
        let mut g = graph();
        g.add_dependency("a", "b", t(1), t(1));
        g.remove_node("b");
        g.add_dependency("c", "b", t(2), t(2));
        assert_eq!(g.dependents_of("b"), set(&["c"]));
        assert_symmetric(&g);
    }

    #[test]
    fn unknown_paths_are_noops() {
        let sink = MemorySink::shared();
        let mut g = DependencyGraph::new(sink.clone());
        g.remove_node("ghost");
        g.mark_changed("ghost", t(1));
        g.remove_dependency("ghost", "other");
        assert!(g.is_empty());
        assert!(g.get_files_to_regenerate().is_empty());
        assert!(sink.contains(Level::Debug, "ghost"));
    }

    #[test]
    fn chain_closure() {
        let mut g = graph();
        g.add_dependency("A", "B", t(1), t(1));
        g.add_dependency("B", "C", t(1), t(1));
        g.mark_changed("C", t(9));
        assert_eq!(g.get_files_to_regenerate(), set(&["A", "B", "C"]));
        assert_eq!(g.node("C").unwrap().last_modified, t(9));
    }

    #[test]
    fn closure_does_not_follow_dependencies() {
        let mut g = graph();
        g.add_dependency("A", "B", t(1), t(1));
        g.add_dependency("B", "C", t(1), t(1));
        g.mark_changed("A", t(2));
        assert_eq!(g.get_files_to_regenerate(), set(&["A"]));
    }

    #[test]
    fn diamond_closure() {
        let mut g = graph();
        g.add_dependency("page1", "partial", t(1), t(1));
        g.add_dependency("page2", "partial", t(1), t(1));
        g.add_dependency("index", "page1", t(1), t(1));
        g.add_dependency("index", "page2", t(1), t(1));
        g.add_node("unrelated", t(1));
        g.mark_changed("partial", t(2));
        assert_eq!(
            g.get_files_to_regenerate(),
            set(&["index", "page1", "page2", "partial"])
        );
    }

    #[test]
    fn cycles_terminate() {
        let mut g = graph();
        g.add_dependency("a", "b", t(1), t(1));
        g.add_dependency("b", "c", t(1), t(1));
        g.add_dependency("c", "a", t(1), t(1));
        g.add_dependency("x", "a", t(1), t(1));
        g.mark_changed("b", t(2));
        assert_eq!(g.get_files_to_regenerate(), set(&["a", "b", "c", "x"]));
    }

    #[test]
    fn self_dependency_terminates() {
        let mut g = graph();
        g.add_dependency("a", "a", t(1), t(1));
        g.mark_changed("a", t(2));
        assert_eq!(g.get_files_to_regenerate(), set(&["a"]));
    }

    #[test]
    fn outputs_follow_closure() {
        let mut g = graph();
        g.add_dependency("A", "B", t(1), t(1));
        g.add_output("A", "out/a.html", t(1));
        g.add_output("B", "out/b.html", t(1));
        g.add_output("B", "out/b.json", t(1));
        g.add_output("Z", "out/z.html", t(1));
        g.mark_changed("B", t(2));

        let files = g.get_files_to_regenerate();
        let expected: BTreeSet<PathBuf> = files.iter().flat_map(|f| g.outputs_of(f)).collect();
        assert_eq!(g.get_outputs_to_regenerate(), expected);
        assert_eq!(
            g.get_outputs_to_regenerate(),
            set(&["out/a.html", "out/b.html", "out/b.json"])
        );
    }

    #[test]
    fn reset_clears_changes() {
        let mut g = graph();
        g.add_dependency("A", "B", t(1), t(1));
        g.mark_changed("B", t(2));
        assert!(!g.get_files_to_regenerate().is_empty());
        g.reset_changed_state();
        assert!(g.get_files_to_regenerate().is_empty());
        assert!(g.get_outputs_to_regenerate().is_empty());
        assert!(g.changed_files().is_empty());
    }

    #[test]
    fn remove_dependency_keeps_nodes() {
        let mut g = graph();
        g.add_dependency("a", "b", t(1), t(1));
        g.remove_dependency("a", "b");
        assert!(g.contains("a") && g.contains("b"));
        assert!(g.dependencies_of("a").is_empty());
        assert!(g.dependents_of("b").is_empty());
    }

    #[test]
    fn add_output_creates_node() {
        let mut g = graph();
        g.add_output("docs/a.md", "site/a.html", t(3));
        let node = g.node("docs/a.md").unwrap();
        assert_eq!(node.outputs, set(&["site/a.html"]));
        assert_eq!(node.last_modified, t(3));
        assert!(!node.changed);
    }

    #[test]
    fn replace_outputs_drops_stale_paths() {
        let mut g = graph();
        g.add_output("docs/a.md", "site/a.html", t(1));
        g.replace_outputs("docs/a.md", ["site/b.html"], t(2));
        g.mark_changed("docs/a.md", t(3));
        assert_eq!(g.get_outputs_to_regenerate(), set(&["site/b.html"]));

        g.replace_outputs("docs/new.md", Vec::<PathBuf>::new(), t(4));
        assert!(g.contains("docs/new.md"));
        assert!(g.outputs_of("docs/new.md").is_empty());
    }

    #[test]
    fn removing_node_drops_its_outputs_from_closure() {
        let mut g = graph();
        g.add_output("a", "out/a", t(1));
        g.mark_changed("a", t(2));
        g.remove_node("a");
        assert!(g.get_outputs_to_regenerate().is_empty());
    }
}
