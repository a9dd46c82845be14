//! JSON persistence for [`DependencyGraph`].
//!
//! A snapshot lists every node keyed by path with both edge directions, its
//! outputs and its modification time. The `changed` flags are runtime state and
//! are not written: a restored graph starts with nothing marked.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use kiln_common::Timestamp;
use kiln_log::{Component, LogEvent, SharedSink};

use crate::error::GraphError;
use crate::graph::DependencyGraph;

/// Current snapshot layout version.
pub const GRAPH_SCHEMA_VERSION: u32 = 1;

/// Serializable form of a whole graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Layout version, checked on load.
    pub schema_version: u32,
    /// Every node, ordered by path.
    pub nodes: BTreeMap<PathBuf, NodeRecord>,
}

/// Serializable form of one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Files this file depends on.
    #[serde(default)]
    pub dependencies: BTreeSet<PathBuf>,
    /// Files that depend on this file.
    #[serde(default)]
    pub dependents: BTreeSet<PathBuf>,
    /// Last known modification time.
    #[serde(default)]
    pub last_modified: Timestamp,
    /// Files produced by building this file.
    #[serde(default)]
    pub outputs: BTreeSet<PathBuf>,
}

/// Reads only the version so a future layout is reported as a mismatch rather
/// than a parse error.
#[derive(Deserialize)]
struct VersionProbe {
    schema_version: u32,
}

impl DependencyGraph {
    /// Captures the current graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .nodes()
            .into_iter()
            .map(|node| {
                let record = NodeRecord {
                    dependencies: node.dependencies,
                    dependents: node.dependents,
                    last_modified: node.last_modified,
                    outputs: node.outputs,
                };
                (node.path, record)
            })
            .collect();
        GraphSnapshot {
            schema_version: GRAPH_SCHEMA_VERSION,
            nodes,
        }
    }

    /// Rebuilds a graph from a snapshot.
    ///
    /// An edge listed on either side of a pair is restored on both sides, and a
    /// path that only appears inside an edge list gets a node of its own.
    pub fn from_snapshot(snapshot: GraphSnapshot, sink: SharedSink) -> Result<Self, GraphError> {
        if snapshot.schema_version != GRAPH_SCHEMA_VERSION {
            return Err(GraphError::SchemaMismatch {
                expected: GRAPH_SCHEMA_VERSION,
                actual: snapshot.schema_version,
            });
        }

        let mut graph = DependencyGraph::new(sink);
        for (path, record) in &snapshot.nodes {
            graph.add_node(path, record.last_modified);
        }
        for (path, record) in snapshot.nodes {
            for dep in &record.dependencies {
                graph.link(&path, dep);
            }
            for dependent in &record.dependents {
                graph.link(dependent, &path);
            }
            graph.set_outputs(&path, record.outputs);
        }
        Ok(graph)
    }

    /// Encodes the graph as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, GraphError> {
        serde_json::to_string_pretty(&self.snapshot()).map_err(|e| GraphError::Encode {
            reason: e.to_string(),
        })
    }

    /// Decodes a graph previously produced by [`to_json`](Self::to_json).
    pub fn from_json(json: &str, sink: SharedSink) -> Result<Self, GraphError> {
        let probe: VersionProbe = serde_json::from_str(json).map_err(|e| GraphError::Parse {
            reason: e.to_string(),
        })?;
        if probe.schema_version != GRAPH_SCHEMA_VERSION {
            return Err(GraphError::SchemaMismatch {
                expected: GRAPH_SCHEMA_VERSION,
                actual: probe.schema_version,
            });
        }
        let snapshot: GraphSnapshot = serde_json::from_str(json).map_err(|e| GraphError::Parse {
            reason: e.to_string(),
        })?;
        Self::from_snapshot(snapshot, sink)
    }

    /// Writes the snapshot to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), GraphError> {
        let json = self.to_json()?;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: io::Error| GraphError::Io { path, source }
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let tmp = path.with_extension(format!("json.{}.tmp", std::process::id()));
        std::fs::write(&tmp, json).map_err(io_err(&tmp))?;
        std::fs::rename(&tmp, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            io_err(path)(e)
        })?;

        self.sink().emit(LogEvent::debug(
            Component::Graph,
            format!("saved {} nodes to {}", self.len(), path.display()),
        ));
        Ok(())
    }

    /// Reads a snapshot file written by [`save`](Self::save).
    pub fn load(path: &Path, sink: SharedSink) -> Result<Self, GraphError> {
        let json = std::fs::read_to_string(path).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let graph = Self::from_json(&json, sink)?;
        graph.sink().emit(LogEvent::debug(
            Component::Graph,
            format!("loaded {} nodes from {}", graph.len(), path.display()),
        ));
        Ok(graph)
    }
}
