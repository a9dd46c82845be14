//! File-level dependency graph for incremental regeneration.
//!
//! Nodes are source or derived file paths. An edge records that one file
//! depends on another; every node may also list the output files building it
//! produces. Once some files are marked changed, the graph answers which files
//! and outputs must be regenerated. The graph can be snapshotted to JSON and
//! restored on the next run.

#![warn(missing_docs)]

pub mod error;
pub mod graph;
pub mod snapshot;

pub use error::GraphError;
pub use graph::{DependencyGraph, GraphNode};
pub use snapshot::{GraphSnapshot, NodeRecord, GRAPH_SCHEMA_VERSION};
