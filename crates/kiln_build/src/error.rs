//! Error type for the build orchestrator.

use std::path::PathBuf;

use kiln_config::ConfigError;
use kiln_graph::GraphError;
use kiln_tracker::TrackerError;

/// Errors that abort a build run.
///
/// Cache problems never appear here: the cache absorbs its own failures.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The project configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Walking the source tree or saving the build state failed.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Saving the dependency graph failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A filesystem operation performed by the orchestrator itself failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
