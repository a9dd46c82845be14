//! Incremental build orchestration.
//!
//! Ties the change tracker, dependency graph and content-addressed cache
//! together into the per-run workflow a generation pipeline follows:
//!
//! 1. [`IncrementalBuild::open`] loads the persisted tracker state and graph.
//! 2. [`IncrementalBuild::plan`] walks the source tree, marks changed files in
//!    the graph and returns the [`BuildPlan`] of files and outputs to rebuild.
//! 3. While rebuilding, the pipeline reports what it learned through
//!    [`record_dependencies`](IncrementalBuild::record_dependencies) and
//!    [`record_outputs`](IncrementalBuild::record_outputs), and wraps each
//!    expensive step in a [`ContentCache`](kiln_cache::ContentCache) from
//!    [`IncrementalBuild::cache`].
//! 4. [`IncrementalBuild::commit`] persists everything once the run succeeded.

#![warn(missing_docs)]

pub mod build;
pub mod clean;
pub mod error;
pub mod plan;

pub use build::{resolve_config, IncrementalBuild};
pub use clean::clean;
pub use error::BuildError;
pub use plan::BuildPlan;
