//! Per-file change tracking across build runs.
//!
//! The tracker keeps a [`FileFingerprint`] (content hash, size, modification
//! time, recorded dependencies) for every source file it has seen, persisted as
//! a [`BuildState`] JSON document. Each run it walks the source tree, compares
//! what it finds against the stored fingerprints and reports new, modified and
//! deleted files.

#![warn(missing_docs)]

pub mod error;
pub mod fingerprint;
pub mod hasher;
pub mod state;
pub mod tracker;

pub use error::TrackerError;
pub use fingerprint::{FileFingerprint, RACY_WINDOW};
pub use hasher::{ChangeSet, SourceHasher};
pub use state::{BuildState, STATE_SCHEMA_VERSION};
pub use tracker::ChangeTracker;
