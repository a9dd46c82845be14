//! Shared foundational types used across the Kiln incremental build engine.
//!
//! This crate provides the content hash used for cache keys and file
//! fingerprints, and the wall-clock timestamp type persisted in cache entries,
//! build state and graph snapshots.

#![warn(missing_docs)]

pub mod hash;
pub mod time;

pub use hash::{ContentHash, ParseHashError};
pub use time::Timestamp;
