//! Content-addressed cache for parse and generation artifacts.
//!
//! Entries are keyed by the hash of the raw input that produced them, never by
//! path, so byte-identical inputs share one entry and a file whose content
//! reverts to an earlier version hits the entry stored for that version.
//! Two interchangeable backends are provided: an in-process [`MemoryStore`] and
//! a one-file-per-entry [`FsStore`]. Reads are fail-open: a missing, unreadable,
//! corrupt or expired entry is a miss, never an error.

#![warn(missing_docs)]

pub mod cache;
pub mod entry;
pub mod error;
pub mod filesystem;
pub mod memory;

pub use cache::{CacheStats, ContentCache};
pub use entry::{key_for, CacheEntry, ENTRY_SCHEMA_VERSION};
pub use error::CacheError;
pub use filesystem::FsStore;
pub use kiln_config::{CacheBackend, CacheConfig};
pub use memory::MemoryStore;
