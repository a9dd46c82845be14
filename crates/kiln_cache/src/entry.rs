//! A single cached value and its validity metadata.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use kiln_common::{ContentHash, Timestamp};

/// Current on-disk entry schema. Increment on breaking changes to the record layout.
pub const ENTRY_SCHEMA_VERSION: u32 = 1;

/// A cached value together with the key it was stored under and when.
///
/// `key` is the hex [`ContentHash`] of the raw input that produced `data`, so
/// byte-identical inputs always map to the same entry regardless of where the
/// input came from or when it was cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// Entry record layout version.
    pub schema_version: u32,
    /// Content-hash key of the raw input.
    pub key: String,
    /// When the entry was written.
    pub timestamp: Timestamp,
    /// The cached value.
    pub data: T,
}

impl<T> CacheEntry<T> {
    /// Creates an entry stamped with the current time.
    pub fn new(key: String, data: T) -> Self {
        Self::with_timestamp(key, data, Timestamp::now())
    }

    /// Creates an entry with an explicit timestamp.
    pub fn with_timestamp(key: String, data: T, timestamp: Timestamp) -> Self {
        Self {
            schema_version: ENTRY_SCHEMA_VERSION,
            key,
            timestamp,
            data,
        }
    }

    /// Returns `true` if `ttl` is set and more than `ttl` has passed since the entry was written.
    ///
    /// A `None` or zero TTL never expires.
    pub fn is_expired(&self, ttl: Option<Duration>, now: Timestamp) -> bool {
        match ttl {
            Some(ttl) if !ttl.is_zero() => now.saturating_duration_since(self.timestamp) > ttl,
            _ => false,
        }
    }
}

/// Computes the cache key for a raw input.
pub fn key_for(raw: &[u8]) -> String {
    ContentHash::from_bytes(raw).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_content_addressed() {
        assert_eq!(key_for(b"# Title"), key_for(b"# Title"));
        assert_ne!(key_for(b"# Title"), key_for(b"# Other"));
        assert_eq!(key_for(b"x").len(), 32);
    }

    #[test]
    fn new_entry_carries_schema() {
        let entry = CacheEntry::new("k".to_string(), 5u32);
        assert_eq!(entry.schema_version, ENTRY_SCHEMA_VERSION);
        assert_eq!(entry.data, 5);
    }

    #[test]
    fn no_ttl_never_expires() {
        let entry = CacheEntry::with_timestamp("k".to_string(), (), Timestamp::from_millis(0));
        let far_future = Timestamp::from_millis(u64::MAX / 2);
        assert!(!entry.is_expired(None, far_future));
        assert!(!entry.is_expired(Some(Duration::ZERO), far_future));
    }

    #[test]
    fn expiry_is_strictly_after_ttl() {
        let entry = CacheEntry::with_timestamp("k".to_string(), (), Timestamp::from_millis(1_000));
        let ttl = Some(Duration::from_millis(500));
        assert!(!entry.is_expired(ttl, Timestamp::from_millis(1_500)));
        assert!(entry.is_expired(ttl, Timestamp::from_millis(1_501)));
    }

    #[test]
    fn clock_going_backwards_is_not_expiry() {
        let entry = CacheEntry::with_timestamp("k".to_string(), (), Timestamp::from_millis(5_000));
        assert!(!entry.is_expired(Some(Duration::from_millis(1)), Timestamp::from_millis(10)));
    }
}
