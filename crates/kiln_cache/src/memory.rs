//! In-process cache backend with insertion-order eviction.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use kiln_common::Timestamp;

use crate::entry::CacheEntry;

/// Position of an entry in eviction order: insertion time, then a sequence
/// number so entries written within the same millisecond keep their order.
type EvictionRank = (Timestamp, u64);

struct Slot<T> {
    entry: CacheEntry<T>,
    rank: EvictionRank,
}

/// A bounded in-memory table of cache entries.
///
/// When `max_entries` is set, inserting past the bound evicts the entries with
/// the oldest insertion timestamp until the table fits again. This is
/// insertion-order eviction: reading an entry does not protect it, while
/// re-inserting a key moves it to the newest position.
pub struct MemoryStore<T> {
    entries: HashMap<String, Slot<T>>,
    order: BTreeMap<EvictionRank, String>,
    next_seq: u64,
    max_entries: Option<usize>,
}

impl<T> MemoryStore<T> {
    /// Creates an empty store with an optional size bound.
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            max_entries,
        }
    }

    /// Inserts or replaces an entry, then evicts down to the bound.
    ///
    /// Returns the number of entries evicted.
    pub fn insert(&mut self, entry: CacheEntry<T>) -> usize {
        let rank = (entry.timestamp, self.next_seq);
        self.next_seq += 1;

        let key = entry.key.clone();
        if let Some(old) = self.entries.insert(key.clone(), Slot { entry, rank }) {
            self.order.remove(&old.rank);
        }
        self.order.insert(rank, key);

        self.evict_to_bound()
    }

    fn evict_to_bound(&mut self) -> usize {
        let Some(max) = self.max_entries else {
            return 0;
        };
        let mut evicted = 0;
        while self.entries.len() > max {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&key);
            evicted += 1;
        }
        evicted
    }

    /// Returns the entry for `key`, whether or not it has expired.
    pub fn get(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(key).map(|slot| &slot.entry)
    }

    /// Returns the entry for `key` if it is present and unexpired.
    ///
    /// An expired entry is removed as a side effect.
    pub fn get_live(
        &mut self,
        key: &str,
        ttl: Option<Duration>,
        now: Timestamp,
    ) -> Option<&CacheEntry<T>> {
        let expired = self.entries.get(key)?.entry.is_expired(ttl, now);
        if expired {
            self.remove(key);
            return None;
        }
        self.get(key)
    }

    /// Removes an entry. Returns `true` if it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(slot) => {
                self.order.remove(&slot.rank);
                true
            }
            None => false,
        }
    }

    /// Removes every expired entry. Returns how many were removed.
    pub fn remove_expired(&mut self, ttl: Option<Duration>, now: Timestamp) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired(ttl, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The configured size bound.
    pub fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }
}
