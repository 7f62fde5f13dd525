//! Time-expiring memo cache for upstream lookups.
//!
//! Keyed by the call arguments; each entry carries its own expiry. There is no
//! invalidation other than expiry, and no locking: the owner mutates it
//! through `&mut self`.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, Entry<V>>,
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Cached value for `key`, if present and not yet expired.
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert_at(&mut self, key: K, value: V, now: Instant) {
        // Opportunistic sweep keeps the map from growing with dead entries.
        self.entries.retain(|_, e| now < e.expires_at);
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_before_expiry() {
        let mut cache = TtlCache::new(Duration::from_secs(300));
        let t0 = Instant::now();
        cache.insert_at("2024-07-04", 15usize, t0);
        assert_eq!(cache.get_at(&"2024-07-04", t0 + Duration::from_secs(299)), Some(15));
        assert_eq!(cache.get_at(&"2024-07-05", t0), None);
    }

    #[test]
    fn entry_expires_after_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(300));
        let t0 = Instant::now();
        cache.insert_at("2024-07-04", 15usize, t0);
        assert_eq!(cache.get_at(&"2024-07-04", t0 + Duration::from_secs(300)), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn insert_refreshes_expiry_and_sweeps_dead_entries() {
        let mut cache = TtlCache::new(Duration::from_secs(10));
        let t0 = Instant::now();
        cache.insert_at(1, "old", t0);
        cache.insert_at(2, "other", t0);
        let t1 = t0 + Duration::from_secs(11);
        cache.insert_at(1, "new", t1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at(&1, t1 + Duration::from_secs(5)), Some("new"));
    }
}
