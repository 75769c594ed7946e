//! Content-addressed memoization
//!
//! Lexing and parsing are pure functions of the input bytes plus a small
//! key (start position, encoding). [`ContentCache`] maps a 64-bit content
//! hash to the stored results and compares the full bytes on every hit, so
//! a hash collision can never return a result for different content.
//!
//! When the entry limit is reached the cache is flushed as a whole; the
//! workloads it serves (re-lexing the same partitions and seams) have
//! short reuse distances.

use hashbrown::HashMap;
use std::hash::{BuildHasher, Hash};

/// Fixed seeds, so hashes are stable within and across runs
const SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// Hash bytes together with a key
pub fn content_hash<K: Hash + ?Sized>(bytes: &[u8], key: &K) -> u64 {
    let state = ahash::RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3]);
    BuildHasher::hash_one(&state, (bytes, key))
}

struct Entry<K, V> {
    bytes: Box<[u8]>,
    key: K,
    value: V,
}

/// Memo table keyed by content bytes and an extra key
pub struct ContentCache<K, V> {
    buckets: HashMap<u64, Vec<Entry<K, V>>>,
    len: usize,
    max_entries: usize,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq, V: Clone> ContentCache<K, V> {
    /// Create a cache holding at most `max_entries` results
    pub fn new(max_entries: usize) -> Self {
        Self {
            buckets: HashMap::new(),
            len: 0,
            max_entries: max_entries.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up the result stored for `bytes` and `key`
    pub fn get(&mut self, bytes: &[u8], key: &K) -> Option<V> {
        let hash = content_hash(bytes, key);
        let found = self.buckets.get(&hash).and_then(|bucket| {
            bucket
                .iter()
                .find(|e| e.key == *key && *e.bytes == *bytes)
                .map(|e| e.value.clone())
        });

        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Store a result, replacing any previous one for the same content
    pub fn insert(&mut self, bytes: &[u8], key: K, value: V) {
        if self.len >= self.max_entries {
            self.clear();
        }

        let hash = content_hash(bytes, &key);
        let bucket = self.buckets.entry(hash).or_default();
        if let Some(entry) = bucket
            .iter_mut()
            .find(|e| e.key == key && *e.bytes == *bytes)
        {
            entry.value = value;
            return;
        }
        bucket.push(Entry {
            bytes: bytes.into(),
            key,
            value,
        });
        self.len += 1;
    }

    /// Return the stored result or compute and store it
    pub fn get_or_insert_with<F>(&mut self, bytes: &[u8], key: K, f: F) -> (V, bool)
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(bytes, &key) {
            return (value, true);
        }
        let value = f();
        self.insert(bytes, key, value.clone());
        (value, false)
    }

    /// Drop all entries; statistics are kept
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }

    /// Number of stored results
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// (hits, misses, hit rate)
    pub fn stats(&self) -> (u64, u64, f64) {
        let total = self.hits + self.misses;
        let rate = if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        };
        (self.hits, self.misses, rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        let mut cache: ContentCache<u32, String> = ContentCache::new(16);
        assert_eq!(cache.get(b"abc", &1), None);
        cache.insert(b"abc", 1, "first".into());
        assert_eq!(cache.get(b"abc", &1), Some("first".into()));
        assert_eq!(cache.get(b"abc", &2), None);
        assert_eq!(cache.get(b"abd", &1), None);

        let (hits, misses, rate) = cache.stats();
        assert_eq!((hits, misses), (1, 3));
        assert!((rate - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut cache: ContentCache<(), usize> = ContentCache::new(16);
        let (v, cached) = cache.get_or_insert_with(b"xyz", (), || 3);
        assert_eq!((v, cached), (3, false));
        let (v, cached) = cache.get_or_insert_with(b"xyz", (), || unreachable!());
        assert_eq!((v, cached), (3, true));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_flush_at_limit() {
        let mut cache: ContentCache<u8, u8> = ContentCache::new(2);
        cache.insert(b"a", 0, 1);
        cache.insert(b"b", 0, 2);
        assert_eq!(cache.len(), 2);
        cache.insert(b"c", 0, 3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(b"a", &0), None);
        assert_eq!(cache.get(b"c", &0), Some(3));
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(content_hash(b"hello", &7u64), content_hash(b"hello", &7u64));
        assert_ne!(content_hash(b"hello", &7u64), content_hash(b"hello", &8u64));
    }
}
