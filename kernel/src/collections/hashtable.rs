//! Fixed-bucket-count chaining hash table, used for the pid/tid process tables and the
//! per-process region and memlock tables (spec §3: `PROC_TABLE_BUCKETS`,
//! `REGION_TABLE_BUCKETS`, `MEMLOCK_TABLE_BUCKETS`).
//!
//! The original kernel hashes straight into fixed-size arrays of intrusive chains
//! (`original_source/p3/kern/inc/proc.h`'s `proc_table`); this keeps the same bucket
//! count knob but chains through `alloc::vec::Vec` per bucket rather than raw linked
//! lists, since nothing here needs O(1) removal of an arbitrary mid-chain node badly
//! enough to justify intrusive links.

use alloc::vec::Vec;
use core::hash::{Hash, Hasher};

/// A tiny FNV-1a hasher — no external crate needed for a table this small, and it
/// keeps the dependency list aligned with what this kernel actually needs.
struct FnvHasher(u64);

impl Default for FnvHasher {
    fn default() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= byte as u64;
            self.0 = self.0.wrapping_mul(0x0000_0100_0000_01B3);
        }
    }
}

fn bucket_of<K: Hash>(key: &K, bucket_count: usize) -> usize {
    let mut hasher = FnvHasher::default();
    key.hash(&mut hasher);
    (hasher.finish() % bucket_count as u64) as usize
}

/// A chaining hash table over exactly `N` buckets.
pub struct HashTable<K, V, const N: usize> {
    buckets: Vec<Vec<(K, V)>>,
    len: usize,
}

impl<K: Hash + Eq, V, const N: usize> HashTable<K, V, N> {
    pub fn new() -> Self {
        let mut buckets = Vec::with_capacity(N);
        for _ in 0..N {
            buckets.push(Vec::new());
        }
        Self { buckets, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert, returning the previous value if `key` was already present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let bucket = &mut self.buckets[bucket_of(&key, N)];
        if let Some(slot) = bucket.iter_mut().find(|(k, _)| *k == key) {
            return Some(core::mem::replace(&mut slot.1, value));
        }
        bucket.push((key, value));
        self.len += 1;
        None
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.buckets[bucket_of(key, N)]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.buckets[bucket_of(key, N)]
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let bucket = &mut self.buckets[bucket_of(key, N)];
        let index = bucket.iter().position(|(k, _)| k == key)?;
        self.len -= 1;
        Some(bucket.swap_remove(index).1)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.buckets.iter().flat_map(|bucket| bucket.iter().map(|(k, v)| (k, v)))
    }
}

impl<K: Hash + Eq, V, const N: usize> Default for HashTable<K, V, N> {
    fn default() -> Self {
        Self::new()
    }
}
