//! Concurrent handle registries (spec.md §4.3).
//!
//! Backed by [`dashmap::DashMap`] -- a sharded, lock-free-read map -- giving
//! the "lock-free reads; fine-grained per-key updates" property spec.md asks
//! for without a hand-rolled sharded-mutex scheme. Range iteration for
//! cleanup sweeps always uses the two-pass collect-then-delete pattern
//! (spec.md §4.3, §4.6, §9): entries present when the sweep starts are never
//! skipped because of concurrent mutation during the walk.

use dashmap::DashMap;
use std::hash::Hash;

/// A keyed registry of live records. `store` on an existing key overwrites;
/// `load` on a missing key returns `None`.
pub struct Registry<K, V> {
    inner: DashMap<K, V>,
}

impl<K, V> Default for Registry<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Registry {
            inner: DashMap::new(),
        }
    }
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the record for `key`.
    pub fn store(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    pub fn load(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Removes and returns the record for `key`, if present.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshots the current keys matching `predicate`. Intended to be
    /// followed by a second pass of [`Registry::remove`] calls -- the
    /// two-pass pattern spec.md §4.3/§9 requires for cleanup sweeps, since
    /// mutating a `DashMap` while iterating it is not a supported pattern.
    pub fn keys_matching(&self, mut predicate: impl FnMut(&K, &V) -> bool) -> Vec<K> {
        self.inner
            .iter()
            .filter(|entry| predicate(entry.key(), entry.value()))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Two-pass removal: collects keys matching `predicate`, then deletes
    /// each one, returning the removed values.
    pub fn remove_matching(&self, predicate: impl FnMut(&K, &V) -> bool) -> Vec<V> {
        let keys = self.keys_matching(predicate);
        keys.iter().filter_map(|k| self.remove(k)).collect()
    }
}
