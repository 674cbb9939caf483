//! Unordered keyed storage with O(1) insert, lookup and removal.
//!
//! [`IndexedSlots`] keeps its entries densely packed in a `Vec` and tracks the
//! slot of every key in a side map. Removal swaps the last entry into the hole
//! and fixes up that entry's recorded slot, so iteration order is not
//! preserved across removals.

use std::collections::HashMap;
use std::hash::Hash;

/// Dense, unordered key/value storage with slot tracking.
#[derive(Debug, Clone)]
pub struct IndexedSlots<K, V> {
    entries: Vec<(K, V)>,
    slots: HashMap<K, usize>,
}

/// A set of keys built on [`IndexedSlots`].
pub type IndexedSet<K> = IndexedSlots<K, ()>;

impl<K: Copy + Eq + Hash, V> IndexedSlots<K, V> {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            slots: HashMap::new(),
        }
    }

    /// Insert or replace the value for `key`, returning the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&slot) = self.slots.get(&key) {
            return Some(std::mem::replace(&mut self.entries[slot].1, value));
        }
        self.slots.insert(key, self.entries.len());
        self.entries.push((key, value));
        None
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.slots.remove(key)?;
        let (_, value) = self.entries.swap_remove(slot);
        if let Some((moved, _)) = self.entries.get(slot) {
            self.slots.insert(*moved, slot);
        }
        Some(value)
    }

    /// Returns the value stored for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.slots.get(key).map(|&slot| &self.entries[slot].1)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all keys in storage order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    /// Iterate over all values in storage order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Remove every entry, yielding them in storage order.
    pub fn drain(&mut self) -> impl Iterator<Item = (K, V)> + '_ {
        self.slots.clear();
        self.entries.drain(..)
    }
}

impl<K: Copy + Eq + Hash> IndexedSlots<K, ()> {
    /// Add `key` to the set. Returns `true` if it was not already present.
    pub fn add(&mut self, key: K) -> bool {
        self.insert(key, ()).is_none()
    }
}

impl<K: Copy + Eq + Hash, V> Default for IndexedSlots<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
