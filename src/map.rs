//! Sorted-array map from [`Hash`] keys to values.
//!
//! Entries live in a single `Vec` ordered ascending by key. Lookups are a
//! lower-bound binary search; inserts and erases shift the tail.

use crate::error::{Error, Result};
use crate::fault;
use crate::hash::Hash;

/// Ordered associative container keyed by [`Hash`].
#[derive(Debug, Clone)]
pub struct OrderedMap<V> {
    entries: Vec<(Hash, V)>,
}

impl<V> OrderedMap<V> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Index of the first entry whose key is not less than `key`.
    fn lower_bound(&self, key: Hash) -> usize {
        self.entries.partition_point(|(k, _)| *k < key)
    }

    fn position(&self, key: Hash) -> Option<usize> {
        let idx = self.lower_bound(key);
        match self.entries.get(idx) {
            Some((k, _)) if *k == key => Some(idx),
            _ => None,
        }
    }

    /// Insert `value` under `key`.
    ///
    /// Fails with [`Error::DuplicateKey`] and leaves the map untouched if the
    /// key is already present.
    pub fn insert(&mut self, key: Hash, value: V) -> Result<()> {
        let idx = self.lower_bound(key);
        if matches!(self.entries.get(idx), Some((k, _)) if *k == key) {
            return Err(Error::DuplicateKey(key));
        }
        fault::check("OrderedMap::insert")?;
        self.entries.insert(idx, (key, value));
        Ok(())
    }

    /// Look up the value stored under `key`.
    pub fn find(&self, key: Hash) -> Option<&V> {
        self.position(key).map(|idx| &self.entries[idx].1)
    }

    /// Look up the value stored under `key` for mutation.
    pub fn find_mut(&mut self, key: Hash) -> Option<&mut V> {
        self.position(key).map(move |idx| &mut self.entries[idx].1)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: Hash) -> bool {
        self.position(key).is_some()
    }

    /// Remove and return the value stored under `key`.
    pub fn erase(&mut self, key: Hash) -> Option<V> {
        self.position(key).map(|idx| self.entries.remove(idx).1)
    }

    /// Remove the first entry whose value equals `value`.
    pub fn erase_value(&mut self, value: &V) -> Option<(Hash, V)>
    where
        V: PartialEq,
    {
        let idx = self.entries.iter().position(|(_, v)| v == value)?;
        Some(self.entries.remove(idx))
    }

    /// Keep only the entries for which `keep` returns true.
    ///
    /// This is the supported way to erase while walking the map.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(Hash, &mut V) -> bool,
    {
        self.entries.retain_mut(|(k, v)| keep(*k, v));
    }

    /// Remove every entry and release the backing storage.
    pub fn clear(&mut self) {
        self.entries = Vec::new();
    }

    /// Number of entries.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(key, value)` in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (Hash, &V)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// Iterate mutably over `(key, value)` in ascending key order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Hash, &mut V)> + '_ {
        self.entries.iter_mut().map(|(k, v)| (*k, v))
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = Hash> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    /// Values in key order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Mutable values in key order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.entries.iter_mut().map(|(_, v)| v)
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}
