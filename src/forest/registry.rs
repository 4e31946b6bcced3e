//! Item key → external record lookup.
//!
//! The forest stores item keys as plain strings. Callers that need to get back
//! to a richer record (a graph location, a file offset, ...) register it here.
//! The forest persists this table but never reads the records.

use std::collections::hash_map::{HashMap, Iter};

/// Append-only table from item key to caller-defined record.
#[derive(Debug, Clone)]
pub struct KeyRegistry<R> {
    records: HashMap<String, R>,
}

impl<R> Default for KeyRegistry<R> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<R> KeyRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `key` with `record`, returning the record it replaced.
    pub fn register(&mut self, key: impl Into<String>, record: R) -> Option<R> {
        self.records.insert(key.into(), record)
    }

    pub fn get(&self, key: &str) -> Option<&R> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Resolve query results to records, skipping unregistered keys.
    pub fn resolve<'a, I>(&'a self, keys: I) -> impl Iterator<Item = (&'a str, &'a R)> + 'a
    where
        I: IntoIterator<Item = &'a String>,
        I::IntoIter: 'a,
    {
        keys.into_iter()
            .filter_map(move |k| self.records.get_key_value(k.as_str()))
            .map(|(k, r)| (k.as_str(), r))
    }

    pub fn iter(&self) -> Iter<'_, String, R> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn as_map(&self) -> &HashMap<String, R> {
        &self.records
    }

    pub(crate) fn merge(&mut self, other: HashMap<String, R>) {
        self.records.extend(other);
    }
}
