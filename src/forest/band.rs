//! Per-band bucket storage.
//!
//! A band starts out [`BandStore::Buildable`]: a hash map from segment key to
//! the item keys that share it. [`BandStore::index`] drains that map into a
//! sorted, immutable [`IndexedBand`] shared behind an `Arc`, so query threads
//! can hold it without borrowing the forest.

use std::collections::HashMap;
use std::sync::Arc;

use super::segment::SegmentKey;

/// One bucket: a segment key and every item key inserted under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandEntry {
    pub key: SegmentKey,
    pub items: Vec<String>,
}

/// Sorted, read-only view of one band.
///
/// Entries are strictly ordered by key with no duplicates.
#[derive(Debug, Default)]
pub struct IndexedBand {
    entries: Vec<BandEntry>,
}

impl IndexedBand {
    fn from_map(map: HashMap<SegmentKey, Vec<String>>) -> Self {
        let mut entries: Vec<BandEntry> = map
            .into_iter()
            .map(|(key, items)| BandEntry { key, items })
            .collect();
        // Map keys are unique, so an unstable sort is fully determined.
        entries.sort_unstable_by(|a, b| a.key.cmp(&b.key));
        Self { entries }
    }

    /// Binary search for the bucket with exactly this key.
    pub fn lookup(&self, key: &SegmentKey) -> Option<&[String]> {
        let idx = self.entries.partition_point(|e| e.key < *key);
        match self.entries.get(idx) {
            Some(entry) if entry.key == *key => Some(&entry.items),
            _ => None,
        }
    }

    pub fn entries(&self) -> &[BandEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A band in one of its two phases.
#[derive(Debug)]
pub enum BandStore {
    Buildable(HashMap<SegmentKey, Vec<String>>),
    Indexed(Arc<IndexedBand>),
}

impl Default for BandStore {
    fn default() -> Self {
        BandStore::Buildable(HashMap::new())
    }
}

impl BandStore {
    pub fn is_indexed(&self) -> bool {
        matches!(self, BandStore::Indexed(_))
    }

    /// Append `item` to the bucket for `key`. Returns false once indexed.
    ///
    /// Repeated inserts of the same item accumulate.
    pub fn insert(&mut self, key: SegmentKey, item: String) -> bool {
        match self {
            BandStore::Buildable(map) => {
                map.entry(key).or_default().push(item);
                true
            }
            BandStore::Indexed(_) => false,
        }
    }

    /// Append a whole bucket, as when loading a dump.
    pub(crate) fn extend_bucket(&mut self, key: SegmentKey, items: Vec<String>) -> bool {
        match self {
            BandStore::Buildable(map) => {
                map.entry(key).or_default().extend(items);
                true
            }
            BandStore::Indexed(_) => false,
        }
    }

    /// Move the buildable map into a sorted band. No-op if already indexed.
    pub fn index(&mut self) {
        if let BandStore::Buildable(map) = self {
            let map = std::mem::take(map);
            *self = BandStore::Indexed(Arc::new(IndexedBand::from_map(map)));
        }
    }

    pub fn buildable(&self) -> Option<&HashMap<SegmentKey, Vec<String>>> {
        match self {
            BandStore::Buildable(map) => Some(map),
            BandStore::Indexed(_) => None,
        }
    }

    pub fn indexed(&self) -> Option<&Arc<IndexedBand>> {
        match self {
            BandStore::Buildable(_) => None,
            BandStore::Indexed(band) => Some(band),
        }
    }

    /// Number of distinct segment keys.
    pub fn buckets(&self) -> usize {
        match self {
            BandStore::Buildable(map) => map.len(),
            BandStore::Indexed(band) => band.len(),
        }
    }

    /// Total item keys across all buckets.
    pub fn postings(&self) -> usize {
        match self {
            BandStore::Buildable(map) => map.values().map(Vec::len).sum(),
            BandStore::Indexed(band) => band.entries.iter().map(|e| e.items.len()).sum(),
        }
    }
}
