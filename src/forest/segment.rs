//! Band segment keys.
//!
//! A band's slice of a signature is compacted into a fixed-width byte key by
//! keeping the low-order `width` bytes of each value, little-endian. Values
//! that agree in those bytes collide; that loss is what makes exact-match
//! bucketing cheap.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Per-band keys for one signature. Most forests have few bands.
pub type BandKeys = SmallVec<[SegmentKey; 16]>;

/// Fixed-width byte key for one band of a signature.
///
/// Ordering is lexicographic over bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentKey(Vec<u8>);

impl SegmentKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for SegmentKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Encode `values` into a key of `width * values.len()` bytes.
///
/// A `u64` has 8 bytes, so a `width` above 8 is treated as 8.
pub fn encode_segment(values: &[u64], width: usize) -> SegmentKey {
    let width = width.min(8);
    let mut bytes = Vec::with_capacity(width * values.len());
    for &v in values {
        bytes.extend_from_slice(&v.to_le_bytes()[..width]);
    }
    SegmentKey(bytes)
}

/// Splits signatures into bands and encodes each band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentEncoder {
    width: usize,
    rows_per_band: usize,
    num_bands: usize,
}

impl SegmentEncoder {
    pub fn new(width: usize, rows_per_band: usize, num_bands: usize) -> Self {
        Self {
            width,
            rows_per_band,
            num_bands,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Byte length of every key this encoder produces.
    pub fn key_len(&self) -> usize {
        self.width * self.rows_per_band
    }

    /// Encode one key per band. Values past the last band are ignored.
    pub fn encode_bands(&self, signature: &[u64]) -> BandKeys {
        debug_assert!(signature.len() >= self.rows_per_band * self.num_bands);
        signature
            .chunks_exact(self.rows_per_band)
            .take(self.num_bands)
            .map(|chunk| encode_segment(chunk, self.width))
            .collect()
    }
}
