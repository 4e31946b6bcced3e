//! LSH forest over MinHash-style signatures.
//!
//! A signature of `rows_per_band * num_bands` values is cut into `num_bands`
//! contiguous bands. Each band is encoded into a fixed-width [`SegmentKey`]
//! and bucketed by exact match. Two items become candidates when any one of
//! their bands matches.
//!
//! # Lifecycle
//!
//! ```text
//! new ──► insert* ──► build_index ──► query* (any number of threads)
//!   │        │
//!   └─ dump / load (only before build_index)
//! ```
//!
//! `build_index` is one-way. Inserting, loading or dumping afterwards is an
//! [`ForestError::InvalidState`] error rather than a silent no-op.
//!
//! # Example
//!
//! ```rust
//! use lshforest::LshForest;
//!
//! let mut forest: LshForest = LshForest::new(16, 0.5)?;
//! forest.insert("a", &[1; 16])?;
//! forest.insert("b", &[1; 16])?;
//! forest.insert("c", &[2; 16])?;
//! forest.build_index()?;
//!
//! let hits = forest.query(&[1; 16])?;
//! assert!(hits.contains("a") && hits.contains("b"));
//! assert!(!hits.contains("c"));
//! # Ok::<(), lshforest::ForestError>(())
//! ```

pub mod band;
pub mod params;
pub mod query;
pub mod registry;
pub mod segment;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::error::{ForestError, Result};
use band::{BandStore, IndexedBand};
pub use params::{optimal_params, BandingParams, ForestParams};
pub use query::{DeadlineExceeded, QueryStream};
pub use registry::KeyRegistry;
pub use segment::{encode_segment, SegmentEncoder, SegmentKey};

/// LSH forest index.
///
/// `R` is the caller's record type stored in the [`KeyRegistry`]; the forest
/// never inspects it.
#[derive(Debug)]
pub struct LshForest<R = ()> {
    params: ForestParams,
    banding: BandingParams,
    encoder: SegmentEncoder,
    bands: Vec<BandStore>,
    /// Shared handles to the sorted bands, filled by `build_index`.
    indexed: Vec<Arc<IndexedBand>>,
    registry: KeyRegistry<R>,
}

/// Size summary of a forest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForestStats {
    pub num_bands: usize,
    pub rows_per_band: usize,
    pub indexed: bool,
    /// Distinct segment keys summed over bands.
    pub buckets: usize,
    /// Item keys summed over all buckets of all bands.
    pub postings: usize,
    pub registered: usize,
}

impl<R> LshForest<R> {
    /// Create a forest for signatures of `signature_length` values, tuned for
    /// Jaccard similarity `threshold`.
    pub fn new(signature_length: usize, threshold: f64) -> Result<Self> {
        Self::with_params(ForestParams::new(signature_length, threshold))
    }

    /// Create a forest with explicit parameters.
    pub fn with_params(params: ForestParams) -> Result<Self> {
        params.validate()?;
        let banding = optimal_params(params.signature_length, params.threshold)?;
        debug!(
            signature_length = params.signature_length,
            threshold = params.threshold,
            rows_per_band = banding.rows_per_band,
            num_bands = banding.num_bands,
            false_positive = banding.false_positive,
            false_negative = banding.false_negative,
            "configured lsh forest"
        );

        Ok(Self {
            encoder: SegmentEncoder::new(
                params.hash_value_size,
                banding.rows_per_band,
                banding.num_bands,
            ),
            bands: (0..banding.num_bands).map(|_| BandStore::default()).collect(),
            indexed: Vec::new(),
            registry: KeyRegistry::new(),
            params,
            banding,
        })
    }

    /// `(rows_per_band, num_bands)`.
    pub fn settings(&self) -> (usize, usize) {
        (self.banding.rows_per_band, self.banding.num_bands)
    }

    /// Banding geometry and its estimated error rates.
    pub fn banding(&self) -> &BandingParams {
        &self.banding
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Configured signature length.
    ///
    /// Signatures of this length or of exactly [`banded_len`](Self::banded_len)
    /// values are accepted; values past `banded_len` are ignored.
    pub fn signature_len(&self) -> usize {
        self.params.signature_length
    }

    /// Values covered by the bands (`rows_per_band * num_bands`).
    pub fn banded_len(&self) -> usize {
        self.banding.signature_len()
    }

    pub fn hash_value_size(&self) -> usize {
        self.encoder.width()
    }

    pub fn is_indexed(&self) -> bool {
        !self.indexed.is_empty()
    }

    pub fn registry(&self) -> &KeyRegistry<R> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut KeyRegistry<R> {
        &mut self.registry
    }

    pub fn stats(&self) -> ForestStats {
        ForestStats {
            num_bands: self.banding.num_bands,
            rows_per_band: self.banding.rows_per_band,
            indexed: self.is_indexed(),
            buckets: self.bands.iter().map(BandStore::buckets).sum(),
            postings: self.bands.iter().map(BandStore::postings).sum(),
            registered: self.registry.len(),
        }
    }

    fn check_signature(&self, signature: &[u64]) -> Result<()> {
        let expected = self.signature_len();
        if signature.len() != expected && signature.len() != self.banded_len() {
            return Err(ForestError::DimensionMismatch {
                expected,
                actual: signature.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn ensure_buildable(&self, op: &str) -> Result<()> {
        if self.is_indexed() {
            return Err(ForestError::InvalidState(format!(
                "cannot {op} after build_index"
            )));
        }
        Ok(())
    }

    pub(crate) fn bands(&self) -> &[BandStore] {
        &self.bands
    }

    pub(crate) fn bands_mut(&mut self) -> &mut [BandStore] {
        &mut self.bands
    }

    pub(crate) fn registry_merge(&mut self, records: std::collections::HashMap<String, R>) {
        self.registry.merge(records);
    }

    /// Add `item_key` under every band of `signature`.
    ///
    /// The same key may be inserted more than once; buckets keep every copy
    /// and queries deduplicate.
    pub fn insert(&mut self, item_key: impl Into<String>, signature: &[u64]) -> Result<()> {
        self.ensure_buildable("insert")?;
        self.check_signature(signature)?;

        let item_key = item_key.into();
        let keys = self.encoder.encode_bands(signature);
        for (band, key) in self.bands.iter_mut().zip(keys) {
            band.insert(key, item_key.clone());
        }
        Ok(())
    }

    /// Sort every band and make the forest queryable. One-shot.
    pub fn build_index(&mut self) -> Result<()> {
        self.ensure_buildable("build_index again")?;

        for band in &mut self.bands {
            band.index();
        }
        self.indexed = self
            .bands
            .iter()
            .filter_map(BandStore::indexed)
            .map(Arc::clone)
            .collect();

        let stats = self.stats();
        info!(
            num_bands = stats.num_bands,
            buckets = stats.buckets,
            postings = stats.postings,
            "built lsh forest index"
        );
        Ok(())
    }

    /// Start a streaming query. See [`QueryStream`].
    pub fn query_stream(&self, signature: &[u64]) -> Result<QueryStream> {
        if !self.is_indexed() {
            return Err(ForestError::InvalidState(
                "cannot query before build_index".to_string(),
            ));
        }
        self.check_signature(signature)?;

        let keys = self.encoder.encode_bands(signature);
        trace!(num_bands = keys.len(), "probing bands");
        QueryStream::spawn(&self.indexed, keys, self.params.channel_capacity)
    }

    /// Every item key sharing at least one band segment with `signature`.
    pub fn query(&self, signature: &[u64]) -> Result<HashSet<String>> {
        Ok(self.query_stream(signature)?.collect())
    }

    /// [`query`](Self::query) bounded by a deadline.
    ///
    /// If the probes have not all finished within `timeout`, they are
    /// abandoned and [`ForestError::Timeout`] is returned. The deadline holds
    /// even while results keep arriving.
    pub fn query_timeout(&self, signature: &[u64], timeout: Duration) -> Result<HashSet<String>> {
        let deadline = Instant::now() + timeout;
        let mut stream = self.query_stream(signature)?;
        let mut hits = HashSet::new();
        loop {
            match stream.next_deadline(deadline) {
                Ok(Some(key)) => {
                    hits.insert(key);
                }
                Ok(None) => return Ok(hits),
                Err(DeadlineExceeded) => {
                    warn!(?timeout, partial = hits.len(), "lsh forest query timed out");
                    stream.cancel();
                    return Err(ForestError::Timeout(timeout));
                }
            }
        }
    }
}
