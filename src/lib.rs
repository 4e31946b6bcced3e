//! lshforest: LSH forest over MinHash-style signatures.
//!
//! Retrieves candidate items whose underlying sets probably exceed a Jaccard
//! similarity threshold with a query, without scanning every indexed item.
//!
//! - `forest/`: banding geometry, segment keys, band storage, concurrent query
//! - `persistence/`: dump/load of the pre-index state
//!
//! # Critical Nuances
//!
//! ## Approximate by construction
//!
//! Banding trades exactness for sublinear lookup. Pairs below the threshold
//! can collide (false positives) and pairs above it can miss every band
//! (false negatives). [`optimal_params`] picks the geometry minimizing the
//! integrated sum of both; [`LshForest::banding`] reports the estimates.
//! Candidates should be verified against the real similarity if precision
//! matters.
//!
//! ## Lossy segment keys
//!
//! Each signature value contributes only its low `hash_value_size` bytes to a
//! band key. With the default of 4 bytes, values that differ only above bit
//! 32 are indistinguishable. Raise the width for sketches with wide values.
//!
//! ## Build once
//!
//! The forest has two phases. Inserts and dump/load work on hash maps; after
//! [`LshForest::build_index`] the bands are sorted, shared and read-only, and
//! only queries are allowed. There is no way back.

pub mod error;
pub mod forest;
pub mod persistence;

// Re-exports
pub use error::{ForestError, Result};
pub use forest::{
    encode_segment, optimal_params, BandingParams, ForestParams, ForestStats, KeyRegistry,
    LshForest, QueryStream, SegmentKey,
};
pub use persistence::PersistenceError;
