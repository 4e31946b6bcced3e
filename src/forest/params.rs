//! Banding geometry selection.
//!
//! For `b` bands of `r` rows, two items with Jaccard similarity `j` collide in
//! at least one band with probability `1 - (1 - j^r)^b`. Given a threshold `t`,
//! the area under that S-curve left of `t` is the false-positive mass and the
//! area above it right of `t` is the false-negative mass. [`optimal_params`]
//! picks the `(b, r)` with `b * r <= L` minimizing their sum.
//!
//! # References
//!
//! - Leskovec, Rajaraman & Ullman, "Mining of Massive Datasets", ch. 3.4
//! - Bawa, Condie & Ganesan (2005): "LSH Forest: self-tuning indexes for
//!   similarity search"

use crate::error::{ForestError, Result};

/// Integration step for the false-positive/false-negative integrals.
pub const INTEGRATION_STEP: f64 = 0.01;

/// Construction parameters for an [`LshForest`](crate::LshForest).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    /// Length of every signature inserted into or queried against the forest.
    pub signature_length: usize,
    /// Target Jaccard similarity, in (0, 1).
    pub threshold: f64,
    /// Bytes kept from each signature value when building segment keys (1..=8).
    pub hash_value_size: usize,
    /// Capacity of the bounded channel between band probes and the query consumer.
    pub channel_capacity: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            signature_length: 128,
            threshold: 0.5,
            hash_value_size: 4,
            channel_capacity: 64,
        }
    }
}

impl ForestParams {
    /// Parameters for a signature length and threshold, defaults elsewhere.
    pub fn new(signature_length: usize, threshold: f64) -> Self {
        Self {
            signature_length,
            threshold,
            ..Self::default()
        }
    }

    /// Set the per-value encoding width in bytes.
    pub fn with_hash_value_size(mut self, hash_value_size: usize) -> Self {
        self.hash_value_size = hash_value_size;
        self
    }

    /// Set the query channel capacity.
    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    /// Check every field, returning the first violation.
    pub fn validate(&self) -> Result<()> {
        validate_inputs(self.signature_length, self.threshold)?;
        if !(1..=8).contains(&self.hash_value_size) {
            return Err(ForestError::InvalidParameter(format!(
                "hash_value_size must be in 1..=8, got {}",
                self.hash_value_size
            )));
        }
        if self.channel_capacity == 0 {
            return Err(ForestError::InvalidParameter(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Banding geometry chosen by [`optimal_params`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandingParams {
    /// Rows (signature values) per band.
    pub rows_per_band: usize,
    /// Number of bands.
    pub num_bands: usize,
    /// Estimated false-positive probability mass.
    pub false_positive: f64,
    /// Estimated false-negative probability mass.
    pub false_negative: f64,
}

impl BandingParams {
    /// Signature values actually consumed by the bands (`rows * bands`).
    pub fn signature_len(&self) -> usize {
        self.rows_per_band * self.num_bands
    }

    /// Combined error estimate.
    pub fn error(&self) -> f64 {
        self.false_positive + self.false_negative
    }
}

fn validate_inputs(signature_length: usize, threshold: f64) -> Result<()> {
    if signature_length < 1 {
        return Err(ForestError::InvalidParameter(
            "signature_length must be at least 1".to_string(),
        ));
    }
    // Written so that NaN fails too.
    if !(threshold > 0.0 && threshold < 1.0) {
        return Err(ForestError::InvalidParameter(format!(
            "threshold must be in (0, 1), got {threshold}"
        )));
    }
    Ok(())
}

/// Find the banding geometry minimizing false-positive + false-negative mass.
///
/// Scans bands ascending, then rows ascending, and only replaces the current
/// best on a strictly smaller error, so ties resolve to fewer bands and then
/// fewer rows. The result always satisfies `rows_per_band * num_bands <= signature_length`.
pub fn optimal_params(signature_length: usize, threshold: f64) -> Result<BandingParams> {
    validate_inputs(signature_length, threshold)?;

    let mut best = BandingParams {
        rows_per_band: 0,
        num_bands: 0,
        false_positive: 0.0,
        false_negative: 0.0,
    };
    let mut min_error = f64::MAX;

    for bands in 1..=signature_length {
        for rows in 1..=signature_length {
            if bands * rows > signature_length {
                break;
            }
            let fp = false_positive_probability(bands, rows, threshold, INTEGRATION_STEP);
            let fnr = false_negative_probability(bands, rows, threshold, INTEGRATION_STEP);
            let err = fp + fnr;
            if err < min_error {
                min_error = err;
                best = BandingParams {
                    rows_per_band: rows,
                    num_bands: bands,
                    false_positive: fp,
                    false_negative: fnr,
                };
            }
        }
    }

    Ok(best)
}

/// Probability that a pair with similarity `j` shares at least one band.
fn collision_probability(bands: usize, rows: usize, j: f64) -> f64 {
    1.0 - (1.0 - j.powf(rows as f64)).powf(bands as f64)
}

/// Midpoint rule over `[lower, upper)` with a fixed step.
fn integrate(f: impl Fn(f64) -> f64, lower: f64, upper: f64, step: f64) -> f64 {
    let mut area = 0.0;
    let mut x = lower;
    while x < upper {
        area += f(x + 0.5 * step) * step;
        x += step;
    }
    area
}

/// Cumulative false-positive mass below `threshold`.
pub fn false_positive_probability(bands: usize, rows: usize, threshold: f64, step: f64) -> f64 {
    integrate(|j| collision_probability(bands, rows, j), 0.0, threshold, step)
}

/// Cumulative false-negative mass above `threshold`.
pub fn false_negative_probability(bands: usize, rows: usize, threshold: f64, step: f64) -> f64 {
    integrate(
        |j| 1.0 - collision_probability(bands, rows, j),
        threshold,
        1.0,
        step,
    )
}
