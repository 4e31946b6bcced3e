//! End-to-end tests: insert, index, query.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use lshforest::{ForestError, ForestParams, LshForest};
use rand::prelude::*;

fn set(keys: &[&str]) -> HashSet<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

/// A signature sharing the first `shared_bands` bands with `base`, every other
/// value replaced by something `base` never contains.
fn perturb(base: &[u64], rows: usize, shared_bands: usize) -> Vec<u64> {
    base.iter()
        .enumerate()
        .map(|(i, &v)| if i / rows < shared_bands { v } else { v + 1_000_000 })
        .collect()
}

// =============================================================================
// Concrete scenarios
// =============================================================================

#[test]
fn identical_signatures_are_both_returned() {
    let mut forest: LshForest = LshForest::new(16, 0.5).expect("valid params");
    forest.insert("A", &[1; 16]).unwrap();
    forest.insert("B", &[1; 16]).unwrap();
    forest.build_index().unwrap();

    assert_eq!(forest.query(&[1; 16]).unwrap(), set(&["A", "B"]));
}

#[test]
fn fully_different_signatures_are_separated() {
    let mut forest: LshForest = LshForest::new(16, 0.5).unwrap();
    forest.insert("A", &[1; 16]).unwrap();
    forest.insert("B", &[2; 16]).unwrap();
    forest.build_index().unwrap();

    assert_eq!(forest.query(&[1; 16]).unwrap(), set(&["A"]));
    assert_eq!(forest.query(&[2; 16]).unwrap(), set(&["B"]));
}

#[test]
fn settings_report_optimizer_choice() {
    let forest: LshForest = LshForest::new(16, 0.5).unwrap();
    let (rows, bands) = forest.settings();
    assert!(rows * bands <= 16);
    assert_eq!(forest.banded_len(), rows * bands);
    assert_eq!(forest.signature_len(), 16);
}

// =============================================================================
// Band matching
// =============================================================================

#[test]
fn one_shared_band_is_enough() {
    let mut forest: LshForest = LshForest::new(128, 0.5).unwrap();
    let (rows, bands) = forest.settings();
    assert!(bands > 1);

    let base: Vec<u64> = (0..128).collect();
    forest.insert("base", &base).unwrap();
    forest.insert("one-band", &perturb(&base, rows, 1)).unwrap();
    forest.insert("no-band", &perturb(&base, rows, 0)).unwrap();
    forest.build_index().unwrap();

    let hits = forest.query(&base).unwrap();
    assert!(hits.contains("base"));
    assert!(hits.contains("one-band"));
    assert!(!hits.contains("no-band"));
}

#[test]
fn matches_in_many_bands_are_deduplicated() {
    let mut forest: LshForest = LshForest::new(64, 0.3).unwrap();
    let sig: Vec<u64> = (0..64).map(|i| i * 7).collect();
    for _ in 0..5 {
        forest.insert("dup", &sig).unwrap();
    }
    forest.build_index().unwrap();

    let streamed: Vec<String> = forest.query_stream(&sig).unwrap().collect();
    assert_eq!(streamed, vec!["dup".to_string()]);
}

#[test]
fn values_differing_above_encoding_width_collide() {
    let params = ForestParams::new(16, 0.5).with_hash_value_size(2);
    let mut forest: LshForest = LshForest::with_params(params).unwrap();
    forest.insert("low", &[0x0001; 16]).unwrap();
    forest.build_index().unwrap();

    // Same low two bytes.
    assert_eq!(forest.query(&[0x1_0001; 16]).unwrap(), set(&["low"]));
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn concurrent_queries_agree() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut forest: LshForest = LshForest::new(64, 0.5).unwrap();
    let sigs: Vec<Vec<u64>> = (0..200)
        .map(|_| (0..64).map(|_| rng.gen_range(0..8)).collect())
        .collect();
    for (i, sig) in sigs.iter().enumerate() {
        forest.insert(format!("item-{i}"), sig).unwrap();
    }
    forest.build_index().unwrap();

    let forest = Arc::new(forest);
    let sigs = Arc::new(sigs);
    let expected: Vec<HashSet<String>> = sigs.iter().map(|s| forest.query(s).unwrap()).collect();
    let expected = Arc::new(expected);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let forest = Arc::clone(&forest);
            let sigs = Arc::clone(&sigs);
            let expected = Arc::clone(&expected);
            thread::spawn(move || {
                for i in (t..sigs.len()).step_by(4) {
                    let hits = forest.query(&sigs[i]).unwrap();
                    assert!(hits.contains(&format!("item-{i}")));
                    assert_eq!(hits, expected[i]);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn abandoned_stream_releases_probes() {
    let params = ForestParams::new(32, 0.3).with_channel_capacity(1);
    let mut forest: LshForest = LshForest::with_params(params).unwrap();
    for i in 0..500 {
        forest.insert(format!("k{i}"), &[3; 32]).unwrap();
    }
    forest.build_index().unwrap();

    for _ in 0..10 {
        let mut stream = forest.query_stream(&[3; 32]).unwrap();
        let first = stream.next();
        assert!(first.is_some());
        // Dropping here must not deadlock on probes blocked on a full channel.
    }
    assert_eq!(forest.query(&[3; 32]).unwrap().len(), 500);
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn wrong_length_is_a_config_error() {
    let mut forest: LshForest = LshForest::new(16, 0.5).unwrap();
    let err = forest.insert("A", &[1; 8]).unwrap_err();
    assert!(err.is_config_error());

    forest.build_index().unwrap();
    assert!(matches!(
        forest.query(&[1; 32]),
        Err(ForestError::DimensionMismatch { expected: 16, actual: 32 })
    ));
}

#[test]
fn invalid_construction_is_rejected() {
    assert!(LshForest::<()>::new(0, 0.5).is_err());
    assert!(LshForest::<()>::new(16, 1.5).is_err());
    assert!(LshForest::<()>::new(16, 0.0).is_err());
}

#[test]
fn insert_after_index_is_rejected() {
    let mut forest: LshForest = LshForest::new(16, 0.5).unwrap();
    forest.build_index().unwrap();
    assert!(matches!(
        forest.insert("late", &[1; 16]),
        Err(ForestError::InvalidState(_))
    ));
    assert!(forest.query(&[1; 16]).unwrap().is_empty());
}
