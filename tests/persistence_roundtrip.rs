//! Dump/load through the filesystem.

#![cfg(feature = "persistence")]

use std::collections::HashSet;
use std::fs;

use lshforest::{ForestError, LshForest, PersistenceError};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GraphLocation {
    graph: u32,
    node: u64,
    offset: u32,
}

fn random_signatures(n: usize, len: usize, seed: u64) -> Vec<Vec<u64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..len).map(|_| rng.gen_range(0..16)).collect())
        .collect()
}

fn populated(sigs: &[Vec<u64>]) -> LshForest<GraphLocation> {
    let mut forest = LshForest::new(42, 0.6).unwrap();
    for (i, sig) in sigs.iter().enumerate() {
        let key = format!("g{}/n{}", i % 3, i);
        forest.insert(key.clone(), sig).unwrap();
        forest.registry_mut().register(
            key,
            GraphLocation {
                graph: (i % 3) as u32,
                node: i as u64,
                offset: 0,
            },
        );
    }
    forest
}

#[test]
fn loaded_forest_answers_like_the_original() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forest.lshf");
    let sigs = random_signatures(150, 42, 11);

    let mut original = populated(&sigs);
    original.dump(&path).unwrap();

    let mut restored: LshForest<GraphLocation> = LshForest::new(42, 0.6).unwrap();
    restored.load(&path).unwrap();
    assert_eq!(restored.stats(), original.stats());
    assert_eq!(restored.registry().len(), 150);
    assert_eq!(
        restored.registry().get("g2/n5"),
        Some(&GraphLocation {
            graph: 2,
            node: 5,
            offset: 0
        })
    );

    original.build_index().unwrap();
    restored.build_index().unwrap();

    let probes = random_signatures(50, 42, 99);
    for sig in sigs.iter().chain(probes.iter()) {
        let a: HashSet<String> = original.query(sig).unwrap();
        let b: HashSet<String> = restored.query(sig).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn resolved_hits_point_back_to_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forest.lshf");
    let sigs = random_signatures(10, 42, 3);
    populated(&sigs).dump(&path).unwrap();

    let mut restored: LshForest<GraphLocation> = LshForest::new(42, 0.6).unwrap();
    restored.load(&path).unwrap();
    restored.build_index().unwrap();

    let hits = restored.query(&sigs[4]).unwrap();
    let nodes: Vec<u64> = restored
        .registry()
        .resolve(&hits)
        .map(|(_, loc)| loc.node)
        .collect();
    assert!(nodes.contains(&4));
    assert_eq!(nodes.len(), hits.len());
}

#[test]
fn dump_after_index_leaves_destination_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forest.lshf");
    let sigs = random_signatures(5, 42, 1);

    let mut forest = populated(&sigs);
    forest.dump(&path).unwrap();
    let before = fs::read(&path).unwrap();

    forest.build_index().unwrap();
    let err = forest.dump(&path).unwrap_err();
    assert!(matches!(err, ForestError::InvalidState(_)));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn load_after_index_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forest.lshf");
    populated(&random_signatures(3, 42, 5)).dump(&path).unwrap();

    let mut forest: LshForest<GraphLocation> = LshForest::new(42, 0.6).unwrap();
    forest.build_index().unwrap();
    assert!(matches!(
        forest.load(&path),
        Err(ForestError::InvalidState(_))
    ));
}

#[test]
fn truncated_dump_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forest.lshf");
    populated(&random_signatures(20, 42, 8)).dump(&path).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let mut forest: LshForest<GraphLocation> = LshForest::new(42, 0.6).unwrap();
    let err = forest.load(&path).unwrap_err();
    assert!(matches!(
        err,
        ForestError::Persistence(PersistenceError::Format(_))
            | ForestError::Persistence(PersistenceError::Deserialization(_))
    ));
}

#[test]
fn mismatched_configuration_fails_before_bands() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forest.lshf");
    populated(&random_signatures(20, 42, 8)).dump(&path).unwrap();

    let mut other: LshForest<GraphLocation> = LshForest::new(42, 0.9).unwrap();
    assert_ne!(other.settings(), LshForest::<()>::new(42, 0.6).unwrap().settings());
    let err = other.load(&path).unwrap_err();
    assert!(matches!(
        err,
        ForestError::Persistence(PersistenceError::ConfigMismatch { .. })
    ));
    assert_eq!(other.stats().postings, 0);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut forest: LshForest<GraphLocation> = LshForest::new(42, 0.6).unwrap();
    let err = forest.load(dir.path().join("nope.lshf")).unwrap_err();
    assert!(matches!(
        err,
        ForestError::Persistence(PersistenceError::Io(_))
    ));
}
