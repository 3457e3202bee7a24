//! Tests for ShardRouter
//!
//! These tests verify:
//! - Deterministic selection across router instances
//! - Weighted distribution over many keys
//! - Single-endpoint and empty groups
//! - Both weight walk rules
//! - Batch partitioning

use flatkv::registry::{Endpoint, ServerGroup};
use flatkv::routing::shard_hash;
use flatkv::{FlatError, ShardRouter, WeightWalk};

// =============================================================================
// Helper Functions
// =============================================================================

fn group(weights: &[u32]) -> ServerGroup {
    let endpoints = weights
        .iter()
        .enumerate()
        .map(|(i, w)| Endpoint::new(format!("node{}", i), 11211, *w))
        .collect();
    ServerGroup::new("*", endpoints)
}

fn distribution(router: &ShardRouter, samples: usize) -> Vec<f64> {
    let mut counts = vec![0usize; router.group().len()];
    for i in 0..samples {
        counts[router.select_index(&format!("user:{}", i)).unwrap()] += 1;
    }
    counts.iter().map(|c| *c as f64 / samples as f64).collect()
}

// =============================================================================
// Selection Tests
// =============================================================================

#[test]
fn test_selection_is_deterministic() {
    let a = ShardRouter::new(group(&[1, 2, 3]));
    let b = ShardRouter::new(group(&[1, 2, 3]));

    for i in 0..500 {
        let key = format!("key-{}", i);
        assert_eq!(a.select_index(&key).unwrap(), b.select_index(&key).unwrap());
        assert_eq!(a.select_index(&key).unwrap(), a.select_index(&key).unwrap());
    }
}

#[test]
fn test_selection_matches_weighted_walk() {
    let router = ShardRouter::new(group(&[1, 2, 3]));

    for i in 0..200 {
        let key = format!("walk-{}", i);
        let pos = u64::from(shard_hash(key.as_bytes())) % 6;
        let expected = match pos {
            0 => 0,
            1 | 2 => 1,
            _ => 2,
        };
        assert_eq!(router.select_index(&key).unwrap(), expected, "key {}", key);
    }
}

#[test]
fn test_weighted_distribution() {
    let router = ShardRouter::new(group(&[1, 3]));
    let shares = distribution(&router, 20_000);

    assert!((shares[0] - 0.25).abs() < 0.04, "shares {:?}", shares);
    assert!((shares[1] - 0.75).abs() < 0.04, "shares {:?}", shares);
}

#[test]
fn test_equal_weights_spread_evenly() {
    let router = ShardRouter::new(group(&[1, 1, 1, 1]));
    for share in distribution(&router, 20_000) {
        assert!((share - 0.25).abs() < 0.04, "share {}", share);
    }
}

#[test]
fn test_single_endpoint_always_selected() {
    let router = ShardRouter::new(group(&[5]));
    for i in 0..100 {
        assert_eq!(router.select_index(&format!("k{}", i)).unwrap(), 0);
    }
    assert_eq!(router.select_endpoint("anything").unwrap().host, "node0");
}

#[test]
fn test_empty_group_fails() {
    let router = ShardRouter::new(ServerGroup::empty());
    let err = router.select_index("key").unwrap_err();
    assert!(matches!(err, FlatError::Config(_)));
}

#[test]
fn test_inclusive_walk() {
    let router = ShardRouter::with_walk(group(&[1, 1]), WeightWalk::Inclusive);

    // pos is 0 or 1 and the first cumulative weight is 1, so every key
    // lands on the first endpoint
    for i in 0..100 {
        assert_eq!(router.select_index(&format!("k{}", i)).unwrap(), 0);
    }

    let router = ShardRouter::with_walk(group(&[1, 2, 3]), WeightWalk::Inclusive);
    for i in 0..200 {
        let key = format!("walk-{}", i);
        let pos = u64::from(shard_hash(key.as_bytes())) % 6;
        let expected = match pos {
            0 | 1 => 0,
            2 | 3 => 1,
            _ => 2,
        };
        assert_eq!(router.select_index(&key).unwrap(), expected, "key {}", key);
    }
}

// =============================================================================
// Partition Tests
// =============================================================================

#[test]
fn test_partition_keeps_caller_order_within_chunks() {
    let router = ShardRouter::new(group(&[1, 1, 1]));
    let keys: Vec<String> = (0..50).map(|i| format!("k{}", i)).collect();

    let chunks = router.partition(&keys).unwrap();

    let total: usize = chunks.iter().map(|c| c.keys.len()).sum();
    assert_eq!(total, keys.len());

    for chunk in &chunks {
        let positions: Vec<usize> = chunk
            .keys
            .iter()
            .map(|k| keys.iter().position(|x| x == k).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        for key in &chunk.keys {
            assert_eq!(router.select_index(key).unwrap(), chunk.shard);
        }
    }

    // Chunks ordered by the first key that hit them
    let firsts: Vec<usize> = chunks
        .iter()
        .map(|c| keys.iter().position(|x| *x == c.keys[0]).unwrap())
        .collect();
    assert!(firsts.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_partition_empty_keys() {
    let router = ShardRouter::new(group(&[1, 1]));
    let keys: Vec<&str> = Vec::new();
    assert!(router.partition(&keys).unwrap().is_empty());
}
