//! Shard router
//!
//! Weighted selection over a client's bound server group.

use std::collections::HashMap;

use super::shard_hash;
use crate::error::{FlatError, Result};
use crate::registry::{Endpoint, ServerGroup};

/// Boundary rule for the cumulative weight walk
///
/// The two rules place some keys on different endpoints. Clients sharing a
/// cluster with legacy FlatDB clients must use `Inclusive` so every client
/// agrees on key placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightWalk {
    /// First endpoint with `cumulative > pos`; each endpoint owns exactly
    /// `weight` of the `total_weight` positions. Not placement-compatible
    /// with legacy FlatDB clients.
    #[default]
    Proportional,

    /// First endpoint with `cumulative >= pos`, as the legacy FlatDB client
    /// routes. The first endpoint owns one extra position and the last one
    /// fewer, so two unit-weight endpoints send every key to the first.
    Inclusive,
}

/// Keys routed to the same shard, in caller order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardChunk {
    /// Index of the endpoint within the bound group
    pub shard: usize,
    pub keys: Vec<String>,
}

/// Maps keys onto the endpoints of one server group
#[derive(Debug, Clone)]
pub struct ShardRouter {
    group: ServerGroup,
    walk: WeightWalk,
}

impl ShardRouter {
    pub fn new(group: ServerGroup) -> Self {
        Self::with_walk(group, WeightWalk::default())
    }

    pub fn with_walk(group: ServerGroup, walk: WeightWalk) -> Self {
        Self { group, walk }
    }

    pub fn group(&self) -> &ServerGroup {
        &self.group
    }

    /// Index of the endpoint responsible for `key`
    pub fn select_index(&self, key: &str) -> Result<usize> {
        let endpoints = self.group.endpoints();
        match endpoints.len() {
            0 => Err(FlatError::Config(
                "no servers configured for this client".to_string(),
            )),
            1 => Ok(0),
            n => {
                let pos = u64::from(shard_hash(key.as_bytes())) % self.group.total_weight();
                let mut cumulative = 0u64;
                for (index, endpoint) in endpoints.iter().enumerate() {
                    cumulative += u64::from(endpoint.weight);
                    let owns = match self.walk {
                        WeightWalk::Proportional => cumulative > pos,
                        WeightWalk::Inclusive => cumulative >= pos,
                    };
                    if owns {
                        return Ok(index);
                    }
                }
                // pos < total_weight, so the walk always stops above
                Ok(n - 1)
            }
        }
    }

    /// Endpoint responsible for `key`
    pub fn select_endpoint(&self, key: &str) -> Result<&Endpoint> {
        let index = self.select_index(key)?;
        let endpoint = &self.group.endpoints()[index];
        tracing::trace!("Routed {:?} to shard {} ({})", key, index, endpoint);
        Ok(endpoint)
    }

    pub fn endpoint(&self, shard: usize) -> Option<&Endpoint> {
        self.group.endpoints().get(shard)
    }

    /// Group keys by shard, ordering chunks by first appearance
    pub fn partition<S: AsRef<str>>(&self, keys: &[S]) -> Result<Vec<ShardChunk>> {
        let mut chunks: Vec<ShardChunk> = Vec::new();
        let mut slot_of: HashMap<usize, usize> = HashMap::new();

        for key in keys {
            let key = key.as_ref();
            let shard = self.select_index(key)?;
            let slot = *slot_of.entry(shard).or_insert_with(|| {
                chunks.push(ShardChunk {
                    shard,
                    keys: Vec::new(),
                });
                chunks.len() - 1
            });
            chunks[slot].keys.push(key.to_string());
        }

        Ok(chunks)
    }
}
