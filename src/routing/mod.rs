//! Routing Module
//!
//! Deterministic weighted key-to-shard mapping.
//!
//! ## Algorithm
//! ```text
//! pos = crc32(key) mod total_weight
//!
//!  weights:   [ 2 ][   3   ][ 1 ]
//!  cumulative:  2      5      6
//!  first endpoint with cumulative > pos wins
//! ```
//! Single-endpoint groups skip hashing entirely.

mod hash;
mod router;

pub use hash::shard_hash;
pub use router::{ShardChunk, ShardRouter, WeightWalk};
