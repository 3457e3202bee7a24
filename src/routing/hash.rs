//! Shard hash
//!
//! CRC-32 (IEEE, the zlib checksum) so routing stays stable across processes
//! and client implementations.

/// Hash a key for shard selection
#[inline]
pub fn shard_hash(key: &[u8]) -> u32 {
    crc32fast::hash(key)
}
