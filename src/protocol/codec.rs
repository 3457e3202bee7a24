//! Batch codec
//!
//! Key-list encoding for batch requests and decoding of the concatenated
//! multi-get record body.
//!
//! ## Record Format
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────────────┐
//! │ cas (4)  │ exp (4)  │ len (4)  │  payload (len)   │
//! └──────────┴──────────┴──────────┴──────────────────┘
//! ```

use bytes::{Buf, BufMut, Bytes};

use super::Cas;
use crate::error::Result;

/// Record header: cas + expiry + payload length, little-endian u32 each
pub const RECORD_HEADER_SIZE: usize = 12;

/// One key's entry in a multi-get result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub data: Option<Bytes>,
    pub cas: Option<Cas>,
    pub expiry: Option<u32>,
}

impl Record {
    /// Placeholder for keys that were not delivered
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_absent(&self) -> bool {
        self.data.is_none()
    }
}

/// Encode the key list of a batch request
pub fn encode_key_list<S: AsRef<str>>(keys: &[S]) -> Result<String> {
    let keys: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
    Ok(serde_json::to_string(&keys)?)
}

/// Decode the key list of a batch request
pub fn decode_key_list(encoded: &str) -> Result<Vec<String>> {
    Ok(serde_json::from_str(encoded)?)
}

/// Append one record to a multi-get body
pub fn encode_record<B: BufMut>(out: &mut B, cas: u32, expiry: u32, payload: &[u8]) {
    out.put_u32_le(cas);
    out.put_u32_le(expiry);
    out.put_u32_le(payload.len() as u32);
    out.put_slice(payload);
}

/// Decode up to `expected` records from a multi-get body
///
/// Decoding stops at the first truncated record; the caller keeps the
/// remaining keys absent. Payloads share the body's buffer.
pub fn decode_records(mut body: Bytes, expected: usize) -> Vec<Record> {
    let mut records = Vec::with_capacity(expected);

    while records.len() < expected {
        if body.remaining() < RECORD_HEADER_SIZE {
            tracing::warn!(
                "Multi-get body truncated: decoded {} of {} records, {} bytes left",
                records.len(),
                expected,
                body.remaining()
            );
            break;
        }

        let cas = body.get_u32_le();
        let expiry = body.get_u32_le();
        let len = body.get_u32_le() as usize;

        if body.remaining() < len {
            tracing::warn!(
                "Multi-get record {} truncated: payload of {} bytes, {} available",
                records.len(),
                len,
                body.remaining()
            );
            break;
        }

        let payload = body.split_to(len);
        let cas = Cas::new(u64::from(cas));
        // cas 0 with no payload is how the store reports a missing key
        let data = if cas.is_none() && payload.is_empty() {
            None
        } else {
            Some(payload)
        };

        records.push(Record {
            data,
            cas,
            expiry: (expiry != 0).then_some(expiry),
        });
    }

    records
}
