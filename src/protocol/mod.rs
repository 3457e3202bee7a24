//! Protocol Module
//!
//! Logical request/response shapes exchanged with the store's transport.
//! Byte framing belongs to the transport; this module only maps typed
//! operations onto envelope fields and decodes replies.
//!
//! ## Envelope Fields
//! - `action`: operation discriminator (`mc-set`, `mca-mget`, ...)
//! - `k`: key, or JSON array of keys for batch actions
//! - `v`: value (bytes, or integer delta for counters)
//! - `e`: expiry in relative seconds
//! - `cas`: expected CAS token
//! - `__skipsendback`: ask the transport not to wait for a reply
//!
//! ## Reply Header Fields
//! - `mc-error`: present on failure, carries the error code or text
//! - `cas`, `e`: version and expiry of the returned value
//! - `k`: echoed key (first-get)
//! - `mc-curr-val`: body holds the current value after a CAS conflict
//!
//! ## Multi-get Body
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────────────┐
//! │ cas (4)  │ exp (4)  │ len (4)  │  payload (len)   │  ... repeated per key
//! └──────────┴──────────┴──────────┴──────────────────┘
//! ```
//! All header integers are little-endian `u32`; zero cas/expiry means absent.

mod action;
mod codec;
mod envelope;
mod expiry;
mod request;
mod response;

pub use action::Action;
pub use codec::{
    decode_key_list, decode_records, encode_key_list, encode_record, Record, RECORD_HEADER_SIZE,
};
pub use envelope::{fields, Cas, Envelope, FieldValue, Header};
pub use expiry::{normalize_expiry, unix_now};
pub use request::{Counter, Insert, Request, Store};
pub use response::Reply;
