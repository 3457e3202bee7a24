//! Request definitions
//!
//! One variant per store operation, mapped onto envelope fields in a single
//! table (`Request::to_envelope`). Expiries carried here are already
//! normalized to relative seconds.

use bytes::Bytes;

use super::codec::encode_key_list;
use super::{fields, Action, Cas, Envelope};
use crate::error::Result;

/// Payload of add / replace / set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    pub key: String,
    pub value: Bytes,
    pub expiry: i64,
}

/// Payload of increment / decrement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter {
    pub key: String,
    pub delta: i64,
    pub expiry: Option<i64>,
}

/// Payload of the conditional insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert {
    pub key: String,
    pub value: Option<Bytes>,
    /// Expected version; `None` inserts only if the key holds no versioned value
    pub cas: Option<Cas>,
    pub expiry: i64,
}

/// A typed store request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Add(Store),
    Replace(Store),
    /// `skip_reply` asks the transport not to wait for confirmation
    Set { store: Store, skip_reply: bool },
    Touch { key: String, expiry: i64 },
    Exists { key: String },
    Increment(Counter),
    Decrement(Counter),
    Delete { key: String },
    Get { key: String },
    AdvancedGet { key: String },
    FirstGet { keys: Vec<String> },
    MultiGet { keys: Vec<String> },
    Insert(Insert),
}

impl Request {
    pub fn action(&self) -> Action {
        match self {
            Request::Add(_) => Action::Add,
            Request::Replace(_) => Action::Replace,
            Request::Set { .. } => Action::Set,
            Request::Touch { .. } => Action::Touch,
            Request::Exists { .. } => Action::Exists,
            Request::Increment(_) => Action::Increment,
            Request::Decrement(_) => Action::Decrement,
            Request::Delete { .. } => Action::Delete,
            Request::Get { .. } => Action::Get,
            Request::AdvancedGet { .. } => Action::AdvancedGet,
            Request::FirstGet { .. } => Action::FirstGet,
            Request::MultiGet { .. } => Action::MultiGet,
            Request::Insert(_) => Action::Insert,
        }
    }

    /// Key used to pick the shard
    ///
    /// Batches span shards and are sent to an explicit endpoint, so they
    /// have none.
    pub fn routing_key(&self) -> Option<&str> {
        match self {
            Request::Add(s) | Request::Replace(s) | Request::Set { store: s, .. } => Some(&s.key),
            Request::Increment(c) | Request::Decrement(c) => Some(&c.key),
            Request::Insert(i) => Some(&i.key),
            Request::Touch { key, .. }
            | Request::Exists { key }
            | Request::Delete { key }
            | Request::Get { key }
            | Request::AdvancedGet { key } => Some(key),
            Request::FirstGet { .. } | Request::MultiGet { .. } => None,
        }
    }

    /// Whether the reply will not be waited for
    pub fn skips_reply(&self) -> bool {
        matches!(self, Request::Set { skip_reply: true, .. })
    }

    /// Map the request onto envelope fields
    pub fn to_envelope(&self) -> Result<Envelope> {
        let mut envelope = Envelope::new(self.action());

        match self {
            Request::Add(store) | Request::Replace(store) => put_store(&mut envelope, store),
            Request::Set { store, skip_reply } => {
                put_store(&mut envelope, store);
                if *skip_reply {
                    envelope.insert(fields::SKIP_REPLY, true);
                }
            }
            Request::Touch { key, expiry } => {
                envelope.insert(fields::KEY, key.as_str());
                envelope.insert(fields::EXPIRY, *expiry);
            }
            Request::Exists { key }
            | Request::Delete { key }
            | Request::Get { key }
            | Request::AdvancedGet { key } => {
                envelope.insert(fields::KEY, key.as_str());
            }
            Request::Increment(counter) | Request::Decrement(counter) => {
                envelope.insert(fields::KEY, counter.key.as_str());
                envelope.insert(fields::VALUE, counter.delta);
                if let Some(expiry) = counter.expiry {
                    envelope.insert(fields::EXPIRY, expiry);
                }
            }
            Request::FirstGet { keys } | Request::MultiGet { keys } => {
                envelope.insert(fields::KEY, encode_key_list(keys)?);
            }
            Request::Insert(insert) => {
                envelope.insert(fields::KEY, insert.key.as_str());
                envelope.insert(fields::EXPIRY, insert.expiry);
                if let Some(value) = &insert.value {
                    envelope.insert(fields::VALUE, value.to_vec());
                }
                if let Some(cas) = insert.cas {
                    envelope.insert(fields::CAS, cas.get());
                }
            }
        }

        Ok(envelope)
    }
}

fn put_store(envelope: &mut Envelope, store: &Store) {
    envelope.insert(fields::KEY, store.key.as_str());
    envelope.insert(fields::VALUE, store.value.to_vec());
    envelope.insert(fields::EXPIRY, store.expiry);
}
