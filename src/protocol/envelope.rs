//! Envelope and header field maps
//!
//! The transport exchanges plain field maps; everything above this module
//! works with typed requests and accessors.

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

use super::Action;

/// Field names shared with the store
pub mod fields {
    pub const ACTION: &str = "action";
    pub const KEY: &str = "k";
    pub const VALUE: &str = "v";
    pub const EXPIRY: &str = "e";
    pub const CAS: &str = "cas";
    pub const SKIP_REPLY: &str = "__skipsendback";

    pub const ERROR: &str = "mc-error";
    pub const CURRENT_VALUE: &str = "mc-curr-val";
}

/// Store-assigned version of a value; zero is never a valid token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cas(NonZeroU64);

impl Cas {
    /// `None` for the zero "not versioned" sentinel
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Cas)
    }

    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Int(i64),
    /// Unsigned values above `i64::MAX`, such as large CAS tokens
    UInt(u64),
    Text(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Integer view; numeric text is accepted
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            FieldValue::UInt(n) => i64::try_from(*n).ok(),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Unsigned view; negative integers are rejected
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Int(n) => u64::try_from(*n).ok(),
            FieldValue::UInt(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            FieldValue::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            FieldValue::Int(n) => Some(*n != 0),
            FieldValue::UInt(n) => Some(*n != 0),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(b) => write!(f, "{}", b),
            FieldValue::Int(n) => write!(f, "{}", n),
            FieldValue::UInt(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Flag(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::UInt(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Bytes(v)
    }
}

/// Outgoing request fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Envelope {
    fields: BTreeMap<&'static str, FieldValue>,
}

impl Envelope {
    pub fn new(action: Action) -> Self {
        let mut envelope = Self::default();
        envelope.insert(fields::ACTION, action.as_str());
        envelope
    }

    pub fn insert(&mut self, name: &'static str, value: impl Into<FieldValue>) {
        self.fields.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn action(&self) -> Option<Action> {
        self.get(fields::ACTION)?.as_str()?.parse().ok()
    }

    pub fn key(&self) -> Option<&str> {
        self.get(fields::KEY)?.as_str()
    }

    /// Whether the transport may skip waiting for a reply
    pub fn skip_reply(&self) -> bool {
        self.get(fields::SKIP_REPLY)
            .and_then(FieldValue::as_flag)
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }
}

/// Incoming reply metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    fields: BTreeMap<String, FieldValue>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Error indicator; its presence is the only failure signal
    pub fn error(&self) -> Option<&FieldValue> {
        self.get(fields::ERROR)
    }

    /// CAS token, `None` when missing or zero
    pub fn cas(&self) -> Option<Cas> {
        Cas::new(self.get(fields::CAS)?.as_u64()?)
    }

    pub fn expiry(&self) -> Option<i64> {
        self.get(fields::EXPIRY)?.as_int()
    }

    /// Echoed key of a first-get reply
    pub fn key(&self) -> Option<&str> {
        self.get(fields::KEY)?.as_str()
    }
}
