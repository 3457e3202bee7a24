//! Reply definitions
//!
//! What the transport hands back for one envelope, plus the decoding rules
//! shared by every operation.

use bytes::Bytes;

use super::{fields, Action, Header};
use crate::error::{FlatError, Result, StoreErrorCode};

/// Header and body returned by the transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub header: Header,

    /// Returned value bytes; `None` when the store sent no body
    pub body: Option<Bytes>,
}

impl Reply {
    /// Successful reply with an optional body
    pub fn ok(body: Option<Bytes>) -> Self {
        Self {
            header: Header::new(),
            body,
        }
    }

    /// Failed reply carrying an error code and a detail body
    pub fn error(code: i64, detail: impl Into<Bytes>) -> Self {
        Self {
            header: Header::new().with(fields::ERROR, code),
            body: Some(detail.into()),
        }
    }

    /// Reply the transport produces when it did not wait for the store
    pub fn skipped() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<super::FieldValue>) -> Self {
        self.header.insert(name, value);
        self
    }

    /// Turn an error indicator into `FlatError::Store`
    pub fn check(&self, action: Action) -> Result<()> {
        match self.header.error() {
            None => Ok(()),
            Some(indicator) => {
                let code = match indicator.as_int() {
                    Some(n) => StoreErrorCode::from_code(n),
                    None => StoreErrorCode::Text(indicator.to_string()),
                };
                let detail = match &self.body {
                    Some(body) if !body.is_empty() => String::from_utf8_lossy(body).into_owned(),
                    _ => indicator.to_string(),
                };
                Err(FlatError::Store {
                    action,
                    code,
                    detail,
                })
            }
        }
    }

    /// Body parsed as a decimal integer (counters, TTLs)
    pub fn body_i64(&self, action: Action) -> Result<i64> {
        let body = self
            .body
            .as_ref()
            .ok_or_else(|| FlatError::Protocol(format!("{} reply has no body", action)))?;
        let text = std::str::from_utf8(body)
            .map_err(|e| FlatError::Protocol(format!("{} reply is not text: {}", action, e)))?;
        text.trim()
            .parse()
            .map_err(|e| FlatError::Protocol(format!("{} reply {:?} is not an integer: {}", action, text, e)))
    }
}
