//! Error types for FlatKV
//!
//! Provides a unified error type for all client operations.

use std::fmt;

use thiserror::Error;

use crate::protocol::Action;

/// Result type alias using FlatError
pub type Result<T> = std::result::Result<T, FlatError>;

/// Error codes reported by the store in the `mc-error` header field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreErrorCode {
    /// The supplied CAS token no longer matches the stored version
    CasMismatch,

    /// The store could not allocate room for the value
    OutOfMemory,

    /// Any other numeric code
    Code(i64),

    /// Non-numeric error indicator
    Text(String),
}

impl StoreErrorCode {
    pub const CAS_MISMATCH: i64 = 1;
    pub const OUT_OF_MEMORY: i64 = 2;

    pub fn from_code(code: i64) -> Self {
        match code {
            Self::CAS_MISMATCH => StoreErrorCode::CasMismatch,
            Self::OUT_OF_MEMORY => StoreErrorCode::OutOfMemory,
            n => StoreErrorCode::Code(n),
        }
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreErrorCode::CasMismatch => write!(f, "cas mismatch"),
            StoreErrorCode::OutOfMemory => write!(f, "out of memory"),
            StoreErrorCode::Code(n) => write!(f, "code {}", n),
            StoreErrorCode::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Unified error type for FlatKV operations
#[derive(Debug, Error)]
pub enum FlatError {
    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Connection to {endpoint} failed: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("{action} failed: {code} ({detail})")]
    Store {
        action: Action,
        code: StoreErrorCode,
        detail: String,
    },

    #[error("Key not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // Atomic Update Errors
    // -------------------------------------------------------------------------
    #[error("Atomic update of {key} gave up after {attempts} attempts")]
    RetriesExhausted { key: String, attempts: u32 },

    #[error("Atomic update of {key} passed its deadline after {attempts} attempts")]
    DeadlineExceeded { key: String, attempts: u32 },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlatError {
    /// Whether the store rejected a conditional insert because the CAS moved
    pub fn is_cas_mismatch(&self) -> bool {
        matches!(
            self,
            FlatError::Store {
                code: StoreErrorCode::CasMismatch,
                ..
            }
        )
    }

    /// Whether the error was reported by the store rather than the client or transport
    pub fn is_store_error(&self) -> bool {
        matches!(self, FlatError::Store { .. })
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, FlatError::Connection { .. })
    }

    /// Connection failure, for transport implementations
    pub fn connection(endpoint: impl fmt::Display, reason: impl fmt::Display) -> Self {
        FlatError::Connection {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }
}
