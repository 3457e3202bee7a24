//! Transport traits
//!
//! The byte-level protocol lives behind these traits; the client only
//! exchanges envelopes and replies with them.

use std::sync::Arc;

use crate::error::Result;
use crate::protocol::{Envelope, Reply};
use crate::registry::Endpoint;

/// A connection to one store endpoint
///
/// Implementations must report an unreachable endpoint as
/// `FlatError::Connection`. Timeouts are the implementation's concern.
pub trait Transport: Send + Sync {
    /// Execute one request. When the envelope asks to skip the reply the
    /// implementation may return `Reply::skipped()` without waiting.
    fn send(&self, envelope: &Envelope) -> Result<Reply>;
}

/// Opens transports for endpoints
pub trait TransportFactory: Send + Sync {
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Transport>>;
}

impl<F> TransportFactory for F
where
    F: Fn(&Endpoint) -> Result<Arc<dyn Transport>> + Send + Sync,
{
    fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn Transport>> {
        self(endpoint)
    }
}
