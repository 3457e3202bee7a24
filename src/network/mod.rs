//! Network Module
//!
//! Transport seam and connection reuse.
//!
//! ## Architecture
//! - `Transport`: opaque request/response capability for one endpoint
//! - `TransportFactory`: opens transports on first use
//! - `ConnectionPool`: one shared transport per `(host, port)`

mod pool;
mod transport;

pub use pool::ConnectionPool;
pub use transport::{Transport, TransportFactory};
