//! Registry Module
//!
//! Holds the shard topology clients route against.
//!
//! ## Lifecycle
//! - Endpoints are registered per named group (default group `"*"`)
//! - Binding the first client freezes the registry
//! - Registration after the freeze is a configuration error

mod endpoint;
mod topology;

pub use endpoint::{Endpoint, EndpointId, ServerSpec, DEFAULT_GROUP};
pub use topology::{ServerGroup, ServerRegistry};
