//! # FlatKV
//!
//! Client-side routing and consistency layer for FlatDB-style key-value
//! stores:
//! - Deterministic weighted shard selection (CRC32)
//! - Shared connection reuse across clients
//! - Typed request/response translation for every store action
//! - Batch fetches across shards (multi-get, first-get)
//! - Compare-and-swap atomic updates with bounded retries
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Client                              │
//! │     single-key ops  │  get_multi / get_first  │  atomic_set  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────┐
//!   │ ShardRouter │          │   Protocol   │
//!   │  (weights)  │          │ (envelopes)  │
//!   └──────┬──────┘          └──────┬───────┘
//!          ▼                        │
//!   ┌──────────────┐                │
//!   │ConnectionPool│◄───────────────┘
//!   └──────┬───────┘
//!          ▼
//!   ┌─────────────┐
//!   │  Transport  │  (provided by the application)
//!   └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use flatkv::{Client, Config, ConnectionPool, ServerRegistry};
//! use flatkv::network::Transport;
//! use flatkv::registry::Endpoint;
//!
//! fn connect(endpoint: &Endpoint) -> flatkv::Result<Arc<dyn Transport>> {
//!     unimplemented!("open a transport to {}", endpoint)
//! }
//!
//! let registry = ServerRegistry::new();
//! registry.add_server("10.0.0.1", 11211, 2, None)?;
//! registry.add_server("10.0.0.2", 11211, 1, None)?;
//!
//! let pool = Arc::new(ConnectionPool::new(connect));
//! let client = Client::new(&registry, pool, Config::default(), None);
//! client.set("greeting", "hello", None)?;
//! # Ok::<(), flatkv::FlatError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod registry;
pub mod routing;
pub mod network;
pub mod protocol;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FlatError, Result, StoreErrorCode};
pub use config::{Config, FanOut, RetryPolicy, WriteMode};
pub use client::{AtomicUpdate, Client, FirstHit, InsertOutcome, MultiGet, Presence, Versioned};
pub use network::{ConnectionPool, Transport, TransportFactory};
pub use registry::{Endpoint, ServerRegistry};
pub use routing::{ShardRouter, WeightWalk};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of FlatKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
