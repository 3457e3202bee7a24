//! Client Module
//!
//! Logical operations over a sharded store.
//!
//! ## Request Path
//! ```text
//! caller ─► ShardRouter ─► ConnectionPool ─► Request::to_envelope
//!                                                  │
//!        typed result ◄─ Reply::check ◄─ Transport::send
//! ```
//!
//! ## Operations
//! - single key: add, replace, set, touch, exists, increment, decrement,
//!   delete, get, get_advanced
//! - batch: get_multi, get_first
//! - atomic: atomic_advanced_insert, atomic_set

mod atomic;
mod batch;
mod single;

pub use atomic::{AtomicUpdate, InsertOutcome};
pub use batch::{FirstHit, MultiGet};
pub use single::{Client, Presence, Versioned};
