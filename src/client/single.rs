//! Client and single-key operations
//!
//! Every operation returns a `Result`; the client also keeps the last
//! failure for callers that inspect it after the fact.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::{Config, WriteMode};
use crate::error::{FlatError, Result};
use crate::network::ConnectionPool;
use crate::protocol::{normalize_expiry, unix_now, Action, Cas, Counter, Reply, Request, Store};
use crate::registry::{Endpoint, ServerGroup, ServerRegistry};
use crate::routing::ShardRouter;

/// A value together with its version and remaining lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Bytes,
    /// Present only when the store reported both cas and expiry
    pub cas: Option<Cas>,
    pub expiry: Option<i64>,
}

/// A key reported present by `exists`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presence {
    /// Remaining lifetime in seconds, when the store sent one
    pub ttl: Option<i64>,
}

/// Client bound to one server group
pub struct Client {
    /// Client configuration
    pub(super) config: Config,

    /// Weighted router over the bound group (fixed for the client's lifetime)
    pub(super) router: ShardRouter,

    /// Shared transports
    pub(super) pool: Arc<ConnectionPool>,

    /// Description of the most recent failure, cleared on success
    last_error: Mutex<Option<String>>,
}

impl Client {
    /// Bind a client to `group` (or the default group) and freeze the registry
    pub fn new(
        registry: &ServerRegistry,
        pool: Arc<ConnectionPool>,
        config: Config,
        group: Option<&str>,
    ) -> Self {
        let group = registry.bind(group);
        tracing::debug!(
            "Client bound to group {:?} with {} endpoints (total weight {})",
            group.name(),
            group.len(),
            group.total_weight()
        );
        Self {
            router: ShardRouter::with_walk(group, config.weight_walk),
            config,
            pool,
            last_error: Mutex::new(None),
        }
    }

    pub fn group(&self) -> &ServerGroup {
        self.router.group()
    }

    pub fn router(&self) -> &ShardRouter {
        &self.router
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Description of the last failed operation, if the last one failed
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    pub(super) fn note_error(&self, err: &FlatError) {
        *self.last_error.lock() = Some(err.to_string());
    }

    pub(super) fn clear_error(&self) {
        *self.last_error.lock() = None;
    }

    /// Record the outcome of a public operation
    pub(super) fn finish<T>(&self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.clear_error(),
            Err(e) => self.note_error(e),
        }
        result
    }

    pub(super) fn expiry(&self, expiry: Option<u64>) -> i64 {
        let expiry = expiry.unwrap_or(self.config.default_expiry);
        normalize_expiry(expiry, self.config.absolute_expiry_threshold, unix_now())
    }

    /// Route `request` by its key and send it
    pub(super) fn execute(&self, request: &Request) -> Result<Reply> {
        let key = request.routing_key().ok_or_else(|| {
            FlatError::Protocol(format!("{} has no single routing key", request.action()))
        })?;
        let endpoint = self.router.select_endpoint(key)?;
        self.execute_on(endpoint, request)
    }

    /// Send `request` to a specific endpoint
    pub(super) fn execute_on(&self, endpoint: &Endpoint, request: &Request) -> Result<Reply> {
        let envelope = request.to_envelope()?;
        let transport = self.pool.get(endpoint)?;

        tracing::trace!("Sending {} to {}", request.action(), endpoint);
        match transport.send(&envelope) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                if e.is_connection_error() {
                    tracing::warn!("{} to {} failed, dropping transport: {}", request.action(), endpoint, e);
                    self.pool.remove(endpoint);
                }
                Err(e)
            }
        }
    }

    /// Send and require a reply without an error indicator
    fn execute_checked(&self, request: &Request) -> Result<Reply> {
        let reply = self.execute(request)?;
        reply.check(request.action())?;
        Ok(reply)
    }

    fn store(&self, key: &str, value: Bytes, expiry: Option<u64>) -> Store {
        Store {
            key: key.to_string(),
            value,
            expiry: self.expiry(expiry),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store `value` only if `key` does not exist
    pub fn add(&self, key: &str, value: impl Into<Bytes>, expiry: Option<u64>) -> Result<()> {
        let request = Request::Add(self.store(key, value.into(), expiry));
        self.finish(self.execute_checked(&request).map(|_| ()))
    }

    /// Store `value` only if `key` already exists
    pub fn replace(&self, key: &str, value: impl Into<Bytes>, expiry: Option<u64>) -> Result<()> {
        let request = Request::Replace(self.store(key, value.into(), expiry));
        self.finish(self.execute_checked(&request).map(|_| ()))
    }

    /// Store `value` using the configured write mode
    pub fn set(&self, key: &str, value: impl Into<Bytes>, expiry: Option<u64>) -> Result<()> {
        self.set_with_mode(key, value, expiry, self.config.write_mode)
    }

    /// Store `value`
    ///
    /// In `FireAndForget` mode the reply is not inspected and the write is
    /// assumed to have succeeded; only transport failures are reported.
    pub fn set_with_mode(
        &self,
        key: &str,
        value: impl Into<Bytes>,
        expiry: Option<u64>,
        mode: WriteMode,
    ) -> Result<()> {
        let request = Request::Set {
            store: self.store(key, value.into(), expiry),
            skip_reply: mode == WriteMode::FireAndForget,
        };
        let result = if request.skips_reply() {
            self.execute(&request).map(|_| ())
        } else {
            self.execute_checked(&request).map(|_| ())
        };
        self.finish(result)
    }

    /// Reset the expiry of `key`
    pub fn touch(&self, key: &str, expiry: Option<u64>) -> Result<()> {
        let request = Request::Touch {
            key: key.to_string(),
            expiry: self.expiry(expiry),
        };
        self.finish(self.execute_checked(&request).map(|_| ()))
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let request = Request::Delete {
            key: key.to_string(),
        };
        self.finish(self.execute_checked(&request).map(|_| ()))
    }

    /// Add `delta` to a counter and return the store's new value
    ///
    /// The expiry is only sent when given.
    pub fn increment(&self, key: &str, delta: i64, expiry: Option<u64>) -> Result<i64> {
        let request = Request::Increment(self.counter(key, delta, expiry));
        self.finish(self.execute_counter(&request))
    }

    /// Subtract `delta` from a counter and return the store's new value
    pub fn decrement(&self, key: &str, delta: i64, expiry: Option<u64>) -> Result<i64> {
        let request = Request::Decrement(self.counter(key, delta, expiry));
        self.finish(self.execute_counter(&request))
    }

    fn counter(&self, key: &str, delta: i64, expiry: Option<u64>) -> Counter {
        Counter {
            key: key.to_string(),
            delta,
            expiry: expiry.map(|e| self.expiry(Some(e))),
        }
    }

    fn execute_counter(&self, request: &Request) -> Result<i64> {
        let reply = self.execute_checked(request)?;
        reply.body_i64(request.action())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Whether `key` is present, with its remaining TTL when reported
    ///
    /// Any reply without an error indicator means present; a missing or
    /// non-numeric body only leaves the TTL unknown.
    pub fn exists(&self, key: &str) -> Result<Option<Presence>> {
        let request = Request::Exists {
            key: key.to_string(),
        };
        let result = self.execute(&request).and_then(|reply| {
            reply.check(Action::Exists)?;
            let ttl = match reply.body_i64(Action::Exists) {
                Ok(ttl) => Some(ttl),
                Err(e) => {
                    tracing::trace!("{} present without a TTL: {}", key, e);
                    None
                }
            };
            Ok(Some(Presence { ttl }))
        });
        self.read_result(result)
    }

    /// Value of `key`, or `None` when the store reports it absent
    pub fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let request = Request::Get {
            key: key.to_string(),
        };
        let result = self
            .execute(&request)
            .and_then(|reply| reply.check(Action::Get).map(|_| Some(reply.body.unwrap_or_default())));
        self.read_result(result)
    }

    /// Value of `key` with its CAS token and expiry
    ///
    /// `cas` and `expiry` are both set only when the reply carries both;
    /// otherwise both are `None`.
    pub fn get_advanced(&self, key: &str) -> Result<Option<Versioned>> {
        let request = Request::AdvancedGet {
            key: key.to_string(),
        };
        let result = self.execute(&request).and_then(|reply| {
            reply.check(Action::AdvancedGet)?;
            let (cas, expiry) = match (reply.header.cas(), reply.header.expiry()) {
                (Some(cas), Some(expiry)) => (Some(cas), Some(expiry)),
                _ => (None, None),
            };
            Ok(Some(Versioned {
                value: reply.body.unwrap_or_default(),
                cas,
                expiry,
            }))
        });
        self.read_result(result)
    }

    /// Reads report a store-side error indicator as an absent value
    fn read_result<T>(&self, result: Result<Option<T>>) -> Result<Option<T>> {
        match result {
            Err(e) if e.is_store_error() => {
                tracing::trace!("Read reported absent: {}", e);
                self.note_error(&e);
                Ok(None)
            }
            other => self.finish(other),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("group", &self.group().name())
            .field("endpoints", &self.group().len())
            .field("config", &self.config)
            .finish()
    }
}
