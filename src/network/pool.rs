//! Connection pool
//!
//! Process-wide reuse of transports, constructed explicitly and shared by
//! every client through an `Arc`.
//!
//! ## Locking
//! - The map lock is held only to find or insert an endpoint's slot
//! - Each slot has its own lock, held while the transport is opened
//!
//! Concurrent first use of one endpoint therefore opens exactly one
//! transport, while other endpoints are not blocked behind it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Transport, TransportFactory};
use crate::error::Result;
use crate::registry::{Endpoint, EndpointId};

type Slot = Arc<Mutex<Option<Arc<dyn Transport>>>>;

/// Cache of open transports keyed by `(host, port)`
pub struct ConnectionPool {
    factory: Box<dyn TransportFactory>,
    slots: Mutex<HashMap<EndpointId, Slot>>,
}

impl ConnectionPool {
    pub fn new(factory: impl TransportFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Cached transport for `endpoint`, opening one on first use
    ///
    /// A failed open leaves nothing cached; the next call tries again.
    pub fn get(&self, endpoint: &Endpoint) -> Result<Arc<dyn Transport>> {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(endpoint.id()).or_default())
        };

        let mut guard = slot.lock();
        if let Some(transport) = guard.as_ref() {
            return Ok(Arc::clone(transport));
        }

        tracing::debug!("Opening transport to {}", endpoint);
        let transport = self.factory.connect(endpoint).map_err(|e| {
            tracing::warn!("Failed to open transport to {}: {}", endpoint, e);
            e
        })?;
        *guard = Some(Arc::clone(&transport));
        Ok(transport)
    }

    /// Drop the cached transport for one endpoint
    pub fn remove(&self, endpoint: &Endpoint) -> Option<Arc<dyn Transport>> {
        let slot = self.slots.lock().remove(&endpoint.id())?;
        let transport = slot.lock().take();
        if transport.is_some() {
            tracing::debug!("Dropped transport to {}", endpoint);
        }
        transport
    }

    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        let slot = self.slots.lock().get(&endpoint.id()).cloned();
        slot.map(|slot| slot.lock().is_some()).unwrap_or(false)
    }

    /// Number of open transports
    ///
    /// Waits for opens already in progress, but never while holding the map lock.
    pub fn len(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|slot| slot.lock().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Slot> {
        self.slots.lock().values().cloned().collect()
    }

    /// Drop every cached transport; returns how many were open
    pub fn shutdown(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().drain().map(|(_, slot)| slot).collect();
        let closed = slots
            .into_iter()
            .filter(|slot| slot.lock().take().is_some())
            .count();
        tracing::info!("Connection pool shut down, {} transports dropped", closed);
        closed
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("endpoints", &self.slots.lock().len())
            .finish()
    }
}
