//! Shared test helpers
//!
//! `MemoryStore` answers envelopes the way a FlatDB store does, entirely in
//! memory, so client behaviour can be tested without a network.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use flatkv::protocol::{
    decode_key_list, encode_record, fields, Action, Envelope, FieldValue, Reply,
};
use flatkv::registry::{Endpoint, EndpointId};
use flatkv::{Client, Config, ConnectionPool, FlatError, ServerRegistry, Transport};
use parking_lot::Mutex;

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Clone)]
pub struct Entry {
    pub value: Vec<u8>,
    pub cas: u64,
    pub expiry: i64,
}

/// One simulated store endpoint
#[derive(Default)]
pub struct MemoryStore {
    pub name: String,
    data: Mutex<HashMap<String, Entry>>,
    next_cas: AtomicU64,
    received: Mutex<Vec<Envelope>>,
    down: AtomicBool,
    /// Values written by a simulated concurrent client before each insert
    concurrent_writes: Mutex<VecDeque<Vec<u8>>>,
    /// Error code returned by every insert when set
    insert_error: Mutex<Option<i64>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_cas: AtomicU64::new(100),
            ..Default::default()
        }
    }

    pub fn put(&self, key: &str, value: &[u8]) -> u64 {
        let cas = self.bump_cas();
        self.data.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                cas,
                expiry: 3600,
            },
        );
        cas
    }

    pub fn entry(&self, key: &str) -> Option<Entry> {
        self.data.lock().get(key).cloned()
    }

    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.entry(key).map(|e| e.value)
    }

    /// Start handing out CAS tokens after `cas`
    pub fn start_cas_at(&self, cas: u64) {
        self.next_cas.store(cas, Ordering::SeqCst);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn push_concurrent_write(&self, value: &[u8]) {
        self.concurrent_writes.lock().push_back(value.to_vec());
    }

    pub fn fail_inserts_with(&self, code: i64) {
        *self.insert_error.lock() = Some(code);
    }

    pub fn received(&self) -> Vec<Envelope> {
        self.received.lock().clone()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.received().iter().filter_map(Envelope::action).collect()
    }

    fn bump_cas(&self) -> u64 {
        self.next_cas.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn error(code: i64, detail: &str) -> Reply {
        Reply::error(code, detail.to_string())
    }

    fn entry_reply(entry: &Entry) -> Reply {
        Reply::ok(Some(Bytes::from(entry.value.clone())))
            .with_header(fields::CAS, entry.cas)
            .with_header(fields::EXPIRY, entry.expiry)
    }

    fn handle(&self, envelope: &Envelope) -> Reply {
        let action = match envelope.action() {
            Some(action) => action,
            None => return Self::error(99, "unknown action"),
        };
        let key = envelope.key().unwrap_or_default().to_string();
        let value = envelope
            .get(fields::VALUE)
            .and_then(FieldValue::as_bytes)
            .map(<[u8]>::to_vec);
        let expiry = envelope
            .get(fields::EXPIRY)
            .and_then(FieldValue::as_int)
            .unwrap_or(0);

        let mut data = self.data.lock();
        match action {
            Action::Add | Action::Replace | Action::Set => {
                let exists = data.contains_key(&key);
                if action == Action::Add && exists {
                    return Self::error(3, "exists");
                }
                if action == Action::Replace && !exists {
                    return Self::error(4, "not found");
                }
                let cas = self.bump_cas();
                data.insert(
                    key,
                    Entry {
                        value: value.unwrap_or_default(),
                        cas,
                        expiry,
                    },
                );
                if envelope.skip_reply() {
                    Reply::skipped()
                } else {
                    Reply::ok(None)
                }
            }
            Action::Touch => match data.get_mut(&key) {
                Some(entry) => {
                    entry.expiry = expiry;
                    Reply::ok(None)
                }
                None => Self::error(4, "not found"),
            },
            Action::Exists => match data.get(&key) {
                Some(entry) => Reply::ok(Some(Bytes::from(entry.expiry.to_string()))),
                None => Self::error(4, "not found"),
            },
            Action::Increment | Action::Decrement => {
                let delta = envelope
                    .get(fields::VALUE)
                    .and_then(FieldValue::as_int)
                    .unwrap_or(1);
                let Some(entry) = data.get_mut(&key) else {
                    return Self::error(4, "not found");
                };
                let current: i64 = String::from_utf8_lossy(&entry.value).parse().unwrap_or(0);
                let next = if action == Action::Increment {
                    current + delta
                } else {
                    (current - delta).max(0)
                };
                entry.value = next.to_string().into_bytes();
                entry.cas = self.bump_cas();
                if envelope.contains(fields::EXPIRY) {
                    entry.expiry = expiry;
                }
                Reply::ok(Some(Bytes::from(next.to_string())))
            }
            Action::Delete => match data.remove(&key) {
                Some(_) => Reply::ok(None),
                None => Self::error(4, "not found"),
            },
            Action::Get => match data.get(&key) {
                Some(entry) => Reply::ok(Some(Bytes::from(entry.value.clone()))),
                None => Self::error(4, "not found"),
            },
            Action::AdvancedGet => match data.get(&key) {
                Some(entry) => Self::entry_reply(entry),
                None => Self::error(4, "not found"),
            },
            Action::FirstGet => {
                let keys = decode_key_list(&key).unwrap_or_default();
                keys.iter()
                    .find_map(|k| data.get(k).map(|e| Self::entry_reply(e).with_header(fields::KEY, k.as_str())))
                    .unwrap_or_else(|| Self::error(4, "not found"))
            }
            Action::MultiGet => {
                let keys = decode_key_list(&key).unwrap_or_default();
                let mut body = Vec::new();
                for k in &keys {
                    match data.get(k) {
                        Some(e) => encode_record(&mut body, e.cas as u32, e.expiry as u32, &e.value),
                        None => encode_record(&mut body, 0, 0, b""),
                    }
                }
                Reply::ok(Some(Bytes::from(body)))
            }
            Action::Insert => {
                if let Some(code) = *self.insert_error.lock() {
                    return Self::error(code, "insert rejected");
                }
                if let Some(concurrent) = self.concurrent_writes.lock().pop_front() {
                    let cas = self.bump_cas();
                    data.insert(
                        key.clone(),
                        Entry {
                            value: concurrent,
                            cas,
                            expiry,
                        },
                    );
                }

                let expected = envelope.get(fields::CAS).and_then(FieldValue::as_u64);
                let current_cas = data.get(&key).map(|e| e.cas);
                let matches = match (current_cas, expected) {
                    (None, None) => true,
                    (Some(current), Some(expected)) => current == expected,
                    _ => false,
                };

                if !matches {
                    return match data.get(&key) {
                        Some(entry) => Reply::error(1, Bytes::from(entry.value.clone()))
                            .with_header(fields::CAS, entry.cas)
                            .with_header(fields::CURRENT_VALUE, true),
                        None => Self::error(1, "cas mismatch"),
                    };
                }

                let cas = self.bump_cas();
                data.insert(
                    key,
                    Entry {
                        value: value.unwrap_or_default(),
                        cas,
                        expiry,
                    },
                );
                Reply::ok(None).with_header(fields::CAS, cas)
            }
        }
    }
}

impl Transport for MemoryStore {
    fn send(&self, envelope: &Envelope) -> flatkv::Result<Reply> {
        self.received.lock().push(envelope.clone());
        if self.down.load(Ordering::SeqCst) {
            return Err(FlatError::connection(&self.name, "connection refused"));
        }
        Ok(self.handle(envelope))
    }
}

// =============================================================================
// Cluster of stores
// =============================================================================

/// One `MemoryStore` per endpoint, created on first connect
#[derive(Default)]
pub struct MemoryCluster {
    stores: Mutex<HashMap<EndpointId, Arc<MemoryStore>>>,
    connects: AtomicUsize,
    refuse: Mutex<Vec<EndpointId>>,
}

impl MemoryCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn store(&self, endpoint: &Endpoint) -> Arc<MemoryStore> {
        Arc::clone(
            self.stores
                .lock()
                .entry(endpoint.id())
                .or_insert_with(|| Arc::new(MemoryStore::new(endpoint.to_string()))),
        )
    }

    /// Number of transports opened so far
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Make connecting to `endpoint` fail
    pub fn refuse(&self, endpoint: &Endpoint) {
        self.refuse.lock().push(endpoint.id());
    }

    pub fn pool(self: &Arc<Self>) -> Arc<ConnectionPool> {
        let cluster = Arc::clone(self);
        Arc::new(ConnectionPool::new(move |endpoint: &Endpoint| -> flatkv::Result<Arc<dyn Transport>> {
            if cluster.refuse.lock().contains(&endpoint.id()) {
                return Err(FlatError::connection(endpoint, "refused"));
            }
            cluster.connects.fetch_add(1, Ordering::SeqCst);
            let store: Arc<dyn Transport> = cluster.store(endpoint);
            Ok(store)
        }))
    }
}

// =============================================================================
// Client setup
// =============================================================================

pub fn endpoints(weights: &[u32]) -> Vec<Endpoint> {
    weights
        .iter()
        .enumerate()
        .map(|(i, w)| Endpoint::new(format!("node{}", i), 7000 + i as u16, *w))
        .collect()
}

/// Registry with one endpoint per weight in the default group
pub fn registry(weights: &[u32]) -> ServerRegistry {
    let registry = ServerRegistry::new();
    for endpoint in endpoints(weights) {
        registry
            .add_server(endpoint.host, endpoint.port, endpoint.weight, None)
            .unwrap();
    }
    registry
}

pub fn client(weights: &[u32], config: Config) -> (Arc<MemoryCluster>, Client) {
    let cluster = MemoryCluster::new();
    let client = Client::new(&registry(weights), cluster.pool(), config, None);
    (cluster, client)
}

/// Store that `key` routes to
pub fn store_for(cluster: &MemoryCluster, client: &Client, key: &str) -> Arc<MemoryStore> {
    cluster.store(client.router().select_endpoint(key).unwrap())
}

/// Two keys routed to different shards
pub fn keys_on_distinct_shards(client: &Client, prefix: &str) -> (String, String) {
    let first = format!("{}0", prefix);
    let shard = client.router().select_index(&first).unwrap();
    let second = (1..10_000)
        .map(|i| format!("{}{}", prefix, i))
        .find(|k| client.router().select_index(k).unwrap() != shard)
        .expect("no key on another shard");
    (first, second)
}
