//! Tests for ConnectionPool
//!
//! These tests verify:
//! - One transport per endpoint, shared between callers
//! - At most one open under concurrent first use
//! - Failed opens are not cached
//! - Removal and shutdown

#[path = "../common/mod.rs"]
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use flatkv::protocol::{Action, Envelope, Reply};
use flatkv::registry::Endpoint;
use flatkv::{Client, Config, ConnectionPool, FlatError, Transport};

use common::MemoryCluster;

struct NullTransport;

impl Transport for NullTransport {
    fn send(&self, _envelope: &Envelope) -> flatkv::Result<Reply> {
        Ok(Reply::ok(None))
    }
}

fn endpoint(port: u16) -> Endpoint {
    Endpoint::new("127.0.0.1", port, 1)
}

// =============================================================================
// Reuse Tests
// =============================================================================

#[test]
fn test_same_endpoint_reuses_transport() {
    let cluster = MemoryCluster::new();
    let pool = cluster.pool();

    let a = pool.get(&endpoint(1)).unwrap();
    let b = pool.get(&endpoint(1)).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cluster.connects(), 1);
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_weight_does_not_split_endpoints() {
    let cluster = MemoryCluster::new();
    let pool = cluster.pool();

    pool.get(&Endpoint::new("h", 1, 1)).unwrap();
    pool.get(&Endpoint::new("h", 1, 9)).unwrap();
    pool.get(&Endpoint::new("h", 2, 1)).unwrap();

    assert_eq!(cluster.connects(), 2);
}

#[test]
fn test_clients_share_pool() {
    let cluster = MemoryCluster::new();
    let pool = cluster.pool();
    let registry = common::registry(&[1]);

    let first = Client::new(&registry, Arc::clone(&pool), Config::default(), None);
    let second = Client::new(&registry, Arc::clone(&pool), Config::default(), None);

    first.set("k", "v", None).unwrap();
    assert_eq!(second.get("k").unwrap().as_deref(), Some(&b"v"[..]));
    assert_eq!(cluster.connects(), 1);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_first_use_opens_once() {
    let opened = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&opened);
    let pool = Arc::new(ConnectionPool::new(move |_: &Endpoint| -> flatkv::Result<Arc<dyn Transport>> {
        counter.fetch_add(1, Ordering::SeqCst);
        // Widen the race window
        thread::sleep(Duration::from_millis(20));
        let transport: Arc<dyn Transport> = Arc::new(NullTransport);
        Ok(transport)
    }));

    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pool.get(&endpoint(7000)).unwrap()
            })
        })
        .collect();

    let transports: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert!(transports.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn test_concurrent_distinct_endpoints() {
    let cluster = MemoryCluster::new();
    let pool = cluster.pool();

    let handles: Vec<_> = (0..8u16)
        .map(|i| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..10 {
                    pool.get(&endpoint(i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cluster.connects(), 8);
    assert_eq!(pool.len(), 8);
}

#[test]
fn test_slow_open_does_not_block_other_endpoints() {
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let entered_tx = Mutex::new(entered_tx);
    let release_rx = Mutex::new(release_rx);

    let pool = Arc::new(ConnectionPool::new(move |e: &Endpoint| -> flatkv::Result<Arc<dyn Transport>> {
        if e.port == 1 {
            let _ = entered_tx.lock().unwrap().send(());
            // Blocks until the test releases it (or drops the sender)
            let _ = release_rx.lock().unwrap().recv();
        }
        let transport: Arc<dyn Transport> = Arc::new(NullTransport);
        Ok(transport)
    }));

    let slow = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.get(&endpoint(1)).is_ok())
    };
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    // Waits on the slow slot; must not hold up other endpoints meanwhile
    let counting = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.len())
    };
    thread::sleep(Duration::from_millis(50));

    let (done_tx, done_rx) = mpsc::channel();
    {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let opened = pool.get(&endpoint(2)).is_ok();
            let _ = done_tx.send((opened, pool.contains(&endpoint(2))));
        });
    }
    let other = done_rx.recv_timeout(Duration::from_secs(5));
    release_tx.send(()).unwrap();

    assert_eq!(other.unwrap(), (true, true));
    assert!(slow.join().unwrap());
    assert!(counting.join().unwrap() >= 1);
    assert_eq!(pool.len(), 2);
}

// =============================================================================
// Failure and Lifecycle Tests
// =============================================================================

#[test]
fn test_failed_open_is_not_cached() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let pool = ConnectionPool::new(move |e: &Endpoint| -> flatkv::Result<Arc<dyn Transport>> {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(FlatError::Connection {
                endpoint: e.to_string(),
                reason: "refused".to_string(),
            });
        }
        let transport: Arc<dyn Transport> = Arc::new(NullTransport);
        Ok(transport)
    });

    assert!(matches!(pool.get(&endpoint(1)), Err(e) if e.is_connection_error()));
    assert!(!pool.contains(&endpoint(1)));

    pool.get(&endpoint(1)).unwrap();
    assert!(pool.contains(&endpoint(1)));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_remove_forces_reopen() {
    let cluster = MemoryCluster::new();
    let pool = cluster.pool();

    pool.get(&endpoint(1)).unwrap();
    assert!(pool.remove(&endpoint(1)).is_some());
    assert!(pool.remove(&endpoint(1)).is_none());
    assert!(pool.is_empty());

    pool.get(&endpoint(1)).unwrap();
    assert_eq!(cluster.connects(), 2);
}

#[test]
fn test_connection_error_drops_transport() {
    let (cluster, client) = common::client(&[1], Config::default());
    let endpoint = client.group().endpoints()[0].clone();

    client.set("k", "v", None).unwrap();
    assert!(client.pool().contains(&endpoint));

    cluster.store(&endpoint).set_down(true);
    let err = client.get("k").unwrap_err();
    assert!(err.is_connection_error());
    assert!(!client.pool().contains(&endpoint));

    cluster.store(&endpoint).set_down(false);
    assert!(client.get("k").unwrap().is_some());
    assert_eq!(cluster.connects(), 2);
    assert!(cluster.store(&endpoint).actions().contains(&Action::Get));
}

#[test]
fn test_shutdown_drops_everything() {
    let cluster = MemoryCluster::new();
    let pool = cluster.pool();

    for port in 1..=3 {
        pool.get(&endpoint(port)).unwrap();
    }
    assert_eq!(pool.shutdown(), 3);
    assert!(pool.is_empty());
    assert_eq!(pool.shutdown(), 0);
}
