//! Atomic updates
//!
//! Conditional insert plus the read-modify-write loop built on it.
//!
//! ## Loop
//! ```text
//! get_advanced ─► transform ─► insert(cas) ─► Stored ──────► done
//!                    ▲                     └► Conflict ─┐
//!                    └──── backoff, adopt server value ◄┘
//! ```
//! Only a CAS conflict is retried. Every other failure aborts the loop.

use std::time::{Duration, Instant};

use bytes::Bytes;
use rand::Rng;

use super::Client;
use crate::error::{FlatError, Result};
use crate::protocol::{fields, Action, Cas, Insert, Request};

/// Result of a conditional insert the store answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The value was written; `cas` is its new version
    Stored { cas: Option<Cas> },

    /// The expected CAS was stale; the store's current value and version
    Conflict {
        current: Option<Bytes>,
        cas: Option<Cas>,
    },
}

/// Value written by an atomic update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicUpdate {
    pub value: Bytes,
    pub cas: Option<Cas>,
    /// Conditional inserts it took, including the successful one
    pub attempts: u32,
}

impl Client {
    /// Insert `value` if the stored version still equals `cas`
    ///
    /// With `cas = None` the insert only succeeds when the key holds no
    /// versioned value. A conflict is an `Ok` outcome carrying the store's
    /// current value; out-of-memory and other store errors, as well as
    /// connection failures, are errors.
    pub fn atomic_advanced_insert(
        &self,
        key: &str,
        value: Option<Bytes>,
        cas: Option<Cas>,
        expiry: Option<u64>,
    ) -> Result<InsertOutcome> {
        let request = Request::Insert(Insert {
            key: key.to_string(),
            value,
            cas,
            expiry: self.expiry(expiry),
        });

        let reply = self.finish(self.execute(&request))?;
        let new_cas = reply.header.cas();

        match reply.check(Action::Insert) {
            Ok(()) => {
                self.clear_error();
                Ok(InsertOutcome::Stored { cas: new_cas })
            }
            Err(e) if e.is_cas_mismatch() => {
                self.note_error(&e);
                let current = if reply.header.contains(fields::CURRENT_VALUE) {
                    reply.body
                } else {
                    None
                };
                Ok(InsertOutcome::Conflict {
                    current,
                    cas: new_cas,
                })
            }
            Err(e) => self.finish(Err(e)),
        }
    }

    /// Atomically replace the value of `key` with `transform(current)`
    ///
    /// `transform` receives `None` when the key holds no value. It may run
    /// several times and must not have side effects beyond computing the
    /// new value. Retries are bounded by the configured `RetryPolicy`.
    pub fn atomic_set<F>(&self, key: &str, expiry: Option<u64>, transform: F) -> Result<AtomicUpdate>
    where
        F: FnMut(Option<&Bytes>) -> Bytes,
    {
        self.atomic_set_until(key, expiry, None, transform)
    }

    /// `atomic_set` that gives up once `deadline` would be passed
    pub fn atomic_set_with_deadline<F>(
        &self,
        key: &str,
        expiry: Option<u64>,
        deadline: Instant,
        transform: F,
    ) -> Result<AtomicUpdate>
    where
        F: FnMut(Option<&Bytes>) -> Bytes,
    {
        self.atomic_set_until(key, expiry, Some(deadline), transform)
    }

    fn atomic_set_until<F>(
        &self,
        key: &str,
        expiry: Option<u64>,
        deadline: Option<Instant>,
        mut transform: F,
    ) -> Result<AtomicUpdate>
    where
        F: FnMut(Option<&Bytes>) -> Bytes,
    {
        let policy = self.config.retry;

        let (mut current, mut cas) = match self.get_advanced(key)? {
            Some(versioned) => (Some(versioned.value), versioned.cas),
            None => (None, None),
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            let value = transform(current.as_ref());

            match self.atomic_advanced_insert(key, Some(value.clone()), cas, expiry)? {
                InsertOutcome::Stored { cas } => {
                    if attempts > 1 {
                        tracing::debug!("Atomic update of {:?} succeeded after {} attempts", key, attempts);
                    }
                    return Ok(AtomicUpdate {
                        value,
                        cas,
                        attempts,
                    });
                }
                InsertOutcome::Conflict {
                    current: latest,
                    cas: latest_cas,
                } => {
                    tracing::debug!(
                        "CAS conflict on {:?} (attempt {}), retrying from version {:?}",
                        key,
                        attempts,
                        latest_cas.map(|c| c.get())
                    );
                    current = latest;
                    cas = latest_cas;
                }
            }

            if attempts >= policy.max_attempts {
                tracing::warn!("Atomic update of {:?} gave up after {} attempts", key, attempts);
                return self.finish(Err(FlatError::RetriesExhausted {
                    key: key.to_string(),
                    attempts,
                }));
            }

            let delay = jittered(policy.backoff_ceiling(attempts));
            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    return self.finish(Err(FlatError::DeadlineExceeded {
                        key: key.to_string(),
                        attempts,
                    }));
                }
            }
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }
    }
}

/// Full jitter: uniform in `[0, ceiling]`
fn jittered(ceiling: Duration) -> Duration {
    let nanos = ceiling.as_nanos().min(u128::from(u64::MAX)) as u64;
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
}
