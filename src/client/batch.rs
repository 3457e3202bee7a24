//! Batch operations
//!
//! `get_multi` and `get_first` split their keys per shard and send one
//! request per shard, sequentially or from scoped threads. Both modes
//! produce identical results: replies are merged into caller order, never
//! arrival order.

use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

use super::Client;
use crate::config::FanOut;
use crate::error::{FlatError, Result};
use crate::protocol::{decode_records, Action, Cas, Record, Reply, Request};
use crate::routing::ShardChunk;

/// Multi-get result in caller key order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiGet {
    entries: Vec<(String, Record)>,
    index: HashMap<String, usize>,
}

impl MultiGet {
    /// Every key starts out absent
    fn with_keys(keys: &[String]) -> Self {
        let entries = keys.iter().map(|k| (k.clone(), Record::absent())).collect();
        let index = keys.iter().enumerate().map(|(i, k)| (k.clone(), i)).collect();
        Self { entries, index }
    }

    fn fill(&mut self, key: &str, record: Record) {
        if let Some(&i) = self.index.get(key) {
            self.entries[i].1 = record;
        }
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.entries.iter().map(|(k, r)| (k.as_str(), r))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys that came back with data
    pub fn found(&self) -> usize {
        self.entries.iter().filter(|(_, r)| !r.is_absent()).count()
    }

    pub fn into_entries(self) -> Vec<(String, Record)> {
        self.entries
    }
}

/// Winner of a first-get
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstHit {
    pub key: String,
    pub value: Bytes,
    pub cas: Option<Cas>,
    pub expiry: Option<i64>,
}

#[derive(Debug, Clone)]
enum Resolution {
    Pending,
    Absent,
    Hit(FirstHit),
}

/// Decides the first-get winner as shard replies arrive in any order
///
/// A shard answers with the first of its keys that it holds, so keys listed
/// before the echoed one are absent; keys after it can never win because
/// the echoed key precedes them in caller order. A failed shard resolves
/// all its keys as absent. The winner is the leading key in caller order
/// once everything before it is resolved absent.
struct FirstGetTracker {
    keys: Vec<String>,
    position: HashMap<String, usize>,
    state: Vec<Resolution>,
    cursor: usize,
}

impl FirstGetTracker {
    fn new(keys: &[String]) -> Self {
        Self {
            keys: keys.to_vec(),
            position: keys.iter().enumerate().map(|(i, k)| (k.clone(), i)).collect(),
            state: vec![Resolution::Pending; keys.len()],
            cursor: 0,
        }
    }

    fn resolve(&mut self, chunk: &ShardChunk, hit: Option<FirstHit>) {
        let echoed = hit.as_ref().map(|h| h.key.clone());
        let mut seen_echo = false;
        for key in &chunk.keys {
            let Some(&i) = self.position.get(key) else {
                continue;
            };
            if !seen_echo && echoed.as_deref() == Some(key.as_str()) {
                seen_echo = true;
                if let Some(hit) = hit.clone() {
                    self.state[i] = Resolution::Hit(hit);
                }
            } else {
                self.state[i] = Resolution::Absent;
            }
        }
        if echoed.is_some() && !seen_echo {
            tracing::warn!(
                "Shard {} echoed key {:?} that was not requested from it",
                chunk.shard,
                echoed
            );
        }
    }

    /// The winner, once every key ahead of it is known absent
    fn leading_hit(&mut self) -> Option<FirstHit> {
        while self.cursor < self.keys.len() {
            match &self.state[self.cursor] {
                Resolution::Absent => self.cursor += 1,
                Resolution::Hit(hit) => return Some(hit.clone()),
                Resolution::Pending => return None,
            }
        }
        None
    }
}

/// Keys in first-appearance order without duplicates
fn unique_keys<S: AsRef<str>>(keys: &[S]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.iter()
        .map(AsRef::as_ref)
        .filter(|k| seen.insert(*k))
        .map(str::to_string)
        .collect()
}

impl Client {
    /// Fetch many keys, one request per shard
    ///
    /// The result lists every requested key in caller order. Keys whose
    /// shard failed or returned nothing for them stay absent.
    pub fn get_multi<S: AsRef<str>>(&self, keys: &[S]) -> Result<MultiGet> {
        let keys = unique_keys(keys);
        if keys.is_empty() {
            return Ok(MultiGet::default());
        }

        let chunks = self.finish(self.router.partition(&keys))?;
        let mut output = MultiGet::with_keys(&keys);
        let mut failure = None;

        self.fan_out(
            &chunks,
            |chunk| Request::MultiGet {
                keys: chunk.keys.clone(),
            },
            |chunk, reply| {
                match reply.and_then(|r| r.check(Action::MultiGet).map(|_| r)) {
                    Ok(reply) => {
                        let body = reply.body.unwrap_or_default();
                        let records = decode_records(body, chunk.keys.len());
                        for (key, record) in chunk.keys.iter().zip(records) {
                            output.fill(key, record);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Multi-get on shard {} failed, {} keys left absent: {}",
                            chunk.shard,
                            chunk.keys.len(),
                            e
                        );
                        failure = Some(e);
                    }
                }
                ControlFlow::Continue(())
            },
        );

        match failure {
            Some(e) => self.note_error(&e),
            None => self.clear_error(),
        }
        Ok(output)
    }

    /// Return the first key, in caller order, that the store holds
    ///
    /// Fails with `NotFound` when no shard holds any of the keys.
    pub fn get_first<S: AsRef<str>>(&self, keys: &[S]) -> Result<FirstHit> {
        let keys = unique_keys(keys);
        if keys.is_empty() {
            return self.finish(Err(FlatError::NotFound("no keys given".to_string())));
        }

        let chunks = self.finish(self.router.partition(&keys))?;
        let mut tracker = FirstGetTracker::new(&keys);
        let mut winner = None;

        self.fan_out(
            &chunks,
            |chunk| Request::FirstGet {
                keys: chunk.keys.clone(),
            },
            |chunk, reply| {
                let hit = match reply.and_then(|r| r.check(Action::FirstGet).map(|_| r)) {
                    Ok(reply) => match reply.header.key() {
                        Some(key) => Some(FirstHit {
                            key: key.to_string(),
                            cas: reply.header.cas(),
                            expiry: reply.header.expiry(),
                            value: reply.body.unwrap_or_default(),
                        }),
                        None => {
                            tracing::warn!("First-get reply from shard {} has no key", chunk.shard);
                            None
                        }
                    },
                    Err(e) => {
                        tracing::debug!("First-get on shard {} found nothing: {}", chunk.shard, e);
                        None
                    }
                };
                tracker.resolve(chunk, hit);

                match tracker.leading_hit() {
                    Some(hit) => {
                        winner = Some(hit);
                        ControlFlow::Break(())
                    }
                    None => ControlFlow::Continue(()),
                }
            },
        );

        match winner.or_else(|| tracker.leading_hit()) {
            Some(hit) => self.finish(Ok(hit)),
            None => self.finish(Err(FlatError::NotFound("no key found".to_string()))),
        }
    }

    /// Send one request per chunk and hand each reply to `on_reply`
    ///
    /// `on_reply` always runs on the calling thread. Returning `Break` stops
    /// further requests; in parallel mode shards that have not started yet
    /// skip their request, in-flight ones finish and are discarded.
    fn fan_out<B, H>(&self, chunks: &[ShardChunk], build: B, mut on_reply: H)
    where
        B: Fn(&ShardChunk) -> Request + Sync,
        H: FnMut(&ShardChunk, Result<Reply>) -> ControlFlow<()>,
    {
        let send = |chunk: &ShardChunk| -> Result<Reply> {
            let endpoint = self.router.endpoint(chunk.shard).ok_or_else(|| {
                FlatError::Config(format!("shard {} is not in the bound group", chunk.shard))
            })?;
            self.execute_on(endpoint, &build(chunk))
        };

        if self.config.fan_out == FanOut::Sequential || chunks.len() < 2 {
            for chunk in chunks {
                if on_reply(chunk, send(chunk)).is_break() {
                    return;
                }
            }
            return;
        }

        let stop = AtomicBool::new(false);
        let scoped = crossbeam::scope(|scope| {
            let (tx, rx) = crossbeam::channel::unbounded();
            for (i, chunk) in chunks.iter().enumerate() {
                let tx = tx.clone();
                let send = &send;
                let stop = &stop;
                scope.spawn(move |_| {
                    if stop.load(Ordering::Acquire) {
                        return;
                    }
                    let _ = tx.send((i, send(chunk)));
                });
            }
            drop(tx);

            for (i, reply) in rx {
                if on_reply(&chunks[i], reply).is_break() {
                    stop.store(true, Ordering::Release);
                    break;
                }
            }
        });

        if let Err(panic) = scoped {
            std::panic::resume_unwind(panic);
        }
    }
}
