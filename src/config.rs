//! Configuration for FlatKV clients
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::routing::WeightWalk;

/// Main configuration for a FlatKV client
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Expiry Configuration
    // -------------------------------------------------------------------------
    /// Expiry (seconds) used by operations called without an explicit one
    pub default_expiry: u64,

    /// Expiry values above this are Unix timestamps, not durations
    pub absolute_expiry_threshold: u64,

    // -------------------------------------------------------------------------
    // Routing Configuration
    // -------------------------------------------------------------------------
    /// Boundary rule of the weighted shard walk; set `Inclusive` when legacy
    /// clients share the cluster
    pub weight_walk: WeightWalk,

    // -------------------------------------------------------------------------
    // Write Configuration
    // -------------------------------------------------------------------------
    /// Whether `set` waits for the store to confirm the write
    pub write_mode: WriteMode,

    // -------------------------------------------------------------------------
    // Batch Configuration
    // -------------------------------------------------------------------------
    /// How batch operations issue their per-shard requests
    pub fan_out: FanOut,

    // -------------------------------------------------------------------------
    // Atomic Update Configuration
    // -------------------------------------------------------------------------
    /// Bounds for the CAS retry loop
    pub retry: RetryPolicy,
}

/// Write confirmation strategy for `set`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Wait for the reply and report store-side failures
    Confirmed,

    /// Ask the transport not to wait for a reply; the write is assumed to succeed
    FireAndForget,
}

/// Fan-out strategy for `get_multi` / `get_first`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOut {
    /// One shard at a time, in order of first appearance
    Sequential,

    /// One scoped thread per shard
    Parallel,
}

/// Bounds for the compare-and-swap retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of conditional inserts attempted (at least 1)
    pub max_attempts: u32,

    /// Backoff before the first retry
    pub initial_backoff: Duration,

    /// Upper bound for a single backoff
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: initial_backoff.saturating_mul(64),
        }
    }

    #[must_use]
    pub fn max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff = max;
        self
    }

    /// Exponential backoff ceiling before the given retry (1-based)
    pub fn backoff_ceiling(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(16, Duration::from_millis(2)).max_backoff(Duration::from_millis(250))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_expiry: 3600,
            absolute_expiry_threshold: 365 * 24 * 3600, // one year
            weight_walk: WeightWalk::Proportional,
            write_mode: WriteMode::FireAndForget,
            fan_out: FanOut::Sequential,
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the expiry (seconds) used when callers don't pass one
    pub fn default_expiry(mut self, secs: u64) -> Self {
        self.config.default_expiry = secs;
        self
    }

    /// Set the threshold above which expiries are absolute timestamps
    pub fn absolute_expiry_threshold(mut self, secs: u64) -> Self {
        self.config.absolute_expiry_threshold = secs;
        self
    }

    /// Set the boundary rule of the weighted shard walk
    pub fn weight_walk(mut self, walk: WeightWalk) -> Self {
        self.config.weight_walk = walk;
        self
    }

    /// Set the write mode for `set`
    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.config.write_mode = mode;
        self
    }

    /// Set the batch fan-out strategy
    pub fn fan_out(mut self, fan_out: FanOut) -> Self {
        self.config.fan_out = fan_out;
        self
    }

    /// Set the CAS retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
