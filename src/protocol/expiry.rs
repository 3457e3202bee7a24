//! Expiry normalization
//!
//! Callers may pass either a duration in seconds or an absolute Unix
//! timestamp; the store only accepts durations.

use std::time::{SystemTime, UNIX_EPOCH};

/// Convert an expiry to relative seconds
///
/// Values above `threshold` are absolute timestamps and become `expiry - now`.
/// A timestamp already in the past yields a negative duration, which the
/// store treats as expired.
pub fn normalize_expiry(expiry: u64, threshold: u64, now: u64) -> i64 {
    let expiry = i64::try_from(expiry).unwrap_or(i64::MAX);
    if expiry as u64 > threshold {
        let now = i64::try_from(now).unwrap_or(i64::MAX);
        expiry.saturating_sub(now)
    } else {
        expiry
    }
}

/// Seconds since the Unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
