//! Entry and TTL definitions
//!
//! An entry pairs a payload with an optional absolute expiry instant.
//! Instants are Unix milliseconds so they survive a dump/load cycle
//! unchanged.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Current wall clock in Unix milliseconds
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        // Clock before 1970: treat as the epoch itself
        .unwrap_or(0)
}

/// Time-to-live requested for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// The entry never expires
    #[default]
    Never,

    /// Expire after this many seconds; zero or negative expires immediately
    Seconds(i64),

    /// Expire after this many milliseconds; zero or negative expires immediately
    Millis(i64),
}

impl Ttl {
    /// Absolute expiry instant for a write happening at `now` (Unix ms)
    pub fn deadline(self, now: u64) -> Option<u64> {
        let millis = match self {
            Ttl::Never => return None,
            Ttl::Seconds(s) => s.saturating_mul(1000),
            Ttl::Millis(ms) => ms,
        };

        if millis <= 0 {
            Some(now)
        } else {
            Some(now.saturating_add(millis as u64))
        }
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        Ttl::Millis(i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(d: Option<Duration>) -> Self {
        d.map(Ttl::from).unwrap_or(Ttl::Never)
    }
}

/// Remaining lifetime of a live key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// No expiry set
    Persistent,

    /// Time left until the key expires
    Remaining(Duration),
}

impl KeyTtl {
    /// Whole seconds left, `-1` for a persistent key
    pub fn as_secs(&self) -> i64 {
        match self {
            KeyTtl::Persistent => -1,
            KeyTtl::Remaining(d) => d.as_secs() as i64,
        }
    }
}

/// A stored payload with its optional expiry instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<T> {
    /// The actual payload stored
    pub value: T,

    /// Unix ms when this entry expires (None = never expires)
    pub expires_at: Option<u64>,
}

impl<T> Entry<T> {
    /// Creates an entry expiring according to `ttl`, measured from `now`
    pub fn new(value: T, ttl: Ttl, now: u64) -> Self {
        Self {
            value,
            expires_at: ttl.deadline(now),
        }
    }

    /// Creates an entry without expiry
    pub fn persistent(value: T) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Checks if this entry has expired at `now`
    #[inline]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }

    /// Checks if this entry has expired
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Remaining lifetime at `now`
    pub fn ttl_at(&self, now: u64) -> KeyTtl {
        match self.expires_at {
            None => KeyTtl::Persistent,
            Some(exp) => KeyTtl::Remaining(Duration::from_millis(exp.saturating_sub(now))),
        }
    }
}
