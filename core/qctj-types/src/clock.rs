//! Wall clock abstraction.
//!
//! Rate limits and license expiry checks compare unix-second timestamps, so
//! the clock is injected everywhere instead of calling `Utc::now()` inline.

use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Mutex, PoisonError};

/// Seconds in one day.
pub const DAY_IN_SECONDS: i64 = 24 * 60 * 60;

/// Seconds in one week.
pub const WEEK_IN_SECONDS: i64 = 7 * DAY_IN_SECONDS;

/// Abstraction over time to enable deterministic tests.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current unix timestamp in seconds.
    fn timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually driven clock for tests and simulations.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Creates a clock frozen at the given instant.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Creates a clock frozen at the given unix timestamp.
    pub fn at_timestamp(secs: i64) -> Result<Self> {
        let now = Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or(Error::InvalidTimestamp(secs))?;
        Ok(Self::new(now))
    }

    /// Moves the clock forward (or backward for negative values).
    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += chrono::Duration::seconds(secs);
    }

    /// Moves the clock forward by whole days.
    pub fn advance_days(&self, days: i64) {
        self.advance_secs(days * DAY_IN_SECONDS);
    }

    /// Pins the clock to an instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
