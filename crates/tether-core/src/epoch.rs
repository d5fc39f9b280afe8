//! Activity timestamps.
//!
//! An [`Epoch`] is Unix time in milliseconds. [`Epoch::now`] never goes
//! backwards within a process, even if the wall clock does, so epochs taken
//! in sequence can be compared to order activity.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

static LAST_ISSUED: AtomicI64 = AtomicI64::new(0);

/// Millisecond timestamp of an event, monotonic per process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(i64);

impl Epoch {
    /// The zero epoch, used before any activity has been recorded.
    pub const ZERO: Self = Self(0);

    /// Current time, clamped so it is never below a previously returned value.
    pub fn now() -> Self {
        let wall = chrono::Utc::now().timestamp_millis();
        let prev = LAST_ISSUED.fetch_max(wall, Ordering::AcqRel);
        Self(prev.max(wall))
    }

    /// Wrap a raw millisecond value.
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    /// Raw milliseconds since the Unix epoch.
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Milliseconds elapsed from `self` until `later`, saturating at zero.
    pub fn millis_until(self, later: Self) -> u64 {
        u64::try_from(later.0.saturating_sub(self.0)).unwrap_or(0)
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Epoch> for i64 {
    fn from(epoch: Epoch) -> Self {
        epoch.0
    }
}
