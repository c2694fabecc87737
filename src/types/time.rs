//! Nanosecond timestamps with an "empty" sentinel.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds since the Unix epoch; 0 means "not recorded".
///
/// Lifecycle records carry many of these (market-data, created, sent,
/// confirmed, ended), most of which start out empty and are stamped as
/// the order progresses.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Ts(u64);

impl Ts {
    /// The "not recorded" sentinel.
    pub const EMPTY: Ts = Ts(0);

    /// Construct from raw nanoseconds.
    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Ts(nanos)
    }

    /// Current wall-clock time.
    #[inline]
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Ts(nanos)
    }

    /// Raw nanoseconds since the epoch.
    #[inline]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Whole microseconds since the epoch.
    #[inline]
    pub const fn micros(self) -> u64 {
        self.0 / 1_000
    }

    /// True iff this timestamp was never recorded.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Signed difference `self - earlier` in microseconds.
    #[inline]
    pub fn micros_since(self, earlier: Ts) -> i64 {
        (self.0 as i64 - earlier.0 as i64) / 1_000
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("-")
        } else {
            write!(f, "{}ns", self.0)
        }
    }
}
