//! Millisecond timestamps.
//!
//! The slot scheduler must reach bit-identical decisions on every node, so
//! time is an integer count of milliseconds since the Unix epoch. One
//! millisecond is the smallest unit the schedule ever offsets by.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A wall-clock instant in milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The Unix epoch.
    pub const UNIX_EPOCH: Self = Self(0);

    /// Creates a timestamp from milliseconds since the Unix epoch.
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Creates a timestamp from whole seconds since the Unix epoch.
    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1000)
    }

    /// Reads the system clock.
    ///
    /// A clock set before 1970 reads as the Unix epoch.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(millis)
    }

    /// Milliseconds since the Unix epoch.
    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Returns `self + millis`, or `None` on overflow.
    #[inline]
    pub fn checked_add_millis(&self, millis: u64) -> Option<Self> {
        self.0.checked_add(millis).map(Self)
    }

    /// Returns `self + millis`, saturating at `u64::MAX`.
    #[inline]
    pub fn saturating_add_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Milliseconds elapsed since `earlier`, or `None` if `earlier` is later.
    #[inline]
    pub fn millis_since(&self, earlier: Timestamp) -> Option<u64> {
        self.0.checked_sub(earlier.0)
    }

    /// Duration until `later`, zero if `later` is not in the future.
    pub fn duration_until(&self, later: Timestamp) -> Duration {
        Duration::from_millis(later.0.saturating_sub(self.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Self {
        Self(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_secs() {
        assert_eq!(Timestamp::from_secs(25).as_millis(), 25_000);
    }

    #[test]
    fn test_millis_since() {
        let a = Timestamp::from_millis(100);
        let b = Timestamp::from_millis(250);
        assert_eq!(b.millis_since(a), Some(150));
        assert_eq!(a.millis_since(b), None);
    }

    #[test]
    fn test_duration_until() {
        let a = Timestamp::from_millis(100);
        assert_eq!(a.duration_until(Timestamp::from_millis(350)), Duration::from_millis(250));
        assert_eq!(a.duration_until(Timestamp::from_millis(50)), Duration::ZERO);
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&Timestamp::from_millis(42)).unwrap();
        assert_eq!(json, "42");
    }
}
