//! Value types shared by every flakeseg crate: commit positions, hours,
//! verdicts, aggregate counts, segments and branch identity.

pub mod identity;
pub mod segment;
pub mod varint;
pub mod verdict;

pub use identity::{BranchKey, GitilesRef, SourceRef, Variant};
pub use segment::{Counts, Segment, SegmentState};
pub use verdict::{PositionVerdict, Run, VerdictDetails};

use std::fmt;

/// Seconds in one hour.
pub const SECONDS_PER_HOUR: i64 = 3600;

/// Ordinal locating a verdict along a linear source history.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct CommitPosition(u64);

impl CommitPosition {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CommitPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A timestamp truncated to the hour, in seconds since the Unix epoch.
///
/// Every constructor truncates, so two `Hour`s compare equal exactly when
/// they fall in the same wall-clock hour.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(from = "i64", into = "i64")]
pub struct Hour(i64);

impl Hour {
    pub const EPOCH: Self = Self(0);

    /// Truncate a Unix timestamp (seconds) down to the start of its hour.
    #[inline]
    #[must_use]
    pub const fn from_unix_seconds(seconds: i64) -> Self {
        Self(
            seconds
                .div_euclid(SECONDS_PER_HOUR)
                .saturating_mul(SECONDS_PER_HOUR),
        )
    }

    /// The hour `hours` hours after the epoch.
    #[inline]
    #[must_use]
    pub const fn from_hours(hours: i64) -> Self {
        Self(hours.saturating_mul(SECONDS_PER_HOUR))
    }

    #[inline]
    pub const fn unix_seconds(self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn hours_since_epoch(self) -> i64 {
        self.0 / SECONDS_PER_HOUR
    }
}

impl From<i64> for Hour {
    fn from(seconds: i64) -> Self {
        Self::from_unix_seconds(seconds)
    }
}

impl From<Hour> for i64 {
    fn from(hour: Hour) -> Self {
        hour.0
    }
}

impl fmt::Display for Hour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.hours_since_epoch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_truncates() {
        assert_eq!(Hour::from_unix_seconds(7199), Hour::from_hours(1));
        assert_eq!(Hour::from_unix_seconds(7200), Hour::from_hours(2));
        assert_eq!(Hour::from_unix_seconds(0), Hour::EPOCH);
        assert_eq!(Hour::from_unix_seconds(-1), Hour::from_hours(-1));
        assert_eq!(Hour::from_hours(1005).unix_seconds(), 1005 * 3600);
    }

    #[test]
    fn hour_serde_truncates_on_read() {
        let hour: Hour = serde_json::from_str("3601").expect("integer hour");
        assert_eq!(hour, Hour::from_hours(1));
        assert_eq!(serde_json::to_string(&hour).expect("serialize"), "3600");
    }

    #[test]
    fn commit_position_orders_numerically() {
        assert!(CommitPosition::new(9) < CommitPosition::new(10));
        assert_eq!(CommitPosition::new(42).to_string(), "@42");
        assert_eq!(serde_json::to_string(&CommitPosition::new(7)).unwrap(), "7");
    }
}
