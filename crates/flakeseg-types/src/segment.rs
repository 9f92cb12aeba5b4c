//! Segments and the additive counts they carry.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::{CommitPosition, Hour};

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// Additive aggregate of result, run and verdict tallies for a segment.
///
/// Forms a commutative monoid under field-wise (saturating) addition with
/// [`Counts::default`] as identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Counts {
    pub total_results: u64,
    pub unexpected_results: u64,
    pub total_runs: u64,
    pub unexpected_unretried_runs: u64,
    pub unexpected_after_retry_runs: u64,
    pub flaky_runs: u64,
    pub total_verdicts: u64,
    pub unexpected_verdicts: u64,
    pub flaky_verdicts: u64,
}

impl Counts {
    pub const ZERO: Self = Self {
        total_results: 0,
        unexpected_results: 0,
        total_runs: 0,
        unexpected_unretried_runs: 0,
        unexpected_after_retry_runs: 0,
        flaky_runs: 0,
        total_verdicts: 0,
        unexpected_verdicts: 0,
        flaky_verdicts: 0,
    };

    /// Field-wise sum.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        Self {
            total_results: self.total_results.saturating_add(other.total_results),
            unexpected_results: self
                .unexpected_results
                .saturating_add(other.unexpected_results),
            total_runs: self.total_runs.saturating_add(other.total_runs),
            unexpected_unretried_runs: self
                .unexpected_unretried_runs
                .saturating_add(other.unexpected_unretried_runs),
            unexpected_after_retry_runs: self
                .unexpected_after_retry_runs
                .saturating_add(other.unexpected_after_retry_runs),
            flaky_runs: self.flaky_runs.saturating_add(other.flaky_runs),
            total_verdicts: self.total_verdicts.saturating_add(other.total_verdicts),
            unexpected_verdicts: self
                .unexpected_verdicts
                .saturating_add(other.unexpected_verdicts),
            flaky_verdicts: self.flaky_verdicts.saturating_add(other.flaky_verdicts),
        }
    }
}

impl Add for Counts {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.combine(rhs)
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.combine(rhs);
    }
}

impl Sum for Counts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::combine)
    }
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// Lifecycle state of a segment once it has left the analyzer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentState {
    /// Still open: its end may move as more verdicts arrive.
    #[default]
    Finalizing,
    /// Closed: both boundaries are fixed.
    Finalized,
}

impl std::fmt::Display for SegmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finalizing => write!(f, "FINALIZING"),
            Self::Finalized => write!(f, "FINALIZED"),
        }
    }
}

/// A contiguous commit-position range with statistically stable behaviour.
///
/// The start bounds are only meaningful when `has_start_changepoint` is set.
/// `end_position` and `end_hour` are not yet fixed while the segment is
/// [`SegmentState::Finalizing`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Segment {
    pub state: SegmentState,
    pub has_start_changepoint: bool,
    pub start_position: CommitPosition,
    pub start_hour: Option<Hour>,
    pub start_position_lower_bound_99th: CommitPosition,
    pub start_position_upper_bound_99th: CommitPosition,
    pub end_position: CommitPosition,
    pub end_hour: Option<Hour>,
    pub finalized_counts: Counts,
    pub most_recent_unexpected_result_hour: Option<Hour>,
}

impl Segment {
    #[inline]
    pub const fn is_finalizing(&self) -> bool {
        matches!(self.state, SegmentState::Finalizing)
    }

    #[inline]
    pub const fn is_finalized(&self) -> bool {
        matches!(self.state, SegmentState::Finalized)
    }
}
