//! Verdict model: one test outcome at one commit position.

use serde::{Deserialize, Serialize};

use crate::{CommitPosition, Hour};

/// One group of result attempts sharing a run identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Run {
    /// Expected results in this run (skipped results excluded).
    pub expected_result_count: u32,
    /// Unexpected results in this run (skipped results excluded).
    pub unexpected_result_count: u32,
    /// Whether this run duplicates another run and must be excluded from
    /// headline counts.
    pub is_duplicate: bool,
}

impl Run {
    #[must_use]
    pub const fn new(expected: u32, unexpected: u32, is_duplicate: bool) -> Self {
        Self {
            expected_result_count: expected,
            unexpected_result_count: unexpected,
            is_duplicate,
        }
    }
}

/// Detail carried by every verdict that is not simple-expected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerdictDetails {
    pub is_exonerated: bool,
    pub runs: Vec<Run>,
}

/// One test verdict at one commit position.
///
/// `details` is `None` exactly for simple-expected verdicts (one run, one
/// expected result, no duplicates, not exonerated), which are the
/// overwhelmingly common case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionVerdict {
    pub commit_position: CommitPosition,
    pub hour: Hour,
    pub details: Option<VerdictDetails>,
}

impl PositionVerdict {
    /// A single expected result with no retries, duplicates or exoneration.
    #[must_use]
    pub const fn simple_expected(commit_position: CommitPosition, hour: Hour) -> Self {
        Self {
            commit_position,
            hour,
            details: None,
        }
    }

    /// A verdict that needs its full run breakdown.
    #[must_use]
    pub const fn with_details(
        commit_position: CommitPosition,
        hour: Hour,
        details: VerdictDetails,
    ) -> Self {
        Self {
            commit_position,
            hour,
            details: Some(details),
        }
    }

    #[inline]
    pub const fn is_simple_expected(&self) -> bool {
        self.details.is_none()
    }

    /// Key a History is sorted by. Verdicts at the same commit position are
    /// ordered oldest hour first.
    #[inline]
    pub const fn sort_key(&self) -> (CommitPosition, Hour) {
        (self.commit_position, self.hour)
    }
}
