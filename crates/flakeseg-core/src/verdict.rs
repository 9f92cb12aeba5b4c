//! Turns a raw test verdict bundle into a [`PositionVerdict`].

use std::collections::HashSet;

use flakeseg_error::{FlakeError, Result};
use flakeseg_types::{CommitPosition, Hour, PositionVerdict, Run, VerdictDetails};
use serde::{Deserialize, Serialize};
use tracing::error;

/// One result attempt inside a verdict bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResult {
    /// Identity of the run that produced this result, if known.
    pub run_id: Option<String>,
    pub expected: bool,
    /// Skipped results carry no signal and are not counted.
    pub skipped: bool,
}

impl RawResult {
    pub fn expected_in(run_id: impl Into<String>) -> Self {
        Self {
            run_id: Some(run_id.into()),
            expected: true,
            skipped: false,
        }
    }

    pub fn unexpected_in(run_id: impl Into<String>) -> Self {
        Self {
            run_id: Some(run_id.into()),
            expected: false,
            skipped: false,
        }
    }

    /// Build a result from its resource name, see [`run_id_from_result_name`].
    pub fn from_result_name(name: &str, expected: bool, skipped: bool) -> Self {
        Self {
            run_id: run_id_from_result_name(name).map(str::to_owned),
            expected,
            skipped,
        }
    }
}

/// All results of one test variant at one commit position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVerdict {
    pub commit_position: CommitPosition,
    /// Partition time, Unix seconds.
    pub partition_time: i64,
    pub is_exonerated: bool,
    pub results: Vec<RawResult>,
}

/// Extract the run identity from a result name of the form
/// `invocations/{run_id}/tests/{test_id}/results/{result_id}`.
pub fn run_id_from_result_name(name: &str) -> Option<&str> {
    let rest = name.strip_prefix("invocations/")?;
    let (run_id, tail) = rest.split_once('/')?;
    if run_id.is_empty() || !tail.starts_with("tests/") {
        return None;
    }
    Some(run_id)
}

#[derive(Default)]
struct RunTally<'a> {
    run_id: Option<&'a str>,
    expected: u32,
    unexpected: u32,
}

/// Classify `raw` and build the verdict stored in the input buffer.
///
/// Runs whose identity is in `duplicate_runs` are flagged duplicate and
/// ordered after the non-duplicate runs; each group keeps first-seen order.
pub fn to_position_verdict(
    raw: &RawVerdict,
    duplicate_runs: &HashSet<String>,
) -> Result<PositionVerdict> {
    let mut tallies: Vec<RunTally<'_>> = Vec::new();
    for result in raw.results.iter().filter(|r| !r.skipped) {
        let run_id = result.run_id.as_deref();
        let at = match tallies.iter().position(|t| t.run_id == run_id) {
            Some(at) => at,
            None => {
                tallies.push(RunTally {
                    run_id,
                    ..RunTally::default()
                });
                tallies.len() - 1
            }
        };
        let tally = &mut tallies[at];
        if result.expected {
            tally.expected = tally.expected.saturating_add(1);
        } else {
            tally.unexpected = tally.unexpected.saturating_add(1);
        }
    }

    if tallies.is_empty() {
        error!(
            commit_position = raw.commit_position.get(),
            results = raw.results.len(),
            "verdict has no unskipped results"
        );
        return Err(FlakeError::contract(format!(
            "verdict at {} has no unskipped results",
            raw.commit_position
        )));
    }

    let is_duplicate =
        |t: &RunTally<'_>| t.run_id.is_some_and(|id| duplicate_runs.contains(id));
    let (unique, duplicates): (Vec<_>, Vec<_>) =
        tallies.iter().partition(|t| !is_duplicate(*t));
    let runs: Vec<Run> = unique
        .into_iter()
        .map(|t| Run::new(t.expected, t.unexpected, false))
        .chain(
            duplicates
                .into_iter()
                .map(|t| Run::new(t.expected, t.unexpected, true)),
        )
        .collect();

    let hour = Hour::from_unix_seconds(raw.partition_time);
    let is_simple = !raw.is_exonerated
        && matches!(runs.as_slice(), [only] if *only == Run::new(1, 0, false));
    if is_simple {
        return Ok(PositionVerdict::simple_expected(raw.commit_position, hour));
    }
    Ok(PositionVerdict::with_details(
        raw.commit_position,
        hour,
        VerdictDetails {
            is_exonerated: raw.is_exonerated,
            runs,
        },
    ))
}
