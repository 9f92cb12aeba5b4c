//! Read-only projection of a branch record for external consumers.

use flakeseg_buffer::History;
use flakeseg_types::{CommitPosition, Hour, PositionVerdict, Segment, SourceRef, Variant};
use serde::{Deserialize, Serialize};

use crate::branch::BranchRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunView {
    pub expected_result_count: u32,
    pub unexpected_result_count: u32,
    pub is_duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionVerdictView {
    pub commit_position: CommitPosition,
    pub hour: Hour,
    pub is_exonerated: bool,
    pub runs: Vec<RunView>,
}

impl From<&PositionVerdict> for PositionVerdictView {
    fn from(verdict: &PositionVerdict) -> Self {
        let (is_exonerated, runs) = match &verdict.details {
            // A simple expected verdict is one run with one expected result.
            None => (
                false,
                vec![RunView {
                    expected_result_count: 1,
                    unexpected_result_count: 0,
                    is_duplicate: false,
                }],
            ),
            Some(details) => (
                details.is_exonerated,
                details
                    .runs
                    .iter()
                    .map(|run| RunView {
                        expected_result_count: run.expected_result_count,
                        unexpected_result_count: run.unexpected_result_count,
                        is_duplicate: run.is_duplicate,
                    })
                    .collect(),
            ),
        };
        Self {
            commit_position: verdict.commit_position,
            hour: verdict.hour,
            is_exonerated,
            runs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBufferView {
    pub length: usize,
    pub verdicts: Vec<PositionVerdictView>,
}

impl From<&History> for InputBufferView {
    fn from(history: &History) -> Self {
        Self {
            length: history.len(),
            verdicts: history.iter().map(PositionVerdictView::from).collect(),
        }
    }
}

/// Everything known about one branch, flattened for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchView {
    pub project: String,
    pub test_id: String,
    pub variant_hash: String,
    /// Lower-case hex.
    pub ref_hash: String,
    pub variant: Option<Variant>,
    pub source_ref: Option<SourceRef>,
    pub finalizing_segment: Option<Segment>,
    pub finalized_segments: Vec<Segment>,
    pub hot_buffer: InputBufferView,
    pub cold_buffer: InputBufferView,
}

impl From<&BranchRecord> for BranchView {
    fn from(record: &BranchRecord) -> Self {
        let key = record.key();
        Self {
            project: key.project.clone(),
            test_id: key.test_id.clone(),
            variant_hash: key.variant_hash.clone(),
            ref_hash: key.ref_hash_hex(),
            variant: record.variant().cloned(),
            source_ref: record.source_ref().cloned(),
            finalizing_segment: record.output().finalizing_segment().cloned(),
            finalized_segments: record.output().finalized_segments().to_vec(),
            hot_buffer: InputBufferView::from(record.input_buffer().hot()),
            cold_buffer: InputBufferView::from(record.input_buffer().cold()),
        }
    }
}
