//! Verdict buffering and segment-merge engine for CI test flakiness and
//! changepoint analysis.
//!
//! Each test variant on each source branch gets a [`BranchRecord`]. New
//! verdicts go into its two-tier input buffer; a changepoint analyzer
//! periodically summarizes the oldest verdicts into segments, which are
//! merged into the record's output buffer. Records are persisted through a
//! [`BranchStore`], writing only what changed.
//!
//! ```
//! use std::collections::HashSet;
//!
//! use flakeseg::{
//!     BranchKey, BranchRecord, BufferConfig, CommitPosition, RawResult, RawVerdict,
//!     to_position_verdict,
//! };
//!
//! let config = BufferConfig::new(10, 100);
//! let mut record = BranchRecord::new(
//!     BranchKey::new("chromium", "ninja://foo/bar", "0123456789abcdef", *b"main"),
//!     None,
//!     None,
//!     &config,
//! );
//! let raw = RawVerdict {
//!     commit_position: CommitPosition::new(1200),
//!     partition_time: 1_700_000_000,
//!     is_exonerated: false,
//!     results: vec![RawResult::expected_in("build-1")],
//! };
//! let verdict = to_position_verdict(&raw, &HashSet::new()).unwrap();
//! assert!(verdict.is_simple_expected());
//! record.insert_verdict(verdict);
//! assert_eq!(record.view().hot_buffer.length, 1);
//! ```

pub mod logging;

pub use flakeseg_buffer::{
    Buffer, BufferConfig, HISTORY_FORMAT_VERSION, History, decode_history, encode_history,
};
pub use flakeseg_core::{
    BranchMutation, BranchRecord, BranchStore, BranchView, Eviction, EvictionAnalyzer,
    InputBufferView, MemoryBranchStore, OutputBuffer, PositionVerdictView, RawResult, RawVerdict,
    RunView, StoredBranch, get_branch_view, run_id_from_result_name, to_position_verdict,
};
pub use flakeseg_error::{ErrorClass, FlakeError, Result};
pub use flakeseg_types::{
    BranchKey, CommitPosition, Counts, GitilesRef, Hour, PositionVerdict, Run, Segment,
    SegmentState, SourceRef, Variant, VerdictDetails,
};
pub use logging::{LogFormat, init_logging};
