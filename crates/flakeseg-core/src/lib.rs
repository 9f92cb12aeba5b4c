//! Branch-level engine: verdict construction, eviction merge into the
//! output buffer, persistence mapping and the read projection.

pub mod analyzer;
pub mod branch;
pub mod output_buffer;
pub mod store;
pub mod verdict;
pub mod view;

pub use analyzer::{Eviction, EvictionAnalyzer};
pub use branch::BranchRecord;
pub use output_buffer::{OutputBuffer, combine};
pub use store::{BranchMutation, BranchStore, MemoryBranchStore, StoredBranch, get_branch_view};
pub use verdict::{RawResult, RawVerdict, run_id_from_result_name, to_position_verdict};
pub use view::{BranchView, InputBufferView, PositionVerdictView, RunView};
