//! Bounded, ordered input buffer of recent verdicts for one test branch.
//!
//! The buffer has two tiers. The hot tier takes every new verdict and is
//! merged into the cold tier whenever it fills up. The cold tier is the
//! window the changepoint analyzer reads, and it is the part that gets
//! persisted with [`codec::encode_history`].

pub mod buffer;
pub mod codec;
pub mod config;
pub mod history;

pub use buffer::Buffer;
pub use codec::{HISTORY_FORMAT_VERSION, decode_history, encode_history};
pub use config::BufferConfig;
pub use history::{History, MergeSorted};
