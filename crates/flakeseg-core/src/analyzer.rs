//! Seam between the input buffer and the changepoint analyzer.

use flakeseg_buffer::Buffer;
use flakeseg_types::Segment;

/// What the analyzer wants removed from the cold tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Eviction {
    /// Number of oldest cold verdicts summarized by `segments`.
    pub evicted_verdicts: usize,
    /// Segments covering the evicted verdicts, oldest first.
    pub segments: Vec<Segment>,
}

/// Decides, from a read-only view of the buffer, whether and what to evict.
pub trait EvictionAnalyzer {
    fn analyze(&self, buffer: &Buffer) -> Option<Eviction>;
}

impl<F> EvictionAnalyzer for F
where
    F: Fn(&Buffer) -> Option<Eviction>,
{
    fn analyze(&self, buffer: &Buffer) -> Option<Eviction> {
        self(buffer)
    }
}
