//! Segments evicted from the input buffer, merged into a durable output.
//!
//! The analyzer hands over segments oldest first. All but the newest are
//! FINALIZED; the newest may still be FINALIZING. The first evicted segment
//! is a continuation of the existing FINALIZING segment (if any) and is
//! combined with it rather than appended.

use flakeseg_error::{FlakeError, Result};
use flakeseg_types::Segment;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputBuffer {
    finalizing_segment: Option<Segment>,
    /// Oldest first.
    finalized_segments: Vec<Segment>,
    #[serde(skip)]
    is_finalizing_segment_dirty: bool,
    #[serde(skip)]
    is_finalized_segments_dirty: bool,
}

impl OutputBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            finalizing_segment: None,
            finalized_segments: Vec::new(),
            is_finalizing_segment_dirty: false,
            is_finalized_segments_dirty: false,
        }
    }

    /// Rebuild from persisted state. The result is clean.
    pub fn from_parts(
        finalizing_segment: Option<Segment>,
        finalized_segments: Vec<Segment>,
    ) -> Result<Self> {
        if let Some(segment) = finalizing_segment.as_ref().filter(|s| !s.is_finalizing()) {
            return Err(FlakeError::corrupt(format!(
                "stored finalizing segment starting at {} is {}",
                segment.start_position, segment.state
            )));
        }
        if let Some(segment) = finalized_segments.iter().find(|s| !s.is_finalized()) {
            return Err(FlakeError::corrupt(format!(
                "stored finalized segment starting at {} is {}",
                segment.start_position, segment.state
            )));
        }
        Ok(Self {
            finalizing_segment,
            finalized_segments,
            is_finalizing_segment_dirty: false,
            is_finalized_segments_dirty: false,
        })
    }

    #[inline]
    pub const fn finalizing_segment(&self) -> Option<&Segment> {
        self.finalizing_segment.as_ref()
    }

    #[inline]
    pub fn finalized_segments(&self) -> &[Segment] {
        &self.finalized_segments
    }

    #[inline]
    pub const fn is_finalizing_segment_dirty(&self) -> bool {
        self.is_finalizing_segment_dirty
    }

    #[inline]
    pub const fn is_finalized_segments_dirty(&self) -> bool {
        self.is_finalized_segments_dirty
    }

    /// Forget pending changes once they are durable.
    pub fn mark_persisted(&mut self) {
        self.is_finalizing_segment_dirty = false;
        self.is_finalized_segments_dirty = false;
    }

    /// Merge a batch of evicted segments, oldest first.
    ///
    /// The batch is checked before anything changes: on error the buffer is
    /// left exactly as it was.
    pub fn merge_evicted(&mut self, evicted: Vec<Segment>) -> Result<()> {
        self.check_evicted(&evicted)?;

        let mut evicted = evicted.into_iter();
        let appended_before = self.finalized_segments.len();
        if let Some(existing) = self.finalizing_segment.take() {
            // Non-empty by check_evicted.
            let Some(first) = evicted.next() else {
                return Err(FlakeError::internal("validated eviction batch is empty"));
            };
            let combined = combine(existing, &first);
            debug!(
                start_position = combined.start_position.get(),
                end_position = combined.end_position.get(),
                state = %combined.state,
                "combined finalizing segment with first evicted segment"
            );
            if combined.is_finalized() {
                self.finalized_segments.push(combined);
            } else {
                self.finalizing_segment = Some(combined);
            }
        }
        self.absorb(evicted);

        self.is_finalizing_segment_dirty = true;
        if self.finalized_segments.len() > appended_before {
            self.is_finalized_segments_dirty = true;
        }
        debug!(
            finalized_len = self.finalized_segments.len(),
            has_finalizing = self.finalizing_segment.is_some(),
            "merged evicted segments"
        );
        Ok(())
    }

    /// Append all but the last segment as finalized; the last one becomes
    /// the finalizing segment if it is still open.
    fn absorb(&mut self, segments: impl Iterator<Item = Segment>) {
        for segment in segments {
            if segment.is_finalizing() {
                self.finalizing_segment = Some(segment);
            } else {
                self.finalized_segments.push(segment);
            }
        }
    }

    pub(crate) fn check_evicted(&self, evicted: &[Segment]) -> Result<()> {
        let Some((last, init)) = evicted.split_last() else {
            error!("empty evicted segment batch");
            return Err(FlakeError::contract("evicted segment batch is empty"));
        };
        if let Some(i) = init.iter().position(|s| !s.is_finalized()) {
            error!(
                index = i,
                len = evicted.len(),
                "finalizing segment before end of evicted batch"
            );
            return Err(FlakeError::contract(format!(
                "evicted segment {i} of {} is {}; only the last may be FINALIZING",
                evicted.len(),
                init[i].state
            )));
        }
        if self.finalizing_segment.is_some() && !last.is_finalizing() {
            error!(
                len = evicted.len(),
                "evicted batch has no finalizing tail while a finalizing segment exists"
            );
            return Err(FlakeError::contract(
                "a finalizing segment exists but the evicted batch does not end with one",
            ));
        }
        Ok(())
    }
}

/// Extend `existing` with `next`, the segment that continues it.
///
/// Start fields come from `existing`, end fields and state from `next`.
#[must_use]
pub fn combine(existing: Segment, next: &Segment) -> Segment {
    Segment {
        state: next.state,
        end_position: next.end_position,
        end_hour: next.end_hour,
        finalized_counts: existing.finalized_counts + next.finalized_counts,
        most_recent_unexpected_result_hour: existing
            .most_recent_unexpected_result_hour
            .max(next.most_recent_unexpected_result_hour),
        ..existing
    }
}
