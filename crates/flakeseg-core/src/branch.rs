//! Per-branch record: identity, input buffer and output buffer.

use flakeseg_buffer::{Buffer, BufferConfig, decode_history, encode_history};
use flakeseg_error::{FlakeError, Result};
use flakeseg_types::{BranchKey, PositionVerdict, Segment, SourceRef, Variant};
use tracing::{debug, error};

use crate::analyzer::EvictionAnalyzer;
use crate::output_buffer::OutputBuffer;
use crate::store::{BranchMutation, StoredBranch};
use crate::view::BranchView;

/// All state kept for one (project, test, variant, source branch).
///
/// A record has a single writer at a time; the store serializes updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRecord {
    /// Not yet persisted. Identity metadata is only written on insert.
    is_new: bool,
    key: BranchKey,
    variant: Option<Variant>,
    source_ref: Option<SourceRef>,
    input_buffer: Buffer,
    output: OutputBuffer,
}

impl BranchRecord {
    #[must_use]
    pub fn new(
        key: BranchKey,
        variant: Option<Variant>,
        source_ref: Option<SourceRef>,
        config: &BufferConfig,
    ) -> Self {
        Self {
            is_new: true,
            key,
            variant,
            source_ref,
            input_buffer: Buffer::new(config),
            output: OutputBuffer::new(),
        }
    }

    #[inline]
    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    #[inline]
    pub const fn key(&self) -> &BranchKey {
        &self.key
    }

    #[inline]
    pub const fn variant(&self) -> Option<&Variant> {
        self.variant.as_ref()
    }

    #[inline]
    pub const fn source_ref(&self) -> Option<&SourceRef> {
        self.source_ref.as_ref()
    }

    #[inline]
    pub const fn input_buffer(&self) -> &Buffer {
        &self.input_buffer
    }

    #[inline]
    pub const fn output(&self) -> &OutputBuffer {
        &self.output
    }

    /// Add a verdict to the input buffer. Returns whether it compacted.
    pub fn insert_verdict(&mut self, verdict: PositionVerdict) -> bool {
        self.input_buffer.insert_verdict(verdict)
    }

    /// Merge segments evicted by the analyzer into the output buffer.
    pub fn update_output_buffer(&mut self, evicted: Vec<Segment>) -> Result<()> {
        self.output.merge_evicted(evicted)
    }

    /// Run `analyzer` over the input buffer and apply what it evicts.
    ///
    /// The eviction is checked in full before either buffer changes.
    /// Returns whether any verdicts were evicted.
    pub fn apply_eviction(&mut self, analyzer: &dyn EvictionAnalyzer) -> Result<bool> {
        let Some(eviction) = analyzer.analyze(&self.input_buffer) else {
            return Ok(false);
        };
        let cold_len = self.input_buffer.cold().len();
        if eviction.evicted_verdicts > cold_len {
            error!(
                key = %self.key,
                evicted_verdicts = eviction.evicted_verdicts,
                cold_len,
                "analyzer evicted more verdicts than the cold buffer holds"
            );
            return Err(FlakeError::contract(format!(
                "analyzer evicted {} verdicts from a cold buffer of {cold_len}",
                eviction.evicted_verdicts
            )));
        }
        self.output.check_evicted(&eviction.segments)?;

        self.input_buffer.evict_before(eviction.evicted_verdicts)?;
        self.output.merge_evicted(eviction.segments)?;
        debug!(
            key = %self.key,
            evicted_verdicts = eviction.evicted_verdicts,
            cold_len = self.input_buffer.cold().len(),
            "applied eviction"
        );
        Ok(eviction.evicted_verdicts > 0)
    }

    /// Columns to write for this record. Unchanged columns are left out.
    #[must_use]
    pub fn to_mutation(&self) -> BranchMutation {
        let write_all = self.is_new;
        BranchMutation {
            key: self.key.clone(),
            is_new: self.is_new,
            variant: if write_all { self.variant.clone() } else { None },
            source_ref: if write_all {
                self.source_ref.clone()
            } else {
                None
            },
            hot_buffer: encode_history(self.input_buffer.hot()),
            cold_buffer: (write_all || self.input_buffer.is_cold_buffer_dirty())
                .then(|| encode_history(self.input_buffer.cold())),
            finalizing_segment: (write_all || self.output.is_finalizing_segment_dirty())
                .then(|| self.output.finalizing_segment().cloned()),
            finalized_segments: (write_all || self.output.is_finalized_segments_dirty())
                .then(|| self.output.finalized_segments().to_vec()),
        }
    }

    /// The record as it is once its mutation has been applied.
    pub fn mark_persisted(&mut self) {
        self.is_new = false;
        self.input_buffer.mark_cold_buffer_persisted();
        self.output.mark_persisted();
    }

    /// Rebuild a record from its stored columns. The result is clean and
    /// not new.
    pub fn from_stored(stored: StoredBranch, config: &BufferConfig) -> Result<Self> {
        let hot = decode_history(&stored.hot_buffer)?;
        let cold = decode_history(&stored.cold_buffer)?;
        let output =
            OutputBuffer::from_parts(stored.finalizing_segment, stored.finalized_segments)?;
        Ok(Self {
            is_new: false,
            key: stored.key,
            variant: stored.variant,
            source_ref: stored.source_ref,
            input_buffer: Buffer::from_parts(config, hot, cold),
            output,
        })
    }

    #[must_use]
    pub fn view(&self) -> BranchView {
        BranchView::from(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Eviction;
    use flakeseg_types::{CommitPosition, GitilesRef, Hour, SegmentState};

    fn key() -> BranchKey {
        BranchKey::new("proj_1", "test_id_1", "variant_hash_1", *b"githash1")
    }

    fn source_ref() -> SourceRef {
        SourceRef::Gitiles(GitilesRef {
            host: "host_1".into(),
            project: "proj_1".into(),
            reference: "ref_1".into(),
        })
    }

    fn record(hot: usize, cold: usize) -> BranchRecord {
        BranchRecord::new(
            key(),
            Some(Variant::from_pairs([("key1", "val1"), ("key2", "val2")])),
            Some(source_ref()),
            &BufferConfig::new(hot, cold),
        )
    }

    fn simple(pos: u64) -> PositionVerdict {
        PositionVerdict::simple_expected(CommitPosition::new(pos), Hour::EPOCH)
    }

    fn segment(state: SegmentState, start: u64, end: u64) -> Segment {
        Segment {
            state,
            start_position: CommitPosition::new(start),
            end_position: CommitPosition::new(end),
            ..Segment::default()
        }
    }

    fn stored_from(mutation: BranchMutation) -> StoredBranch {
        StoredBranch {
            key: mutation.key,
            variant: mutation.variant,
            source_ref: mutation.source_ref,
            hot_buffer: mutation.hot_buffer,
            cold_buffer: mutation.cold_buffer.unwrap_or_default(),
            finalizing_segment: mutation.finalizing_segment.flatten(),
            finalized_segments: mutation.finalized_segments.unwrap_or_default(),
        }
    }

    #[test]
    fn new_record_writes_every_column() {
        let mut rec = record(10, 100);
        rec.insert_verdict(simple(15));
        let mutation = rec.to_mutation();
        assert!(mutation.is_new);
        assert!(mutation.variant.is_some());
        assert!(mutation.source_ref.is_some());
        assert!(mutation.cold_buffer.is_some());
        assert_eq!(mutation.finalizing_segment, Some(None));
        assert_eq!(mutation.finalized_segments, Some(Vec::new()));
    }

    #[test]
    fn stored_record_writes_only_dirty_columns() {
        let mut rec = record(10, 100);
        rec.insert_verdict(simple(15));
        rec.mark_persisted();

        rec.insert_verdict(simple(16));
        let mutation = rec.to_mutation();
        assert!(!mutation.is_new);
        assert!(mutation.variant.is_none());
        assert!(mutation.cold_buffer.is_none());
        assert!(mutation.finalizing_segment.is_none());
        assert!(mutation.finalized_segments.is_none());

        rec.update_output_buffer(vec![segment(SegmentState::Finalizing, 1, 10)])
            .unwrap();
        let mutation = rec.to_mutation();
        assert!(mutation.finalizing_segment.is_some());
        assert!(mutation.finalized_segments.is_none());
    }

    #[test]
    fn from_stored_is_clean() {
        let mut rec = record(10, 100);
        rec.insert_verdict(simple(16));
        rec.input_buffer.compact();
        rec.insert_verdict(simple(17));
        rec.update_output_buffer(vec![
            segment(SegmentState::Finalized, 1, 5),
            segment(SegmentState::Finalizing, 6, 10),
        ])
        .unwrap();

        let loaded =
            BranchRecord::from_stored(stored_from(rec.to_mutation()), &BufferConfig::new(10, 100))
                .unwrap();
        assert!(!loaded.is_new());
        assert!(!loaded.input_buffer().is_cold_buffer_dirty());
        assert!(!loaded.output().is_finalizing_segment_dirty());
        assert!(!loaded.output().is_finalized_segments_dirty());

        rec.mark_persisted();
        assert_eq!(loaded, rec);
    }

    #[test]
    fn from_stored_rejects_corrupt_history() {
        let mut stored = stored_from(record(10, 100).to_mutation());
        stored.cold_buffer = vec![1, 2, 3];
        let err = BranchRecord::from_stored(stored, &BufferConfig::default()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn apply_eviction_moves_prefix_into_segments() {
        let mut rec = record(2, 4);
        for pos in 1..=6 {
            rec.insert_verdict(simple(pos));
        }
        assert!(rec.input_buffer().is_cold_buffer_over_capacity());

        let analyzer = |buffer: &Buffer| {
            buffer.is_cold_buffer_over_capacity().then(|| Eviction {
                evicted_verdicts: 4,
                segments: vec![
                    segment(SegmentState::Finalized, 1, 2),
                    segment(SegmentState::Finalizing, 3, 4),
                ],
            })
        };
        assert!(rec.apply_eviction(&analyzer).unwrap());
        assert_eq!(rec.input_buffer().cold().len(), 2);
        assert_eq!(rec.output().finalized_segments().len(), 1);
        assert!(rec.output().finalizing_segment().is_some());
        assert!(rec.input_buffer().is_cold_buffer_dirty());

        // Nothing left to evict.
        assert!(!rec.apply_eviction(&analyzer).unwrap());
    }

    #[test]
    fn apply_eviction_rejects_bad_batch_without_mutation() {
        let mut rec = record(2, 4);
        for pos in 1..=4 {
            rec.insert_verdict(simple(pos));
        }
        rec.update_output_buffer(vec![segment(SegmentState::Finalizing, 0, 0)])
            .unwrap();
        rec.mark_persisted();
        let before = rec.clone();

        let no_tail = |_: &Buffer| {
            Some(Eviction {
                evicted_verdicts: 2,
                segments: vec![segment(SegmentState::Finalized, 1, 2)],
            })
        };
        assert!(rec.apply_eviction(&no_tail).unwrap_err().is_fatal());
        assert_eq!(rec, before);

        let too_many = |_: &Buffer| {
            Some(Eviction {
                evicted_verdicts: 99,
                segments: vec![segment(SegmentState::Finalizing, 1, 2)],
            })
        };
        assert!(rec.apply_eviction(&too_many).is_err());
        assert_eq!(rec, before);
    }

    #[test]
    fn view_hex_encodes_ref_hash() {
        let mut rec = record(10, 100);
        rec.insert_verdict(simple(15));
        let view = rec.view();
        assert_eq!(view.ref_hash, "6769746861736831");
        assert_eq!(view.hot_buffer.length, 1);
        assert_eq!(view.cold_buffer.length, 0);
        assert_eq!(view.source_ref, Some(source_ref()));
    }
}
