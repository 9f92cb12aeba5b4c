//! Two-tier (hot + cold) bounded input buffer.
//!
//! New verdicts land in the small hot tier with an ordered insert. When the
//! hot tier fills up it is merged into the cold tier in one linear pass, so
//! the long cold history is only rewritten once per `hot_capacity` inserts.
//! The buffer never drops data on its own: when the cold tier outgrows its
//! capacity, the changepoint analyzer decides which prefix to evict.

use flakeseg_error::{FlakeError, Result};
use flakeseg_types::PositionVerdict;
use tracing::{debug, error};

use crate::config::BufferConfig;
use crate::history::{History, MergeSorted};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    hot_capacity: usize,
    cold_capacity: usize,
    hot: History,
    cold: History,
    /// Cold tier changed since it was last persisted.
    is_cold_buffer_dirty: bool,
}

impl Buffer {
    /// An empty buffer with the given capacities.
    #[must_use]
    pub const fn new(config: &BufferConfig) -> Self {
        Self {
            hot_capacity: config.hot_capacity,
            cold_capacity: config.cold_capacity,
            hot: History::new(),
            cold: History::new(),
            is_cold_buffer_dirty: false,
        }
    }

    /// Rebuild a buffer from persisted tiers. Persisted state is committed
    /// state, so the cold tier starts clean.
    #[must_use]
    pub const fn from_parts(config: &BufferConfig, hot: History, cold: History) -> Self {
        Self {
            hot_capacity: config.hot_capacity,
            cold_capacity: config.cold_capacity,
            hot,
            cold,
            is_cold_buffer_dirty: false,
        }
    }

    /// Insert a verdict into the hot tier, compacting if the hot tier
    /// reached capacity. Returns whether a compaction ran.
    pub fn insert_verdict(&mut self, verdict: PositionVerdict) -> bool {
        self.hot.insert(verdict);
        if self.hot.len() >= self.hot_capacity {
            self.compact();
            return true;
        }
        false
    }

    /// Merge the hot tier into the cold tier and clear the hot tier.
    ///
    /// Always marks the cold tier dirty, even when the hot tier was empty.
    pub fn compact(&mut self) {
        let hot = std::mem::take(&mut self.hot);
        let cold = std::mem::take(&mut self.cold);
        let (hot_len, cold_len) = (hot.len(), cold.len());
        self.cold = History::merge(cold, hot);
        self.is_cold_buffer_dirty = true;
        debug!(
            hot_len,
            cold_len,
            merged_len = self.cold.len(),
            cold_capacity = self.cold_capacity,
            "compacted hot buffer into cold buffer"
        );
    }

    /// Remove the oldest `count` verdicts of the cold tier, which the
    /// analyzer has folded into segments.
    pub fn evict_before(&mut self, count: usize) -> Result<Vec<PositionVerdict>> {
        if count > self.cold.len() {
            error!(
                count,
                cold_len = self.cold.len(),
                "eviction larger than cold buffer"
            );
            return Err(FlakeError::contract(format!(
                "cannot evict {count} verdicts from a cold buffer of {}",
                self.cold.len()
            )));
        }
        if count == 0 {
            return Ok(Vec::new());
        }
        let evicted = self.cold.evict_prefix(count);
        self.is_cold_buffer_dirty = true;
        debug!(
            evicted = count,
            remaining = self.cold.len(),
            "evicted cold buffer prefix"
        );
        Ok(evicted)
    }

    #[inline]
    pub const fn hot(&self) -> &History {
        &self.hot
    }

    #[inline]
    pub const fn cold(&self) -> &History {
        &self.cold
    }

    #[inline]
    pub const fn hot_capacity(&self) -> usize {
        self.hot_capacity
    }

    #[inline]
    pub const fn cold_capacity(&self) -> usize {
        self.cold_capacity
    }

    #[inline]
    pub const fn is_cold_buffer_dirty(&self) -> bool {
        self.is_cold_buffer_dirty
    }

    /// Forget pending cold tier changes once they are durable.
    pub fn mark_cold_buffer_persisted(&mut self) {
        self.is_cold_buffer_dirty = false;
    }

    /// Whether the cold tier holds more verdicts than its capacity.
    #[inline]
    pub fn is_cold_buffer_over_capacity(&self) -> bool {
        self.cold.len() > self.cold_capacity
    }

    /// Total verdicts across both tiers.
    #[inline]
    pub fn len(&self) -> usize {
        self.hot.len() + self.cold.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hot.is_empty() && self.cold.is_empty()
    }

    /// Both tiers as one ordered stream, without compacting.
    pub fn iter_all(&self) -> MergeSorted<std::slice::Iter<'_, PositionVerdict>> {
        MergeSorted::new(self.cold.iter(), self.hot.iter())
    }
}
