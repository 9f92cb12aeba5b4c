//! Storage adapter for branch records.
//!
//! A [`BranchMutation`] carries only the columns that changed; a
//! [`StoredBranch`] is the full persisted row. [`MemoryBranchStore`] keeps
//! rows in memory and is shared between threads by cloning.

use std::collections::HashMap;
use std::sync::Arc;

use flakeseg_buffer::BufferConfig;
use flakeseg_error::{FlakeError, Result};
use flakeseg_types::{BranchKey, Segment, SourceRef, Variant};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::branch::BranchRecord;
use crate::view::BranchView;

/// Persisted form of a [`BranchRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBranch {
    pub key: BranchKey,
    pub variant: Option<Variant>,
    pub source_ref: Option<SourceRef>,
    /// Encoded with `flakeseg_buffer::encode_history`.
    pub hot_buffer: Vec<u8>,
    pub cold_buffer: Vec<u8>,
    pub finalizing_segment: Option<Segment>,
    pub finalized_segments: Vec<Segment>,
}

/// Column writes for one record. `None` means "leave the column as is".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchMutation {
    pub key: BranchKey,
    /// Insert a new row rather than update an existing one.
    pub is_new: bool,
    pub variant: Option<Variant>,
    pub source_ref: Option<SourceRef>,
    /// Always written.
    pub hot_buffer: Vec<u8>,
    pub cold_buffer: Option<Vec<u8>>,
    /// `Some(None)` clears the finalizing segment.
    pub finalizing_segment: Option<Option<Segment>>,
    pub finalized_segments: Option<Vec<Segment>>,
}

impl BranchMutation {
    /// Number of columns this mutation writes, identity excluded.
    #[must_use]
    pub fn column_count(&self) -> usize {
        1 + usize::from(self.cold_buffer.is_some())
            + usize::from(self.finalizing_segment.is_some())
            + usize::from(self.finalized_segments.is_some())
    }
}

pub trait BranchStore {
    /// Read records by key. The result lines up with `keys`; missing
    /// records are `None`.
    fn read_branches(&self, keys: &[BranchKey]) -> Result<Vec<Option<BranchRecord>>>;

    /// Apply one record mutation atomically.
    fn apply(&self, mutation: BranchMutation) -> Result<()>;
}

/// Projection of one record, or `None` if it has never been written.
pub fn get_branch_view(store: &dyn BranchStore, key: &BranchKey) -> Result<Option<BranchView>> {
    let mut records = store.read_branches(std::slice::from_ref(key))?;
    if records.len() != 1 {
        return Err(FlakeError::internal(format!(
            "expected 1 record for {key}, store returned {}",
            records.len()
        )));
    }
    Ok(records.pop().flatten().map(|record| record.view()))
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryStoreInner {
    rows: HashMap<BranchKey, StoredBranch>,
    offline: bool,
}

impl MemoryStoreInner {
    fn check_online(&self) -> Result<()> {
        if self.offline {
            warn!("memory branch store is offline");
            return Err(FlakeError::store_unavailable("memory branch store is offline"));
        }
        Ok(())
    }

    fn apply(&mut self, mutation: BranchMutation) -> Result<()> {
        self.check_online()?;
        let columns = mutation.column_count();
        if mutation.is_new {
            let row = StoredBranch {
                key: mutation.key.clone(),
                variant: mutation.variant,
                source_ref: mutation.source_ref,
                hot_buffer: mutation.hot_buffer,
                cold_buffer: mutation.cold_buffer.unwrap_or_default(),
                finalizing_segment: mutation.finalizing_segment.flatten(),
                finalized_segments: mutation.finalized_segments.unwrap_or_default(),
            };
            if self.rows.insert(mutation.key.clone(), row).is_some() {
                warn!(key = %mutation.key, "insert replaced an existing branch row");
            }
            info!(key = %mutation.key, columns, "inserted branch row");
            return Ok(());
        }

        let Some(row) = self.rows.get_mut(&mutation.key) else {
            return Err(FlakeError::contract(format!(
                "update of missing branch {}",
                mutation.key
            )));
        };
        row.hot_buffer = mutation.hot_buffer;
        if let Some(cold) = mutation.cold_buffer {
            row.cold_buffer = cold;
        }
        if let Some(finalizing) = mutation.finalizing_segment {
            row.finalizing_segment = finalizing;
        }
        if let Some(finalized) = mutation.finalized_segments {
            row.finalized_segments = finalized;
        }
        info!(key = %mutation.key, columns, "updated branch row");
        Ok(())
    }

    fn read(&self, key: &BranchKey, config: &BufferConfig) -> Result<Option<BranchRecord>> {
        self.rows
            .get(key)
            .cloned()
            .map(|row| BranchRecord::from_stored(row, config))
            .transpose()
    }
}

/// Branch store backed by a shared in-memory map.
///
/// Clones share the same rows. Every call holds the store lock for its full
/// duration, so [`MemoryBranchStore::update_branch`] is a serialized
/// read-modify-write.
#[derive(Debug, Clone)]
pub struct MemoryBranchStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
    config: BufferConfig,
}

impl MemoryBranchStore {
    #[must_use]
    pub fn new(config: BufferConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner::default())),
            config,
        }
    }

    #[inline]
    pub const fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.inner.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().rows.is_empty()
    }

    /// Make every call fail with [`FlakeError::StoreUnavailable`] until
    /// switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Load the record for `key` (or create it with `init`), run `f` on it
    /// and write back what changed, all under the store lock.
    ///
    /// Nothing is written if `f` fails.
    pub fn update_branch<T>(
        &self,
        key: &BranchKey,
        init: impl FnOnce() -> BranchRecord,
        f: impl FnOnce(&mut BranchRecord) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.inner.lock();
        inner.check_online()?;
        let mut record = match inner.read(key, &self.config)? {
            Some(record) => record,
            None => {
                let record = init();
                if record.key() != key {
                    return Err(FlakeError::contract(format!(
                        "initializer for {key} built a record for {}",
                        record.key()
                    )));
                }
                debug!(%key, "creating branch record");
                record
            }
        };
        let out = f(&mut record)?;
        inner.apply(record.to_mutation())?;
        Ok(out)
    }
}

impl BranchStore for MemoryBranchStore {
    fn read_branches(&self, keys: &[BranchKey]) -> Result<Vec<Option<BranchRecord>>> {
        let inner = self.inner.lock();
        inner.check_online()?;
        keys.iter()
            .map(|key| inner.read(key, &self.config))
            .collect()
    }

    fn apply(&self, mutation: BranchMutation) -> Result<()> {
        self.inner.lock().apply(mutation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flakeseg_types::{CommitPosition, GitilesRef, Hour, PositionVerdict, SegmentState};
    use std::thread;

    fn config() -> BufferConfig {
        BufferConfig::new(100, 2000)
    }

    fn key(test: &str) -> BranchKey {
        BranchKey::new("proj_1", test, "variant_hash_1", *b"githash1")
    }

    fn new_record(test: &str) -> BranchRecord {
        BranchRecord::new(
            key(test),
            Some(Variant::from_pairs([("key1", "val1")])),
            Some(SourceRef::Gitiles(GitilesRef {
                host: "host_1".into(),
                project: "proj_1".into(),
                reference: "ref_1".into(),
            })),
            &config(),
        )
    }

    fn simple(pos: u64) -> PositionVerdict {
        PositionVerdict::simple_expected(CommitPosition::new(pos), Hour::EPOCH)
    }

    #[test]
    fn read_missing_returns_none() {
        let store = MemoryBranchStore::new(config());
        let records = store.read_branches(&[key("a"), key("b")]).unwrap();
        assert_eq!(records, vec![None, None]);
        assert!(get_branch_view(&store, &key("a")).unwrap().is_none());
    }

    #[test]
    fn insert_then_update_round_trips() {
        let store = MemoryBranchStore::new(config());
        let mut rec = new_record("a");
        rec.insert_verdict(simple(15));
        store.apply(rec.to_mutation()).unwrap();
        rec.mark_persisted();

        let mut loaded = store.read_branches(&[key("a")]).unwrap().pop().flatten().unwrap();
        assert_eq!(loaded, rec);

        loaded.insert_verdict(simple(16));
        loaded.update_output_buffer(vec![Segment {
            state: SegmentState::Finalizing,
            has_start_changepoint: true,
            start_position: CommitPosition::new(50),
            start_hour: Some(Hour::from_hours(1)),
            ..Segment::default()
        }])
        .unwrap();
        let mutation = loaded.to_mutation();
        assert!(!mutation.is_new);
        assert_eq!(mutation.column_count(), 2);
        store.apply(mutation).unwrap();
        loaded.mark_persisted();

        let reloaded = store.read_branches(&[key("a")]).unwrap().pop().flatten().unwrap();
        assert!(!reloaded.is_new());
        assert_eq!(reloaded, loaded);
        assert_eq!(reloaded.variant(), rec.variant());
    }

    #[test]
    fn update_of_missing_row_is_rejected() {
        let store = MemoryBranchStore::new(config());
        let mut rec = new_record("a");
        rec.mark_persisted();
        assert!(store.apply(rec.to_mutation()).unwrap_err().is_fatal());
        assert!(store.is_empty());
    }

    #[test]
    fn offline_store_is_transient() {
        let store = MemoryBranchStore::new(config());
        store.set_offline(true);
        let err = store.read_branches(&[key("a")]).unwrap_err();
        assert!(err.is_transient());
        let err = store
            .update_branch(&key("a"), || new_record("a"), |_| Ok(()))
            .unwrap_err();
        assert!(err.is_transient());

        store.set_offline(false);
        store
            .update_branch(&key("a"), || new_record("a"), |_| Ok(()))
            .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn failed_update_writes_nothing() {
        let store = MemoryBranchStore::new(config());
        let err = store
            .update_branch(&key("a"), || new_record("a"), |rec| {
                rec.insert_verdict(simple(1));
                rec.update_output_buffer(Vec::new())
            })
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(store.is_empty());
    }

    #[test]
    fn initializer_must_match_key() {
        let store = MemoryBranchStore::new(config());
        let err = store
            .update_branch(&key("a"), || new_record("b"), |_| Ok(()))
            .unwrap_err();
        assert!(err.to_string().contains("initializer"));
    }

    #[test]
    fn concurrent_updates_to_one_key_serialize() {
        let store = MemoryBranchStore::new(BufferConfig::new(7, 2000));
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..25u64 {
                        store
                            .update_branch(&key("shared"), || new_record("shared"), |rec| {
                                rec.insert_verdict(simple(t * 100 + i));
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let rec = store
            .read_branches(&[key("shared")])
            .unwrap()
            .pop()
            .flatten()
            .unwrap();
        assert_eq!(rec.input_buffer().len(), 200);
        assert!(rec.input_buffer().hot().is_sorted());
        assert!(rec.input_buffer().cold().is_sorted());
    }

    #[test]
    fn view_of_stored_record() {
        let store = MemoryBranchStore::new(config());
        store
            .update_branch(&key("a"), || new_record("a"), |rec| {
                rec.insert_verdict(simple(15));
                Ok(())
            })
            .unwrap();
        let view = get_branch_view(&store, &key("a")).unwrap().unwrap();
        assert_eq!(view.test_id, "a");
        assert_eq!(view.ref_hash, "6769746861736831");
        assert_eq!(view.hot_buffer.length, 1);
    }
}
