use chrono::NaiveDate;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::trace;

use crate::ledger::StudentLedger;
use crate::snapshot::SnapshotId;
use crate::types::AdmNo;

/// caller-owned memo of values derived from one snapshot
///
/// Entries are only valid for the snapshot they were computed from. Asking
/// with a different snapshot id drops everything first.
#[derive(Debug)]
pub struct MemoCache<K, V> {
    snapshot_id: Option<SnapshotId>,
    entries: HashMap<K, V>,
    hits: u64,
    misses: u64,
}

/// cache hit/miss counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// per-student ledgers of the current snapshot, one per reconciliation day
pub type LedgerCache = MemoCache<(AdmNo, NaiveDate), StudentLedger>;

impl<K, V> Default for MemoCache<K, V> {
    fn default() -> Self {
        Self {
            snapshot_id: None,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<K: Eq + Hash, V> MemoCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn rebind(&mut self, snapshot_id: SnapshotId) {
        if self.snapshot_id != Some(snapshot_id) {
            if !self.entries.is_empty() {
                trace!(
                    entries = self.entries.len(),
                    %snapshot_id,
                    "snapshot changed, dropping memo"
                );
            }
            self.entries.clear();
            self.snapshot_id = Some(snapshot_id);
        }
    }

    pub fn get_or_insert_with<F>(&mut self, snapshot_id: SnapshotId, key: K, compute: F) -> &V
    where
        F: FnOnce() -> V,
    {
        self.rebind(snapshot_id);
        match self.entries.entry(key) {
            Entry::Occupied(e) => {
                self.hits += 1;
                e.into_mut()
            }
            Entry::Vacant(e) => {
                self.misses += 1;
                e.insert(compute())
            }
        }
    }

    /// cached value, `None` if missing or computed from another snapshot
    pub fn get(&self, snapshot_id: SnapshotId, key: &K) -> Option<&V> {
        if self.snapshot_id != Some(snapshot_id) {
            return None;
        }
        self.entries.get(key)
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.snapshot_id = None;
    }

    pub fn invalidate_key(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn snapshot_id(&self) -> Option<SnapshotId> {
        self.snapshot_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}
