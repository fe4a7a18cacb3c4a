//! Concurrent key to entry-list map with running statistics.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use datmerge_core::{Entry, IndexError};
use tracing::{debug, info};

use crate::context::IndexContext;
use crate::key::{BucketStrategy, DedupeScope, key_for};
use crate::sort::natural_cmp;
use crate::stats::ItemStatistics;

/// Entries grouped into buckets by an identity key.
///
/// Each bucket is guarded by its map shard, and statistics are updated while
/// that guard is held, so the aggregate always matches the stored entries.
/// Lock order is always shard first, then statistics.
#[derive(Debug)]
pub struct BucketedIndex {
    pub(crate) buckets: DashMap<String, Vec<Entry>>,
    statistics: Mutex<ItemStatistics>,
    pub(crate) bucketed_by: BucketStrategy,
    pub(crate) merged_by: DedupeScope,
    pub(crate) context: IndexContext,
}

impl BucketedIndex {
    /// Create an empty index on the global worker pool.
    pub fn new() -> Self {
        Self::with_context(IndexContext::default())
    }

    /// Create an empty index with an explicit execution context.
    pub fn with_context(context: IndexContext) -> Self {
        Self {
            buckets: DashMap::new(),
            statistics: Mutex::new(ItemStatistics::new()),
            bucketed_by: BucketStrategy::None,
            merged_by: DedupeScope::None,
            context,
        }
    }

    pub fn context(&self) -> &IndexContext {
        &self.context
    }

    /// Strategy the current keys were computed with.
    pub fn bucketed_by(&self) -> BucketStrategy {
        self.bucketed_by
    }

    /// Scope of the last deduplication reflected in the contents.
    pub fn merged_by(&self) -> DedupeScope {
        self.merged_by
    }

    pub(crate) fn stats_mut(&self) -> MutexGuard<'_, ItemStatistics> {
        self.statistics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the running statistics.
    pub fn statistics(&self) -> ItemStatistics {
        self.stats_mut().clone()
    }

    /// Strongest bucketing strategy every participating entry supports.
    pub fn best_available(&self) -> BucketStrategy {
        BucketStrategy::from_digest(self.stats_mut().best_available())
    }

    /// Insert one entry under `key`.
    ///
    /// Content entries without any digest are recorded as nodump.
    pub fn insert(&self, key: impl Into<String>, mut entry: Entry) {
        if entry.normalize() {
            debug!(
                name = entry.name_str(),
                machine = entry.machine_name(),
                "entry has no digests, marked nodump"
            );
        }
        self.push(key.into(), entry);
    }

    /// Insert one entry under the key the current strategy assigns it.
    /// Returns that key.
    pub fn insert_entry(&self, entry: Entry) -> String {
        let config = self.context.config();
        let key = key_for(
            &entry,
            self.bucketed_by,
            config.lowercase_keys,
            config.rename_aware,
        );
        self.insert(key.clone(), entry);
        key
    }

    /// Insert several entries under one key. Empty input is a no-op.
    pub fn insert_many(&self, key: impl Into<String>, entries: impl IntoIterator<Item = Entry>) {
        let mut entries: Vec<Entry> = entries.into_iter().collect();
        if entries.is_empty() {
            return;
        }
        for entry in &mut entries {
            if entry.normalize() {
                debug!(name = entry.name_str(), "entry has no digests, marked nodump");
            }
        }

        let mut bucket = self.buckets.entry(key.into()).or_default();
        self.stats_mut().add(&ItemStatistics::from_entries(&entries));
        bucket.extend(entries);
    }

    /// Append an already normalized entry.
    pub(crate) fn push(&self, key: String, entry: Entry) {
        let mut bucket = self.buckets.entry(key).or_default();
        self.stats_mut().add_entry(&entry);
        bucket.push(entry);
    }

    /// Remove a whole bucket. Returns `false` if it did not exist.
    pub fn remove(&self, key: &str) -> bool {
        match self.buckets.entry(key.to_string()) {
            MapEntry::Occupied(occupied) => {
                self.stats_mut()
                    .subtract(&ItemStatistics::from_entries(occupied.get()));
                occupied.remove();
                true
            }
            MapEntry::Vacant(_) => false,
        }
    }

    /// Remove the first entry in `key` equal to `entry`.
    pub fn remove_entry(&self, key: &str, entry: &Entry) -> bool {
        let Some(mut bucket) = self.buckets.get_mut(key) else {
            return false;
        };
        let Some(position) = bucket.iter().position(|e| e == entry) else {
            return false;
        };
        let removed = bucket.remove(position);
        self.stats_mut().remove_entry(&removed);
        true
    }

    /// Empty a bucket but keep its key.
    pub fn reset(&self, key: &str) {
        if let Some(mut bucket) = self.buckets.get_mut(key) {
            self.stats_mut()
                .subtract(&ItemStatistics::from_entries(bucket.iter()));
            bucket.clear();
        }
    }

    /// Check whether a bucket exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.buckets.contains_key(key)
    }

    /// Copy of a bucket's entries, including hidden ones.
    pub fn entries(&self, key: &str) -> Option<Vec<Entry>> {
        self.buckets.get(key).map(|bucket| bucket.value().clone())
    }

    /// Entries a consumer should emit: not marked for removal and still owned
    /// by a machine. Missing buckets yield an empty list.
    pub fn visible_entries(&self, key: &str) -> Vec<Entry> {
        self.buckets
            .get(key)
            .map(|bucket| bucket.iter().filter(|e| e.is_visible()).cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the current keys in arbitrary order.
    pub fn keys(&self) -> Vec<String> {
        self.buckets.iter().map(|bucket| bucket.key().clone()).collect()
    }

    /// Keys in ascending natural order, the order consumers emit buckets in.
    pub fn sorted_keys(&self) -> Vec<String> {
        let mut keys = self.keys();
        keys.sort_by(|a, b| natural_cmp(a, b));
        keys
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of stored entries across all buckets.
    pub fn entry_count(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.len()).sum()
    }

    /// Drop buckets that are empty or hold only placeholders.
    pub fn clear_empty(&self) -> usize {
        let _enter = self.context.span().enter();
        let before = self.buckets.len();
        self.buckets.retain(|_, entries| {
            let keep = entries.iter().any(|e| !e.is_placeholder());
            if !keep {
                self.stats_mut()
                    .subtract(&ItemStatistics::from_entries(entries.iter()));
            }
            keep
        });
        let dropped = before.saturating_sub(self.buckets.len());
        info!(dropped, "cleared empty buckets");
        dropped
    }

    /// Permanently remove every entry marked for removal.
    pub fn clear_marked(&self) -> Result<usize, IndexError> {
        let _enter = self.context.span().enter();
        let removed = self.retain_entries(|entry| !entry.marked_for_removal)?;
        info!(removed, "cleared marked entries");
        Ok(removed)
    }

    /// Keep only entries matching `keep`, bucket by bucket in parallel.
    pub(crate) fn retain_entries<F>(&self, keep: F) -> Result<usize, IndexError>
    where
        F: Fn(&Entry) -> bool + Sync + Send,
    {
        let removed = AtomicUsize::new(0);
        self.context.for_each_key(&self.keys(), |key| {
            let Some(mut bucket) = self.buckets.get_mut(key) else {
                return;
            };
            let mut dropped = ItemStatistics::new();
            bucket.retain(|entry| {
                let kept = keep(entry);
                if !kept {
                    dropped.add_entry(entry);
                }
                kept
            });
            if !dropped.is_empty() {
                removed.fetch_add(dropped.total_entries() as usize, Ordering::Relaxed);
                self.stats_mut().subtract(&dropped);
            }
        })?;
        Ok(removed.into_inner())
    }

    /// Apply an in-place rewrite to every entry, bucket by bucket in parallel.
    pub fn rewrite_entries<F>(&self, rewrite: F) -> Result<(), IndexError>
    where
        F: Fn(&mut Entry) + Sync + Send,
    {
        let _enter = self.context.span().enter();
        self.context.for_each_key(&self.keys(), |key| {
            let Some(mut bucket) = self.buckets.get_mut(key) else {
                return;
            };
            let before = ItemStatistics::from_entries(bucket.iter());
            bucket.iter_mut().for_each(&rewrite);
            let after = ItemStatistics::from_entries(bucket.iter());
            if before != after {
                let mut stats = self.stats_mut();
                stats.subtract(&before);
                stats.add(&after);
            }
        })
    }

    /// Recount statistics from the stored entries.
    ///
    /// Only needed after the buckets were mutated outside this API; callers
    /// should not run it concurrently with inserts.
    pub fn recalculate_statistics(&self) {
        let _enter = self.context.span().enter();
        let fresh = self
            .buckets
            .iter()
            .fold(ItemStatistics::new(), |mut stats, bucket| {
                stats.add(&ItemStatistics::from_entries(bucket.iter()));
                stats
            });
        info!(entries = fresh.total_entries(), "recalculated statistics");
        *self.stats_mut() = fresh;
    }

    /// Drain every entry in sorted key order.
    pub fn into_sorted_entries(self) -> Vec<Entry> {
        let keys = self.sorted_keys();
        let buckets = self.buckets;
        keys.into_iter()
            .filter_map(|key| buckets.remove(&key).map(|(_, entries)| entries))
            .flatten()
            .collect()
    }
}

impl Default for BucketedIndex {
    fn default() -> Self {
        Self::new()
    }
}
