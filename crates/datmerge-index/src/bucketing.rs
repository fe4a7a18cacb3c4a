//! Bucketing transitions: re-keying, deduplication, and sorting passes.
//!
//! A transition runs in two phases separated by a hard barrier:
//!
//! 1. Re-key every bucket under the requested strategy (skipped when the
//!    strategy is unchanged or `None`).
//! 2. Deduplicate when the requested scope differs from the current one,
//!    otherwise sort each bucket.
//!
//! Deduplication relies on entries sharing a bucket already sharing the
//! active identity key, so phase 2 never starts before phase 1 completes.

use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

use datmerge_core::{Entry, IndexError};
use itertools::{Either, Itertools};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dedupe::{classify, merge_bucket};
use crate::index::BucketedIndex;
use crate::key::{BucketStrategy, DedupeScope, key_for};
use crate::sort::sort_entries;
use crate::stats::ItemStatistics;

/// What a bucketing transition did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketReport {
    /// Entries moved to a different bucket.
    pub moved: usize,
    /// Buckets dropped because re-keying left them empty.
    pub dropped: usize,
    /// Entries folded into a retained duplicate and discarded.
    pub merged: usize,
}

impl BucketedIndex {
    /// Transition using the key options from the index config.
    pub fn bucket(
        &mut self,
        strategy: BucketStrategy,
        scope: DedupeScope,
    ) -> Result<BucketReport, IndexError> {
        let config = self.context.config();
        let (lowercase, rename_aware) = (config.lowercase_keys, config.rename_aware);
        self.bucket_by(strategy, scope, lowercase, rename_aware)
    }

    /// Re-key under `strategy`, then deduplicate at `scope` or sort.
    ///
    /// A `None` strategy keeps the current keys. A `None` scope never undoes
    /// an earlier merge; it only sorts.
    pub fn bucket_by(
        &mut self,
        strategy: BucketStrategy,
        scope: DedupeScope,
        lowercase: bool,
        rename_aware: bool,
    ) -> Result<BucketReport, IndexError> {
        let span = self.context.span().clone();
        let _enter = span.enter();
        let mut report = BucketReport::default();

        if strategy != BucketStrategy::None && strategy != self.bucketed_by {
            report.moved = self.rekey(strategy, lowercase, rename_aware)?;
            report.dropped = self.drop_empty_buckets();
            self.bucketed_by = strategy;
            info!(
                %strategy,
                moved = report.moved,
                dropped = report.dropped,
                buckets = self.len(),
                "re-keyed index"
            );
        }

        if scope != DedupeScope::None && scope != self.merged_by {
            report.merged = self.deduplicate(scope, rename_aware)?;
            self.merged_by = scope;
            info!(%scope, merged = report.merged, "deduplicated index");
        } else {
            self.sort(rename_aware)?;
        }

        Ok(report)
    }

    /// Move every entry whose key changed under `strategy`.
    fn rekey(
        &self,
        strategy: BucketStrategy,
        lowercase: bool,
        rename_aware: bool,
    ) -> Result<usize, IndexError> {
        let moved = AtomicUsize::new(0);

        self.context.for_each_key(&self.keys(), |key| {
            // Collect outgoing entries under the bucket guard, then release it
            // before touching any other bucket.
            let outgoing: Vec<(String, Entry)> = {
                let Some(mut bucket) = self.buckets.get_mut(key) else {
                    return;
                };
                let (stay, outgoing): (Vec<Entry>, Vec<(String, Entry)>) = mem::take(&mut *bucket)
                    .into_iter()
                    .partition_map(|entry| {
                        let new_key = key_for(&entry, strategy, lowercase, rename_aware);
                        if new_key == key {
                            Either::Left(entry)
                        } else {
                            Either::Right((new_key, entry))
                        }
                    });
                *bucket = stay;
                if !outgoing.is_empty() {
                    self.stats_mut()
                        .subtract(&ItemStatistics::from_entries(outgoing.iter().map(|(_, e)| e)));
                }
                outgoing
            };

            moved.fetch_add(outgoing.len(), Ordering::Relaxed);
            for (new_key, entry) in outgoing {
                self.push(new_key, entry);
            }
        })?;

        Ok(moved.into_inner())
    }

    fn drop_empty_buckets(&self) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, entries| !entries.is_empty());
        before.saturating_sub(self.buckets.len())
    }

    /// Merge duplicates inside every bucket. Returns the number of entries
    /// merged away.
    ///
    /// Buckets are put into sorted order before merging so that "first seen"
    /// does not depend on which worker moved an entry in first.
    fn deduplicate(&self, scope: DedupeScope, rename_aware: bool) -> Result<usize, IndexError> {
        let merged = AtomicUsize::new(0);

        self.context.for_each_key(&self.keys(), |key| {
            let Some(mut bucket) = self.buckets.get_mut(key) else {
                return;
            };
            let mut entries = mem::take(&mut *bucket);
            let before = ItemStatistics::from_entries(&entries);
            sort_entries(&mut entries, rename_aware);

            let outcome = merge_bucket(entries, scope, rename_aware);
            let mut survivors = outcome.entries;
            sort_entries(&mut survivors, rename_aware);

            if outcome.merged > 0 {
                let after = ItemStatistics::from_entries(&survivors);
                let mut stats = self.stats_mut();
                stats.subtract(&before);
                stats.add(&after);
                merged.fetch_add(outcome.merged, Ordering::Relaxed);
            }
            *bucket = survivors;
        })?;

        Ok(merged.into_inner())
    }

    /// Sort every bucket in place without changing membership.
    pub fn sort(&self, rename_aware: bool) -> Result<(), IndexError> {
        self.context.for_each_key(&self.keys(), |key| {
            if let Some(mut bucket) = self.buckets.get_mut(key) {
                sort_entries(&mut bucket, rename_aware);
            }
        })
    }

    /// Entries that classify as duplicates of `entry`, left in place.
    ///
    /// When the index is not keyed by a digest it is first re-keyed by CRC32
    /// without merging.
    pub fn duplicates_of(&mut self, entry: &Entry, sorted: bool) -> Result<Vec<Entry>, IndexError> {
        if self.bucketed_by.digest().is_none() {
            self.bucket(BucketStrategy::Crc32, DedupeScope::None)?;
        }

        let config = self.context.config();
        let key = key_for(
            entry,
            self.bucketed_by,
            config.lowercase_keys,
            config.rename_aware,
        );
        let rename_aware = config.rename_aware;

        let mut found: Vec<Entry> = self
            .entries(&key)
            .unwrap_or_default()
            .into_iter()
            .filter(|candidate| !classify(candidate, entry).is_empty())
            .collect();

        if sorted {
            sort_entries(&mut found, rename_aware);
        }
        Ok(found)
    }

    /// Check whether any stored entry is a duplicate of `entry`.
    pub fn has_duplicates(&mut self, entry: &Entry) -> Result<bool, IndexError> {
        Ok(!self.duplicates_of(entry, false)?.is_empty())
    }
}
