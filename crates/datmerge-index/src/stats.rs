//! Running statistics over the entries held by an index.

use datmerge_core::{DigestType, Entry, ItemKind, ItemStatus};
use serde::{Deserialize, Serialize};
use strum::EnumCount;

/// Counts by item kind, digest presence, and status.
///
/// Every entry contributes exactly once; [`ItemStatistics::remove_entry`]
/// reverses [`ItemStatistics::add_entry`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatistics {
    kinds: [u64; ItemKind::COUNT],
    digests: [u64; DigestType::COUNT],
    statuses: [u64; ItemStatus::COUNT],
    /// Sum of known sizes.
    pub total_size: u64,
    /// Entries currently flagged for removal.
    pub marked: u64,
}

impl ItemStatistics {
    /// Create empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute statistics for a slice of entries.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
        let mut stats = Self::new();
        for entry in entries {
            stats.add_entry(entry);
        }
        stats
    }

    /// Record one entry.
    pub fn add_entry(&mut self, entry: &Entry) {
        self.kinds[entry.kind as usize] += 1;
        self.statuses[entry.status as usize] += 1;
        for (digest, _) in entry.digests.iter() {
            self.digests[digest as usize] += 1;
        }
        self.total_size = self.total_size.saturating_add(entry.size.unwrap_or(0));
        self.marked += u64::from(entry.marked_for_removal);
    }

    /// Reverse the contribution of one entry.
    pub fn remove_entry(&mut self, entry: &Entry) {
        let kind = &mut self.kinds[entry.kind as usize];
        *kind = kind.saturating_sub(1);
        let status = &mut self.statuses[entry.status as usize];
        *status = status.saturating_sub(1);
        for (digest, _) in entry.digests.iter() {
            let count = &mut self.digests[digest as usize];
            *count = count.saturating_sub(1);
        }
        self.total_size = self.total_size.saturating_sub(entry.size.unwrap_or(0));
        self.marked = self
            .marked
            .saturating_sub(u64::from(entry.marked_for_removal));
    }

    /// Add another aggregate into this one.
    pub fn add(&mut self, other: &Self) {
        for (mine, theirs) in self.kinds.iter_mut().zip(other.kinds) {
            *mine = mine.saturating_add(theirs);
        }
        for (mine, theirs) in self.digests.iter_mut().zip(other.digests) {
            *mine = mine.saturating_add(theirs);
        }
        for (mine, theirs) in self.statuses.iter_mut().zip(other.statuses) {
            *mine = mine.saturating_add(theirs);
        }
        self.total_size = self.total_size.saturating_add(other.total_size);
        self.marked = self.marked.saturating_add(other.marked);
    }

    /// Subtract another aggregate from this one.
    pub fn subtract(&mut self, other: &Self) {
        for (mine, theirs) in self.kinds.iter_mut().zip(other.kinds) {
            *mine = mine.saturating_sub(theirs);
        }
        for (mine, theirs) in self.digests.iter_mut().zip(other.digests) {
            *mine = mine.saturating_sub(theirs);
        }
        for (mine, theirs) in self.statuses.iter_mut().zip(other.statuses) {
            *mine = mine.saturating_sub(theirs);
        }
        self.total_size = self.total_size.saturating_sub(other.total_size);
        self.marked = self.marked.saturating_sub(other.marked);
    }

    pub fn kind_count(&self, kind: ItemKind) -> u64 {
        self.kinds[kind as usize]
    }

    pub fn digest_count(&self, digest: DigestType) -> u64 {
        self.digests[digest as usize]
    }

    pub fn status_count(&self, status: ItemStatus) -> u64 {
        self.statuses[status as usize]
    }

    /// Total number of entries of any kind.
    pub fn total_entries(&self) -> u64 {
        self.kinds.iter().sum()
    }

    /// Content entries eligible for deduplication: content files, disks, and
    /// media, minus nodumps.
    pub fn participating(&self) -> u64 {
        let content = self.kind_count(ItemKind::Rom)
            + self.kind_count(ItemKind::Disk)
            + self.kind_count(ItemKind::Media);
        content.saturating_sub(self.status_count(ItemStatus::NoDump))
    }

    /// Strongest digest every participating entry carries, or CRC32.
    pub fn best_available(&self) -> DigestType {
        let participating = self.participating();
        if participating == 0 {
            return DigestType::Crc32;
        }
        DigestType::STRONGEST_FIRST
            .into_iter()
            .find(|digest| self.digest_count(*digest) == participating)
            .unwrap_or(DigestType::Crc32)
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.total_entries() == 0
    }
}
