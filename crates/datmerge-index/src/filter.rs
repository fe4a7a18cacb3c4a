//! Entry filtering hook.

use datmerge_core::{Entry, IndexError};
use tracing::info;

use crate::index::BucketedIndex;

/// Predicate deciding whether an entry stays in the index.
///
/// The rule language behind it belongs to the caller; the index only asks
/// yes or no.
pub trait EntryFilter: Sync {
    fn passes(&self, entry: &Entry) -> bool;
}

impl<F> EntryFilter for F
where
    F: Fn(&Entry) -> bool + Sync,
{
    fn passes(&self, entry: &Entry) -> bool {
        self(entry)
    }
}

impl BucketedIndex {
    /// Drop every entry the filter rejects. Returns the number removed.
    pub fn execute_filters(&self, filter: &dyn EntryFilter) -> Result<usize, IndexError> {
        let _enter = self.context.span().enter();
        let removed = self.retain_entries(|entry| filter.passes(entry))?;
        info!(removed, "filtered entries");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datmerge_core::{DigestType, ItemKind, Machine};

    use super::*;

    struct DropKind(ItemKind);

    impl EntryFilter for DropKind {
        fn passes(&self, entry: &Entry) -> bool {
            entry.kind != self.0
        }
    }

    fn index() -> BucketedIndex {
        let index = BucketedIndex::new();
        let machine = Arc::new(Machine::new("m"));
        index.insert(
            "m",
            Entry::rom("a.bin")
                .with_digest(DigestType::Crc32, "00000001")
                .with_machine(Arc::clone(&machine)),
        );
        index.insert(
            "m",
            Entry::disk("b")
                .with_digest(DigestType::Sha1, "aa")
                .with_machine(machine),
        );
        index
    }

    #[test]
    fn test_trait_filter() {
        let index = index();
        assert_eq!(index.execute_filters(&DropKind(ItemKind::Disk)).unwrap(), 1);
        assert_eq!(index.statistics().kind_count(ItemKind::Disk), 0);
        assert_eq!(index.entry_count(), 1);
    }

    #[test]
    fn test_closure_filter() {
        let index = index();
        let removed = index
            .execute_filters(&|entry: &Entry| entry.name_str().ends_with(".bin"))
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(index.visible_entries("m")[0].name_str(), "a.bin");
    }
}
