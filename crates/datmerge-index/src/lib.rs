//! Bucketing and deduplication engine for datmerge.
//!
//! This crate reconciles catalog entries from many overlapping sources:
//!
//! - **Identity keys** - Group entries by a digest or by machine name
//! - **Bucketed index** - Concurrent key to entry-list map with running statistics
//! - **Deduplication** - Classify duplicates and merge partial digest knowledge
//! - **Sorting** - Deterministic natural ordering for reproducible output
//!
//! # Bucketing
//!
//! Producers insert entries under any key, then the index is re-keyed and
//! merged in one transition. Buckets are processed in parallel; each worker
//! touches exactly one bucket at a time.
//!
//! ```rust,ignore
//! use datmerge_index::{BucketedIndex, DedupeScope};
//!
//! let mut index = BucketedIndex::new();
//! for entry in entries {
//!     index.insert_entry(entry);
//! }
//!
//! let strategy = index.best_available();
//! let report = index.bucket(strategy, DedupeScope::Full)?;
//! println!("merged {} duplicates", report.merged);
//!
//! for key in index.sorted_keys() {
//!     for entry in index.visible_entries(&key) {
//!         println!("{}: {}", entry.machine_name(), entry.name_str());
//!     }
//! }
//! ```
//!
//! # Cancellation
//!
//! Every parallel pass checks the context's cancellation token before each
//! bucket and returns [`IndexError::Cancelled`] once it fires.

mod bucketing;
mod context;
mod dedupe;
mod filter;
mod index;
mod key;
mod sort;
mod stats;

pub use bucketing::BucketReport;
pub use context::IndexContext;
pub use dedupe::{MergeOutcome, classify, is_duplicate, merge_bucket, merge_entries, merge_into};
pub use filter::EntryFilter;
pub use index::BucketedIndex;
pub use key::{BucketStrategy, DedupeScope, key_for, machine_key};
pub use sort::{compare_entries, natural_cmp, path_cmp, sort_entries};
pub use stats::ItemStatistics;

// Re-export core types
pub use datmerge_core::{
    DigestType, Digests, DupeType, Entry, IndexConfig, IndexError, ItemKind, ItemStatus, Machine,
};
