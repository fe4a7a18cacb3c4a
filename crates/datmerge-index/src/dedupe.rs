//! Duplicate classification and merging within a bucket.
//!
//! Two entries are duplicates when they are the same dedupable kind, neither is
//! a nodump, their sizes agree where both are known (content files only), and
//! every digest known to both sides matches. A digest missing on either side
//! never blocks a match.

use std::collections::HashMap;
use std::sync::Arc;

use datmerge_core::{DupeType, Entry};

use crate::key::{DedupeScope, machine_key};

/// Result of merging one bucket.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Entries that survive, in retained order.
    pub entries: Vec<Entry>,
    /// Number of incoming entries folded into a retained one.
    pub merged: usize,
}

/// Check whether two entries describe the same content.
pub fn is_duplicate(a: &Entry, b: &Entry) -> bool {
    if !a.is_dedupe_candidate() || !b.is_dedupe_candidate() || a.kind != b.kind {
        return false;
    }

    if a.kind.traits().compares_size {
        if let (Some(left), Some(right)) = (a.size, b.size) {
            if left != right {
                return false;
            }
        }
    }

    a.digests.matches(&b.digests)
}

/// Classify `incoming` against an already retained entry.
///
/// Returns an empty set when they are not duplicates.
pub fn classify(incoming: &Entry, retained: &Entry) -> DupeType {
    if !is_duplicate(incoming, retained) {
        return DupeType::empty();
    }

    let external = retained.dupe_type.contains(DupeType::EXTERNAL)
        || incoming.source_priority != retained.source_priority
        || !machines_linked(incoming, retained);

    let exact = incoming.machine_name() == retained.machine_name()
        && incoming.name_str() == retained.name_str();

    let scope = if external {
        DupeType::EXTERNAL
    } else {
        DupeType::INTERNAL
    };
    let detail = if exact { DupeType::ALL } else { DupeType::HASH };
    scope | detail
}

fn machines_linked(a: &Entry, b: &Entry) -> bool {
    match (&a.machine, &b.machine) {
        (Some(x), Some(y)) => Arc::ptr_eq(x, y) || x.is_linked_to(y),
        (None, None) => true,
        _ => false,
    }
}

/// Fold `incoming` into `retained`.
///
/// The retained entry gains digests and size it lacks but never loses a value
/// it already has. A strictly higher-priority incoming entry (lower number)
/// hands over its priority, machine, and name. At equal priority, a retained
/// entry whose machine is a clone or rom-of child of the incoming machine
/// adopts the parent's machine and name.
pub fn merge_into(retained: &mut Entry, incoming: Entry, dupe: DupeType) {
    retained.digests.fill_missing(&incoming.digests);
    if retained.size.is_none() {
        retained.size = incoming.size;
    }
    retained.dupe_type = dupe;

    if incoming.source_priority < retained.source_priority {
        retained.source_priority = incoming.source_priority;
        retained.adopt_identity(&incoming);
        return;
    }

    let child_of_incoming = match (&retained.machine, &incoming.machine) {
        (Some(kept), Some(parent)) => kept.is_child_of(parent),
        _ => false,
    };
    if incoming.source_priority == retained.source_priority && child_of_incoming {
        retained.adopt_identity(&incoming);
    }
}

/// Merge duplicates in a list, keeping the first entry of each duplicate set.
///
/// Nodumps and non-dedupable entries pass through unchanged. Each candidate
/// is compared against the retained entries in order and merged into the
/// first match.
pub fn merge_entries(entries: Vec<Entry>) -> MergeOutcome {
    let mut retained: Vec<Entry> = Vec::with_capacity(entries.len());
    let mut merged = 0;

    for entry in entries {
        if !entry.is_dedupe_candidate() {
            retained.push(entry);
            continue;
        }

        let hit = retained.iter().enumerate().find_map(|(i, kept)| {
            let dupe = classify(&entry, kept);
            (!dupe.is_empty()).then_some((i, dupe))
        });

        match hit {
            Some((i, dupe)) => {
                merge_into(&mut retained[i], entry, dupe);
                merged += 1;
            }
            None => retained.push(entry),
        }
    }

    MergeOutcome {
        entries: retained,
        merged,
    }
}

/// Merge a bucket at the given scope.
///
/// `WithinMachine` only compares entries sharing a machine key; `Full`
/// compares everything in the bucket.
pub fn merge_bucket(entries: Vec<Entry>, scope: DedupeScope, rename_aware: bool) -> MergeOutcome {
    match scope {
        DedupeScope::None => MergeOutcome {
            entries,
            merged: 0,
        },
        DedupeScope::Full => merge_entries(entries),
        DedupeScope::WithinMachine => {
            let mut slots: HashMap<String, usize> = HashMap::new();
            let mut groups: Vec<Vec<Entry>> = Vec::new();
            for entry in entries {
                let key = machine_key(&entry, rename_aware);
                let slot = *slots.entry(key).or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
                groups[slot].push(entry);
            }

            groups
                .into_iter()
                .map(merge_entries)
                .fold(MergeOutcome::default(), |mut total, group| {
                    total.entries.extend(group.entries);
                    total.merged += group.merged;
                    total
                })
        }
    }
}
