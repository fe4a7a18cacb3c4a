use std::sync::Arc;

use datmerge_index::{
    BucketStrategy, BucketedIndex, DedupeScope, DigestType, DupeType, Entry, IndexConfig,
    IndexContext, IndexError, ItemKind, ItemStatus, Machine, classify,
};
use rayon::prelude::*;

fn machine(name: &str) -> Arc<Machine> {
    Arc::new(Machine::new(name))
}

fn rom(machine: &Arc<Machine>, name: &str) -> Entry {
    Entry::rom(name).with_machine(Arc::clone(machine))
}

/// A mixed collection: shared content across machines and sources, partial
/// digests, nodumps, and a disk.
fn catalog() -> Vec<Entry> {
    let pacman = machine("pacman");
    let puckman = Arc::new(Machine::new("puckman").with_clone_of("pacman"));
    let galaga = machine("galaga");

    vec![
        rom(&pacman, "pacman.6e")
            .with_digest(DigestType::Crc32, "c1e6ab10")
            .with_size(4096)
            .with_priority(1),
        rom(&puckman, "pm1.6e")
            .with_digest(DigestType::Crc32, "c1e6ab10")
            .with_digest(DigestType::Sha1, "e87e059c5be45753f7e9f33dff851f16d6751181")
            .with_size(4096)
            .with_priority(1),
        rom(&pacman, "pacman.6f")
            .with_digest(DigestType::Crc32, "1a6fb2d4")
            .with_size(4096)
            .with_priority(2),
        rom(&galaga, "gg1.1")
            .with_digest(DigestType::Crc32, "a3a0f743")
            .with_digest(DigestType::Md5, "0123456789abcdef0123456789abcdef")
            .with_size(4096)
            .with_priority(2),
        rom(&galaga, "gg1.1")
            .with_digest(DigestType::Crc32, "a3a0f743")
            .with_size(4096)
            .with_priority(2),
        rom(&galaga, "missing.bin")
            .with_digest(DigestType::Crc32, "a3a0f743")
            .with_status(ItemStatus::NoDump),
        Entry::disk("galaga")
            .with_digest(DigestType::Sha1, "ffffffffffffffffffffffffffffffffffffffff")
            .with_machine(Arc::clone(&galaga))
            .with_priority(3),
    ]
}

fn load(entries: Vec<Entry>) -> BucketedIndex {
    let index = BucketedIndex::new();
    for entry in entries {
        index.insert_entry(entry);
    }
    index
}

#[test]
fn test_unknown_digest_never_blocks_match() {
    let m = machine("m");
    let crc_only = rom(&m, "a.bin").with_digest(DigestType::Crc32, "deadbeef").with_size(10);
    let sha_only = rom(&m, "a.bin")
        .with_digest(DigestType::Sha1, "9f8e7d6c5b4a39281706f5e4d3c2b1a098765432")
        .with_size(10);
    let unsized_sha = rom(&m, "a.bin").with_digest(DigestType::Sha1, "9f8e");

    assert!(!classify(&crc_only, &sha_only).is_empty());
    assert!(!classify(&crc_only, &unsized_sha).is_empty());
}

#[test]
fn test_nodump_never_classifies() {
    let m = machine("m");
    let good = rom(&m, "a.bin").with_digest(DigestType::Crc32, "deadbeef");
    let nodump = good.clone().with_status(ItemStatus::NoDump);

    assert!(classify(&good, &nodump).is_empty());
    assert!(classify(&nodump, &good).is_empty());
    assert!(classify(&nodump, &nodump).is_empty());
}

#[test]
fn test_merge_fills_gaps_in_one_survivor() {
    let m = machine("m");
    let mut index = load(vec![
        rom(&m, "a.bin").with_digest(DigestType::Md5, "y"),
        rom(&m, "a.bin").with_digest(DigestType::Crc32, "x"),
    ]);

    index
        .bucket(BucketStrategy::Machine, DedupeScope::Full)
        .unwrap();
    let survivors = index.visible_entries("m");
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].digests.get(DigestType::Crc32), Some("x"));
    assert_eq!(survivors[0].digests.get(DigestType::Md5), Some("y"));
}

#[test]
fn test_rebucketing_preserves_count() {
    let mut index = load(catalog());
    let total = index.entry_count();

    for strategy in [
        BucketStrategy::Crc32,
        BucketStrategy::Sha1,
        BucketStrategy::Md5,
        BucketStrategy::Sha512,
        BucketStrategy::Machine,
        BucketStrategy::SpamSum,
    ] {
        let report = index.bucket(strategy, DedupeScope::None).unwrap();
        assert_eq!(report.merged, 0);
        assert_eq!(index.entry_count(), total, "count changed under {strategy}");
        assert_eq!(index.statistics().total_entries(), total as u64);
    }

    let report = index.bucket(BucketStrategy::Crc32, DedupeScope::Full).unwrap();
    assert_eq!(total - index.entry_count(), report.merged);
    assert_eq!(index.statistics().total_entries(), index.entry_count() as u64);

    let running = index.statistics();
    index.recalculate_statistics();
    assert_eq!(index.statistics(), running);
}

#[test]
fn test_sort_is_idempotent_and_arrival_independent() {
    let mut forward = load(catalog());
    let mut reversed = load(catalog().into_iter().rev().collect());

    forward.bucket(BucketStrategy::Crc32, DedupeScope::None).unwrap();
    let first: Vec<Vec<Entry>> = forward
        .sorted_keys()
        .iter()
        .map(|key| forward.visible_entries(key))
        .collect();

    forward.sort(true).unwrap();
    let second: Vec<Vec<Entry>> = forward
        .sorted_keys()
        .iter()
        .map(|key| forward.visible_entries(key))
        .collect();
    assert_eq!(first, second);

    reversed.bucket(BucketStrategy::Crc32, DedupeScope::None).unwrap();
    assert_eq!(forward.into_sorted_entries(), reversed.into_sorted_entries());
}

#[test]
fn test_best_available_needs_uniform_digest() {
    let m = machine("m");
    let index = BucketedIndex::new();
    for i in 0..10 {
        let mut entry = rom(&m, &format!("{i}.bin"))
            .with_digest(DigestType::Crc32, format!("{i:08x}"))
            .with_digest(DigestType::Sha256, format!("{i:064x}"));
        if i < 9 {
            entry.digests.set(DigestType::Sha512, format!("{i:0128x}"));
        }
        index.insert_entry(entry);
    }
    index.insert_entry(rom(&m, "bad.bin").with_status(ItemStatus::NoDump));

    assert_eq!(index.best_available(), BucketStrategy::Sha256);
}

#[test]
fn test_three_sources_merge_into_one() {
    let low = machine("from-two");
    let best = machine("from-one");
    let worst = machine("from-three");

    let mut index = load(vec![
        rom(&low, "a.bin")
            .with_digest(DigestType::Crc32, "DEADBEEF")
            .with_priority(2),
        rom(&best, "a.bin")
            .with_digest(DigestType::Crc32, "DEADBEEF")
            .with_digest(DigestType::Md5, "ab12ab12ab12ab12ab12ab12ab12ab12")
            .with_priority(1),
        rom(&worst, "a.bin")
            .with_digest(DigestType::Crc32, "DEADBEEF")
            .with_digest(DigestType::Sha1, "9f8e9f8e9f8e9f8e9f8e9f8e9f8e9f8e9f8e9f8e")
            .with_status(ItemStatus::None)
            .with_priority(3),
    ]);

    let report = index.bucket(BucketStrategy::Crc32, DedupeScope::Full).unwrap();
    assert_eq!(report.merged, 2);

    let keys = index.sorted_keys();
    assert_eq!(keys, vec!["deadbeef"]);

    let survivors = index.visible_entries("deadbeef");
    assert_eq!(survivors.len(), 1);
    let survivor = &survivors[0];
    assert_eq!(survivor.digests.get(DigestType::Crc32), Some("DEADBEEF"));
    assert!(survivor.digests.has(DigestType::Md5));
    assert!(survivor.digests.has(DigestType::Sha1));
    assert_eq!(survivor.machine_name(), "from-one");
    assert_eq!(survivor.source_priority, 1);
    assert!(survivor.dupe_type.contains(DupeType::EXTERNAL));
}

#[test]
fn test_within_machine_dedupe_keeps_machines_apart() {
    let mut index = load(catalog());
    let total = index.entry_count();

    let report = index
        .bucket(BucketStrategy::Crc32, DedupeScope::WithinMachine)
        .unwrap();
    // Only the two galaga gg1.1 dumps share a machine and a CRC.
    assert_eq!(report.merged, 1);
    assert_eq!(index.entry_count(), total - 1);
    assert_eq!(index.merged_by(), DedupeScope::WithinMachine);

    let shared = index.visible_entries("c1e6ab10");
    assert_eq!(shared.len(), 2);
}

#[test]
fn test_nodumps_survive_full_dedupe() {
    let mut index = load(catalog());
    index.bucket(BucketStrategy::Crc32, DedupeScope::Full).unwrap();

    let galaga = index.visible_entries("a3a0f743");
    assert_eq!(galaga.iter().filter(|e| e.is_nodump()).count(), 1);
    assert_eq!(galaga.iter().filter(|e| !e.is_nodump()).count(), 1);
    assert_eq!(index.statistics().status_count(ItemStatus::NoDump), 1);
}

#[test]
fn test_disk_without_crc_buckets_with_empty_sentinel() {
    let mut index = load(catalog());
    index.bucket(BucketStrategy::Crc32, DedupeScope::None).unwrap();

    let zero = index.visible_entries(datmerge_core::ZERO_CRC32);
    assert_eq!(zero.len(), 1);
    assert_eq!(zero[0].kind, ItemKind::Disk);
}

#[test]
fn test_parallel_producers() {
    let config = IndexConfig::builder().threads(4usize).build().unwrap();
    let index = BucketedIndex::with_context(IndexContext::new(config).unwrap());
    let m = machine("m");

    (0..1000u32).into_par_iter().for_each(|i| {
        let key = format!("bucket-{}", i % 7);
        index.insert(
            key,
            rom(&m, &format!("{i}.bin")).with_digest(DigestType::Crc32, format!("{i:08x}")),
        );
    });

    assert_eq!(index.entry_count(), 1000);
    assert_eq!(index.statistics().digest_count(DigestType::Crc32), 1000);
}

#[test]
fn test_cancelled_transition() {
    let mut index = load(catalog());
    index.context().cancellation_token().cancel();

    let result = index.bucket(BucketStrategy::Crc32, DedupeScope::Full);
    assert!(matches!(result, Err(IndexError::Cancelled)));
    assert_eq!(index.bucketed_by(), BucketStrategy::None);
}

#[test]
fn test_filter_then_compact() {
    let mut index = load(catalog());
    index.bucket(BucketStrategy::Machine, DedupeScope::None).unwrap();

    let removed = index
        .execute_filters(&|entry: &Entry| entry.kind != ItemKind::Disk)
        .unwrap();
    assert_eq!(removed, 1);
    index.insert("empty", Entry::blank(machine("empty")));
    assert_eq!(index.clear_empty(), 1);
    assert!(!index.contains_key("empty"));
    assert_eq!(index.statistics().kind_count(ItemKind::Disk), 0);
}

#[test]
fn test_entries_from_json() {
    let json = r#"[
        {"name": "a.bin", "digests": {"crc32": "deadbeef"}, "size": "16", "machine": {"name": "m"}},
        {"name": "a.bin", "digests": {"sha1": "9f8e"}, "size": 16, "machine": {"name": "m"}, "source_priority": 1},
        {"name": "b.bin", "size": "n/a", "machine": {"name": "m"}}
    ]"#;
    let entries: Vec<Entry> = serde_json::from_str(json).unwrap();
    let mut index = load(entries);

    assert_eq!(index.statistics().status_count(ItemStatus::NoDump), 1);
    let report = index.bucket(BucketStrategy::Machine, DedupeScope::Full).unwrap();
    assert_eq!(report.merged, 1);
    assert_eq!(index.visible_entries("m").len(), 2);
}

#[test]
fn test_huge_sizes_do_not_overflow_statistics() {
    let m = machine("m");
    let index = BucketedIndex::new();
    for name in ["a.bin", "b.bin"] {
        index.insert_entry(
            rom(&m, name)
                .with_digest(DigestType::Crc32, "deadbeef")
                .with_size(u64::MAX),
        );
    }

    let stats = index.statistics();
    assert_eq!(stats.total_size, u64::MAX);
    assert_eq!(stats.total_entries(), 2);
}
