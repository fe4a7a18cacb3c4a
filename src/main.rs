//! datmerge - Reconcile overlapping preservation catalogs.
//!
//! Usage:
//!   datmerge merge <INPUT>   Bucket, deduplicate, and print a catalog
//!   datmerge stats <INPUT>   Show entry statistics
//!   datmerge --help          Show help
//!
//! Input is a JSON array of entries. Set `RUST_LOG` or pass `-v` for engine logs.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result};
use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use datmerge_core::{DigestType, Entry, IndexConfig, ItemKind, ItemStatus};
use datmerge_index::{
    BucketReport, BucketStrategy, BucketedIndex, DedupeScope, IndexContext, ItemStatistics,
};

#[derive(Parser)]
#[command(
    name = "datmerge",
    version,
    about = "Reconcile overlapping preservation catalogs",
    long_about = "datmerge groups catalog entries by an identity key, merges duplicates \
                  from overlapping sources, and prints the result in a stable order."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bucket and deduplicate a catalog
    Merge {
        /// JSON file holding an array of entries
        input: PathBuf,

        /// Identity key: auto, crc, md5, sha1, sha256, sha384, sha512, spamsum, machine
        #[arg(short, long, default_value = "auto")]
        by: String,

        /// Deduplication scope: none, machine, full
        #[arg(short, long, default_value = "full")]
        dedupe: String,

        /// Worker threads (0 = one per core)
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Keep the source priority prefix on machine keys
        #[arg(long)]
        no_rename: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show statistics for a catalog
    Stats {
        /// JSON file holding an array of entries
        input: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
struct MergeOutput {
    strategy: BucketStrategy,
    scope: DedupeScope,
    report: BucketReport,
    buckets: Vec<BucketOutput>,
}

#[derive(Serialize)]
struct BucketOutput {
    key: String,
    entries: Vec<Entry>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Merge {
            input,
            by,
            dedupe,
            threads,
            no_rename,
            format,
        } => {
            let config = IndexConfig::builder()
                .threads(threads)
                .rename_aware(!no_rename)
                .build()
                .context("Invalid configuration")?;
            run_merge(&input, &by, &dedupe, config, format)?;
        }
        Command::Stats { input, format } => {
            run_stats(&input, format)?;
        }
    }

    Ok(())
}

/// Logs go to stderr so JSON output on stdout stays clean.
///
/// Without `-v`, `RUST_LOG` decides the level (default warn).
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => None,
        1 => Some(Level::INFO),
        2 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    };

    let filter = match level {
        Some(level) => EnvFilter::from_default_env().add_directive(level.into()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

/// Read a JSON entry list.
fn read_entries(path: &Path) -> Result<Vec<Entry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let entries: Vec<Entry> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    info!(entries = entries.len(), path = %path.display(), "loaded catalog");
    Ok(entries)
}

fn load_index(entries: Vec<Entry>, context: IndexContext) -> BucketedIndex {
    let index = BucketedIndex::with_context(context);
    for entry in entries {
        index.insert_entry(entry);
    }
    index
}

/// Bucket, deduplicate, and print a catalog.
fn run_merge(
    path: &Path,
    by: &str,
    dedupe: &str,
    config: IndexConfig,
    format: OutputFormat,
) -> Result<()> {
    let scope = DedupeScope::from_name(dedupe)?;
    let context = IndexContext::new(config)?
        .with_span(tracing::info_span!("merge", input = %path.display()));
    let mut index = load_index(read_entries(path)?, context);

    let strategy = if by.eq_ignore_ascii_case("auto") {
        index.best_available()
    } else {
        BucketStrategy::from_name(by)?
    };

    let report = index.bucket(strategy, scope)?;
    let removed = index.clear_empty();
    info!(%strategy, %scope, merged = report.merged, removed, "merge finished");

    let buckets: Vec<BucketOutput> = index
        .sorted_keys()
        .into_iter()
        .map(|key| {
            let entries = index.visible_entries(&key);
            BucketOutput { key, entries }
        })
        .filter(|bucket| !bucket.entries.is_empty())
        .collect();

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" Merged by {} ({} dedupe)", strategy, scope);
            println!(
                " {} entries in {} buckets, {} duplicates merged",
                index.entry_count(),
                buckets.len(),
                report.merged
            );
            println!("{}", "─".repeat(70));
            println!();

            for bucket in &buckets {
                println!(" {}", bucket.key);
                for entry in &bucket.entries {
                    println!("   {}", describe(entry));
                }
            }
        }
        OutputFormat::Json => {
            let output = MergeOutput {
                strategy,
                scope,
                report,
                buckets,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Show statistics for a catalog.
fn run_stats(path: &Path, format: OutputFormat) -> Result<()> {
    let index = load_index(read_entries(path)?, IndexContext::default());
    let stats = index.statistics();

    match format {
        OutputFormat::Text => print_stats(&stats),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

fn print_stats(stats: &ItemStatistics) {
    println!();
    println!("{}", "─".repeat(50));
    println!(
        " {} entries, {}",
        stats.total_entries(),
        format_size(stats.total_size)
    );
    println!(
        " {} participate in deduplication, best key: {}",
        stats.participating(),
        BucketStrategy::from_digest(stats.best_available())
    );
    println!("{}", "─".repeat(50));

    println!(" Kinds:");
    for kind in ItemKind::iter().filter(|k| stats.kind_count(*k) > 0) {
        println!("   {:<12} {:>8}", kind, stats.kind_count(kind));
    }

    println!(" Digests:");
    for digest in DigestType::iter() {
        println!("   {:<12} {:>8}", digest, stats.digest_count(digest));
    }

    println!(" Statuses:");
    for status in ItemStatus::iter().filter(|s| stats.status_count(*s) > 0) {
        println!("   {:<12} {:>8}", status, stats.status_count(status));
    }

    if stats.marked > 0 {
        println!(" {} marked for removal", stats.marked);
    }
    println!();
}

/// One-line summary of an entry.
fn describe(entry: &Entry) -> String {
    let mut line = format!("{}/{} [{}]", entry.machine_name(), entry.name_str(), entry.kind);
    if let Some(size) = entry.size {
        line.push_str(&format!(" {}", format_size(size)));
    }
    for (digest, value) in entry.digests.iter() {
        line.push_str(&format!(" {digest}:{value}"));
    }
    if entry.status != ItemStatus::None {
        line.push_str(&format!(" ({})", entry.status));
    }
    if !entry.dupe_type.is_empty() {
        line.push_str(" *");
    }
    line
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
