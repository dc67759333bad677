//! Run summaries and store statistics
//!
//! This module provides the per-run counters every mode reports at the end,
//! and the formatted views printed by the CLI.

use crate::storage::{BatchOutcome, RunRecord, StoreStats};
use std::ops::AddAssign;

/// Counters for one pipeline mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Rows inserted or updated (records deleted, for reconciliation)
    pub touched: u64,

    /// Rows compared equal to the store and left alone
    pub unchanged: u64,

    /// Candidates skipped before any write (cache hits, unmatched categories,
    /// empty extractions, malformed rows)
    pub skipped: u64,

    /// Failed fetches and rows lost to rolled-back batches
    pub failed: u64,

    /// Rows dropped because their parent record was missing
    pub dropped: u64,

    /// Image rows appended
    pub images: u64,

    /// Listing pages read successfully
    pub pages: u64,
}

impl RunSummary {
    /// Folds a committed batch into the counters
    pub fn absorb(&mut self, outcome: &BatchOutcome) {
        self.touched += outcome.touched();
        self.unchanged += outcome.unchanged;
        self.dropped += outcome.dropped;
        self.images += outcome.images;
    }
}

impl AddAssign<&RunSummary> for RunSummary {
    fn add_assign(&mut self, other: &RunSummary) {
        self.touched += other.touched;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.dropped += other.dropped;
        self.images += other.images;
        self.pages += other.pages;
    }
}

/// Prints the end-of-run summary to stdout
pub fn print_summary(mode: &str, summary: &RunSummary) {
    println!("=== {} summary ===", mode);
    println!("  Touched:   {}", summary.touched);
    println!("  Unchanged: {}", summary.unchanged);
    println!("  Skipped:   {}", summary.skipped);
    println!("  Failed:    {}", summary.failed);
    println!("  Dropped:   {}", summary.dropped);
    if summary.pages > 0 {
        println!("  Pages:     {}", summary.pages);
    }
    if summary.images > 0 {
        println!("  Images:    {}", summary.images);
    }
}

/// Prints store statistics and the latest run, if any
///
/// # Arguments
///
/// * `stats` - Aggregate counts over the store
/// * `latest` - The most recent run row
pub fn print_statistics(stats: &StoreStats, latest: Option<&RunRecord>) {
    println!("=== Store Statistics ===\n");

    println!("Records:");
    println!("  Total:    {}", stats.records);
    println!(
        "  Enriched: {} ({:.1}%)",
        stats.enriched,
        percentage(stats.enriched, stats.records)
    );
    println!("  Pending enrichment: {}", stats.pending);
    println!();

    println!("Derived rows:");
    println!("  Filters: {}", stats.filters);
    println!("  Images:  {}", stats.images);
    println!();

    match latest {
        Some(run) => {
            println!("Latest run #{} ({}):", run.id, run.mode);
            println!("  Status:   {}", run.status.to_db_string());
            println!("  Started:  {}", run.started_at);
            println!(
                "  Finished: {}",
                run.finished_at.as_deref().unwrap_or("-")
            );
            println!(
                "  Touched {} / skipped {} / failed {}",
                run.touched, run.skipped, run.failed
            );
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No runs recorded yet"),
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}
