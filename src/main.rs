//! Jeolloga-Sync main entry point
//!
//! This is the command-line interface for the catalog crawler and store
//! synchronizer.

use anyhow::Context;
use clap::Parser;
use jeolloga_sync::cache::DedupCache;
use jeolloga_sync::config::{load_amenities, load_config_with_hash, AmenityEntry, Config};
use jeolloga_sync::crawler::{self, HttpCoordinator};
use jeolloga_sync::output::{print_statistics, print_summary, RunSummary};
use jeolloga_sync::storage::{RunStatus, SqliteStore, Store};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Jeolloga-Sync: incremental catalog crawler and store synchronizer
///
/// Discovers records on a paginated catalog, enriches them from their detail
/// pages, and keeps a SQLite store in step with the catalog across runs.
/// With no mode flag, runs discovery followed by enrichment.
#[derive(Parser, Debug)]
#[command(name = "jeolloga-sync")]
#[command(version = "1.0.0")]
#[command(about = "Incremental catalog crawler and store synchronizer", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Walk the listing pages and insert new records
    #[arg(long)]
    discover: bool,

    /// Fetch detail pages for records missing data
    #[arg(long)]
    enrich: bool,

    /// Re-enrich every record (implies --enrich)
    #[arg(long)]
    refresh: bool,

    /// Delete records no longer listed upstream (requires a complete traversal)
    #[arg(long)]
    reconcile: bool,

    /// Merge amenity labels from a TOML file of [[stay]] entries
    #[arg(long, value_name = "FILE")]
    amenities: Option<PathBuf>,

    /// Forget every cached identifier before discovery
    #[arg(long)]
    reset_cache: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would run without touching the network
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Discover,
    Enrich { refresh_all: bool },
    Amenities,
    Reconcile,
}

impl Mode {
    fn name(&self) -> &'static str {
        match self {
            Mode::Discover => "discover",
            Mode::Enrich { refresh_all: false } => "enrich",
            Mode::Enrich { refresh_all: true } => "refresh",
            Mode::Amenities => "amenities",
            Mode::Reconcile => "reconcile",
        }
    }
}

impl Cli {
    fn modes(&self) -> Vec<Mode> {
        let enrich = self.enrich || self.refresh;
        let explicit = self.discover || enrich || self.reconcile || self.amenities.is_some();

        if !explicit {
            return vec![Mode::Discover, Mode::Enrich { refresh_all: false }];
        }

        let mut modes = Vec::new();
        if self.discover {
            modes.push(Mode::Discover);
        }
        if enrich {
            modes.push(Mode::Enrich {
                refresh_all: self.refresh,
            });
        }
        if self.amenities.is_some() {
            modes.push(Mode::Amenities);
        }
        if self.reconcile {
            modes.push(Mode::Reconcile);
        }
        modes
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &cli.modes())?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_pipeline(config, config_hash, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("jeolloga_sync=info,warn"),
            1 => EnvFilter::new("jeolloga_sync=debug,info"),
            2 => EnvFilter::new("jeolloga_sync=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the plan
fn handle_dry_run(config: &Config, modes: &[Mode]) -> anyhow::Result<()> {
    println!("=== Jeolloga-Sync Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Listing URL: {}<page>", config.crawler.listing_url);
    println!(
        "  Pages: {}..={}",
        config.crawler.start_page, config.crawler.end_page
    );
    println!("  Workers: {}", config.crawler.workers);
    println!("  Request delay: {}ms", config.crawler.request_delay_ms);
    println!("  Page delay: {}ms", config.crawler.page_delay_ms);
    println!("  Timeout: {}s", config.crawler.timeout_secs);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Cache: {}", config.storage.cache_path);

    println!("\nBatch sizes:");
    println!("  Discovery: {}", config.batch.discovery_size);
    println!("  Enrichment: {}", config.batch.enrichment_size);
    println!("  Amenity: {}", config.batch.amenity_size);

    println!("\nVocabularies:");
    println!("  Type: {} labels", config.vocabulary.stay_type.len());
    println!("  Activity: {} labels", config.vocabulary.activity.len());
    println!("  Region: {} labels", config.vocabulary.region.len());
    println!("  Amenity: {} labels", config.vocabulary.amenity.len());

    let cache = DedupCache::load(Path::new(&config.storage.cache_path))
        .context("failed to read dedup cache")?;
    println!("\nDedup cache: {} identifiers", cache.len());

    let names: Vec<&str> = modes.iter().map(Mode::name).collect();
    println!("\n✓ Configuration is valid");
    println!("✓ Would run: {}", names.join(" → "));

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let store = SqliteStore::new(Path::new(&config.storage.database_path))
        .context("failed to open database")?;
    let stats = store.stats()?;
    let latest = store.get_latest_run()?;

    print_statistics(&stats, latest.as_ref());

    Ok(())
}

/// Handles the pipeline modes, recording the run in the audit table
async fn handle_pipeline(config: Config, config_hash: String, cli: &Cli) -> anyhow::Result<()> {
    let modes = cli.modes();

    // Read the amenity file before touching the network or the store
    let amenities = match &cli.amenities {
        Some(path) => load_amenities(path)
            .with_context(|| format!("failed to load amenities from {}", path.display()))?,
        None => Vec::new(),
    };

    let mut coordinator = crawler::open(config).context("failed to initialize pipeline")?;

    if cli.reset_cache {
        coordinator.reset_cache()?;
    }

    let label = modes
        .iter()
        .map(Mode::name)
        .collect::<Vec<_>>()
        .join("+");
    let run_id = coordinator.store_mut().create_run(&label, &config_hash)?;
    tracing::info!("Starting run {} ({})", run_id, label);

    let mut total = RunSummary::default();
    let result = run_modes(&mut coordinator, &modes, &amenities, &mut total).await;

    let status = if result.is_ok() {
        RunStatus::Completed
    } else {
        RunStatus::Failed
    };
    coordinator.store_mut().finish_run(
        run_id,
        status,
        total.touched,
        total.skipped,
        total.failed,
    )?;

    match result {
        Ok(()) => {
            if modes.len() > 1 {
                print_summary("total", &total);
            }
            tracing::info!("Run {} completed", run_id);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run {} failed: {}", run_id, e);
            Err(e)
        }
    }
}

async fn run_modes(
    coordinator: &mut HttpCoordinator,
    modes: &[Mode],
    amenities: &[AmenityEntry],
    total: &mut RunSummary,
) -> anyhow::Result<()> {
    for mode in modes {
        tracing::info!("=== {} ===", mode.name());

        let summary = match *mode {
            Mode::Discover => coordinator.discover().await?,
            Mode::Enrich { refresh_all } => coordinator.enrich(refresh_all).await?,
            Mode::Amenities => coordinator.merge_amenities(amenities)?,
            Mode::Reconcile => {
                let (summary, report) = coordinator.reconcile().await?;
                println!(
                    "Reconciled {} stored records against {} listed identifiers",
                    report.stored, report.known
                );
                summary
            }
        };

        print_summary(mode.name(), &summary);
        *total += &summary;
    }
    Ok(())
}
