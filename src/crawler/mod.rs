//! Crawler module for page fetching, extraction and orchestration
//!
//! This module contains the crawl side of the pipeline, including:
//! - Page retrieval through per-worker sessions
//! - Listing and detail page extraction
//! - A bounded worker pool for detail fetches
//! - Coordination of discovery, enrichment, reconciliation and amenity merge

mod coordinator;
pub mod detail;
pub mod fetcher;
pub mod listing;
pub mod pool;

pub use coordinator::{build_enrichment, Coordinator, Traversal};
pub use detail::{DetailExtractor, DetailResult, Schedule};
pub use fetcher::{
    build_http_client, Fetcher, HttpSession, HttpSessionFactory, RawPage, SessionFactory,
};
pub use listing::{ListingCandidate, ListingExtractor, ListingPage};
pub use pool::{PoolHandle, WorkOutcome, WorkerPool};

use crate::cache::DedupCache;
use crate::config::Config;
use crate::storage::SqliteStore;
use crate::SyncError;
use std::path::Path;
use std::time::Duration;

/// The production coordinator: SQLite store, plain HTTP sessions
pub type HttpCoordinator = Coordinator<SqliteStore, HttpSessionFactory>;

/// Opens the store and cache named in `config` and builds a coordinator
///
/// # Arguments
///
/// * `config` - Validated configuration
///
/// # Returns
///
/// * `Ok(HttpCoordinator)` - Store opened and cache loaded
/// * `Err(SyncError)` - The database, cache or extraction rules failed
pub fn open(config: Config) -> Result<HttpCoordinator, SyncError> {
    let store = SqliteStore::new(Path::new(&config.storage.database_path))?;
    let cache = DedupCache::load(Path::new(&config.storage.cache_path))?;
    let factory = HttpSessionFactory::new(
        config.user_agent.clone(),
        Duration::from_secs(config.crawler.timeout_secs),
    );
    Coordinator::new(config, store, factory, cache)
}
