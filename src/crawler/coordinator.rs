//! Crawler coordinator - pipeline orchestration
//!
//! This module wires the extractors, the worker pool, the synchronizers and
//! the dedup cache together into the pipeline modes:
//! - Discovery: sequential listing pagination, cache filtering, record inserts
//! - Enrichment: concurrent detail fetches merged into existing records
//! - Reconciliation: full listing traversal, then removal of vanished records
//! - Amenity merge: bulk attribute merge through the naming index

use crate::cache::DedupCache;
use crate::config::{AmenityEntry, Config};
use crate::crawler::detail::{DetailExtractor, DetailResult};
use crate::crawler::fetcher::{Fetcher, SessionFactory};
use crate::crawler::listing::{ListingExtractor, ListingPage};
use crate::crawler::pool::{WorkOutcome, WorkerPool};
use crate::encoder::{encode, normalize_name, NamingIndex, Vocabularies};
use crate::output::RunSummary;
use crate::reconcile::{reconcile, ReconcileReport};
use crate::storage::{
    AmenityRow, DiscoveredRow, EnrichmentRow, FilterUpdate, Store, WorkUnit,
};
use crate::sync::{BatchSynchronizer, FlushResult, SyncRow};
use crate::{FetchError, SyncError};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Identifiers seen by one walk over the listing pages
#[derive(Debug, Clone, Default)]
pub struct Traversal {
    /// Every identifier listed, including rows skipped for unknown categories
    pub listed: HashSet<String>,
    pub pages: u64,
    pub failed_pages: usize,
    /// Rows present on a page that did not yield an identifier
    pub unparsed_rows: usize,
    /// True if pagination stopped at an empty page rather than at `end-page`
    pub reached_end: bool,
}

impl Traversal {
    /// Only a complete traversal may be fed to the reconciler
    pub fn is_complete(&self) -> bool {
        self.failed_pages == 0 && self.unparsed_rows == 0 && self.reached_end
    }
}

/// Main pipeline coordinator
pub struct Coordinator<S: Store, F: SessionFactory> {
    config: Arc<Config>,
    store: S,
    factory: F,
    cache: DedupCache,
    listing: ListingExtractor,
    detail: Arc<DetailExtractor>,
}

impl<S: Store, F: SessionFactory> Coordinator<S, F> {
    /// Creates a new coordinator
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `store` - The store handle, owned for the coordinator's lifetime
    /// * `factory` - Opens fetch sessions for listing and detail pages
    /// * `cache` - The loaded dedup cache
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Extractors compiled
    /// * `Err(SyncError)` - A selector or pattern failed to compile
    pub fn new(config: Config, store: S, factory: F, cache: DedupCache) -> Result<Self, SyncError> {
        let listing = ListingExtractor::from_rules(&config.listing)?;
        let detail = DetailExtractor::from_rules(&config.detail, &config.crawler.site_origin)?;

        Ok(Self {
            config: Arc::new(config),
            store,
            factory,
            cache,
            listing,
            detail: Arc::new(detail),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    /// Out-of-band cache reset: forgets every previously seen identifier
    pub fn reset_cache(&mut self) -> Result<(), SyncError> {
        self.cache.reset()
    }

    // ===== Discovery =====

    /// Walks the listing pages and inserts identifiers not seen before
    ///
    /// Cached identifiers are skipped before any write or detail work. The
    /// cache snapshot is saved after every committed batch; identifiers of a
    /// rolled-back batch stay uncached so the next run retries them.
    pub async fn discover(&mut self) -> Result<RunSummary, SyncError> {
        let mut session = self.factory.open()?;
        let mut sync = BatchSynchronizer::<DiscoveredRow>::new(self.config.batch.discovery_size);
        let mut summary = RunSummary::default();
        let mut queued: HashSet<String> = HashSet::new();

        let crawler = &self.config.crawler;
        let page_delay = Duration::from_millis(crawler.page_delay_ms);
        tracing::info!(
            "discovery: pages {}..={}, {} identifiers cached",
            crawler.start_page,
            crawler.end_page,
            self.cache.len()
        );

        for page in crawler.start_page..=crawler.end_page {
            let listing = match self.fetch_listing(&mut session, page).await {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::error!("discovery: listing page {} failed: {}", page, e);
                    summary.failed += 1;
                    tokio::time::sleep(page_delay).await;
                    continue;
                }
            };

            if listing.is_end() {
                tracing::info!("discovery: page {} is empty, end of listing", page);
                break;
            }
            summary.pages += 1;
            summary.skipped += listing.skipped as u64;

            let mut fresh = 0usize;
            for candidate in listing.candidates {
                if self.cache.contains(&candidate.identifier) {
                    tracing::debug!("discovery: {} cached, skipping", candidate.identifier);
                    summary.skipped += 1;
                    continue;
                }
                if queued.contains(&candidate.identifier) {
                    tracing::debug!("discovery: {} listed twice, skipping", candidate.identifier);
                    continue;
                }

                let type_bits = self
                    .config
                    .vocabulary
                    .stay_type
                    .encode_labels(candidate.type_labels.iter().map(String::as_str));
                if type_bits == 0 {
                    tracing::warn!(
                        "discovery: {} has no known type in {:?}, skipping",
                        candidate.identifier,
                        candidate.type_labels
                    );
                    summary.skipped += 1;
                    continue;
                }

                fresh += 1;
                queued.insert(candidate.identifier.clone());
                let row = DiscoveredRow {
                    identifier: candidate.identifier,
                    type_bits,
                };
                if let Some(result) = sync.add(&mut self.store, row) {
                    self.commit_discovered(result, &mut summary)?;
                }
            }

            tracing::info!(
                "discovery: page {} had {} rows, {} new",
                page,
                listing.rows,
                fresh
            );
            tokio::time::sleep(page_delay).await;
        }

        if let Some(result) = sync.finish(&mut self.store) {
            self.commit_discovered(result, &mut summary)?;
        }

        Ok(summary)
    }

    fn commit_discovered(
        &mut self,
        result: FlushResult<DiscoveredRow>,
        summary: &mut RunSummary,
    ) -> Result<(), SyncError> {
        if let Some(rows) = tally(result, summary) {
            self.cache.extend(rows.into_iter().map(|row| row.identifier));
            self.cache.save()?;
        }
        Ok(())
    }

    async fn fetch_listing(
        &self,
        session: &mut F::Session,
        page: u32,
    ) -> Result<ListingPage, FetchError> {
        let url = format!("{}{}", self.config.crawler.listing_url, page);
        tracing::debug!("Fetching listing page {}: {}", page, url);
        let raw = session.fetch(&url).await?;
        Ok(self.listing.extract_page(&raw.body))
    }

    /// Walks every listing page without writing anything
    pub async fn traverse(&self) -> Result<Traversal, SyncError> {
        let mut session = self.factory.open()?;
        let mut traversal = Traversal::default();
        let crawler = &self.config.crawler;
        let page_delay = Duration::from_millis(crawler.page_delay_ms);

        for page in crawler.start_page..=crawler.end_page {
            match self.fetch_listing(&mut session, page).await {
                Ok(listing) if listing.is_end() => {
                    traversal.reached_end = true;
                    break;
                }
                Ok(listing) => {
                    traversal.pages += 1;
                    if listing.skipped > 0 {
                        tracing::warn!(
                            "traversal: {} unreadable rows on listing page {}",
                            listing.skipped,
                            page
                        );
                        traversal.unparsed_rows += listing.skipped;
                    }
                    traversal
                        .listed
                        .extend(listing.candidates.into_iter().map(|c| c.identifier));
                }
                Err(e) => {
                    tracing::error!("traversal: listing page {} failed: {}", page, e);
                    traversal.failed_pages += 1;
                }
            }
            tokio::time::sleep(page_delay).await;
        }

        if !traversal.reached_end {
            tracing::warn!(
                "traversal: stopped at end-page {} without reaching an empty page",
                crawler.end_page
            );
        }

        Ok(traversal)
    }

    // ===== Enrichment =====

    /// Fetches detail pages for records due for enrichment and merges them
    ///
    /// # Arguments
    ///
    /// * `refresh_all` - Re-enrich every record, not only incomplete ones
    pub async fn enrich(&mut self, refresh_all: bool) -> Result<RunSummary, SyncError> {
        let mut summary = RunSummary::default();
        let units = self.store.enrichment_targets(refresh_all)?;
        if units.is_empty() {
            tracing::info!("enrichment: nothing to do");
            return Ok(summary);
        }
        tracing::info!("enrichment: {} records queued", units.len());

        let crawler = &self.config.crawler;
        let pool = WorkerPool::new(
            crawler.workers as usize,
            Duration::from_millis(crawler.request_delay_ms),
        );

        let detail = Arc::clone(&self.detail);
        let config = Arc::clone(&self.config);
        let mut handle = pool.spawn(&self.factory, units, move |unit, page| {
            build_enrichment(unit, detail.extract(&page.body), &config.vocabulary)
        })?;

        let mut sync = BatchSynchronizer::<EnrichmentRow>::new(self.config.batch.enrichment_size);
        while let Some(outcome) = handle.next().await {
            match outcome {
                WorkOutcome::Done {
                    output: Some(row), ..
                } => {
                    if let Some(result) = sync.add(&mut self.store, row) {
                        tally(result, &mut summary);
                    }
                }
                WorkOutcome::Done { unit, output: None } => {
                    tracing::warn!(
                        "enrichment: nothing extracted from {}, skipping",
                        unit.identifier
                    );
                    summary.skipped += 1;
                }
                WorkOutcome::Failed { .. } => summary.failed += 1,
            }
        }
        handle.join().await?;

        if let Some(result) = sync.finish(&mut self.store) {
            tally(result, &mut summary);
        }

        Ok(summary)
    }

    // ===== Reconciliation =====

    /// Removes records that are no longer listed upstream
    ///
    /// Refuses to delete anything unless the traversal was complete and
    /// listed at least one identifier.
    pub async fn reconcile(&mut self) -> Result<(RunSummary, ReconcileReport), SyncError> {
        let traversal = self.traverse().await?;

        if !traversal.is_complete() {
            tracing::error!(
                "reconcile: traversal incomplete ({} failed pages, {} unreadable rows, end reached: {}), refusing",
                traversal.failed_pages,
                traversal.unparsed_rows,
                traversal.reached_end
            );
            return Err(SyncError::IncompleteTraversal {
                failed_pages: traversal.failed_pages,
                unparsed_rows: traversal.unparsed_rows,
                reached_end: traversal.reached_end,
            });
        }
        if traversal.listed.is_empty() {
            return Err(SyncError::EmptyListing);
        }

        let report = reconcile(&mut self.store, &traversal.listed)?;
        let summary = RunSummary {
            touched: report.deleted.records,
            unchanged: (report.stored - report.stale.len()) as u64,
            pages: traversal.pages,
            ..RunSummary::default()
        };
        Ok((summary, report))
    }

    // ===== Amenity merge =====

    /// Writes amenity bits to every record whose parent name matches an entry
    ///
    /// Entries sharing a normalized name are OR-combined. Names with no
    /// matching record are dropped.
    pub fn merge_amenities(&mut self, entries: &[AmenityEntry]) -> Result<RunSummary, SyncError> {
        let mut summary = RunSummary::default();

        let mut grouped: BTreeMap<String, u32> = BTreeMap::new();
        for entry in entries {
            let name = normalize_name(&entry.name);
            if name.is_empty() {
                tracing::warn!("amenity: entry without a name, skipping");
                summary.skipped += 1;
                continue;
            }
            *grouped.entry(name).or_insert(0) |= encode(&self.config.vocabulary.amenity, &entry.amenities);
        }

        let index = NamingIndex::from_rows(self.store.parent_names()?);
        tracing::info!(
            "amenity: {} names to merge, {} known parent names",
            grouped.len(),
            index.len()
        );

        let mut sync = BatchSynchronizer::<AmenityRow>::new(self.config.batch.amenity_size);
        for (name, amenity_bits) in grouped {
            let ids = index.ids_for(&name);
            if ids.is_empty() {
                tracing::warn!("amenity: no record named {}, dropping", name);
                summary.dropped += 1;
                continue;
            }
            for &record_id in ids {
                let row = AmenityRow {
                    record_id,
                    amenity_bits,
                };
                if let Some(result) = sync.add(&mut self.store, row) {
                    tally(result, &mut summary);
                }
            }
        }

        if let Some(result) = sync.finish(&mut self.store) {
            tally(result, &mut summary);
        }

        Ok(summary)
    }
}

/// Turns one detail extraction into a synchronizer row
///
/// Returns `None` if the page yielded nothing. A dimension whose source field
/// is absent is left absent so the stored value survives.
pub fn build_enrichment(
    unit: &WorkUnit,
    result: DetailResult,
    vocabulary: &Vocabularies,
) -> Option<EnrichmentRow> {
    if result.is_empty() {
        return None;
    }

    let filter = FilterUpdate {
        activity_bits: result
            .fields
            .schedule
            .as_deref()
            .map(|schedule| vocabulary.activity.encode_contains(schedule)),
        region_bits: result
            .fields
            .address
            .as_deref()
            .map(|address| vocabulary.region.encode_region(address)),
        price: result.price,
    };

    Some(EnrichmentRow {
        record_id: unit.record_id,
        identifier: unit.identifier.clone(),
        fields: result.fields,
        filter,
        images: result.images,
    })
}

/// Folds a flush result into the summary, returning the committed rows
fn tally<R: SyncRow>(result: FlushResult<R>, summary: &mut RunSummary) -> Option<Vec<R>> {
    match result {
        Ok(flushed) => {
            summary.absorb(&flushed.outcome);
            Some(flushed.rows)
        }
        Err(failure) => {
            summary.failed += failure.rows.len() as u64;
            None
        }
    }
}
