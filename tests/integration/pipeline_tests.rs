//! Discovery, enrichment and amenity merge against a mock catalog

use crate::common::{
    create_test_config, detail_page, identifier, in_memory_coordinator, listing_page,
    mount_detail, mount_end, mount_listing, open_coordinator, Row,
};
use jeolloga_sync::cache::DedupCache;
use jeolloga_sync::config::AmenityEntry;
use jeolloga_sync::crawler::{Coordinator, HttpSessionFactory};
use jeolloga_sync::storage::{
    AmenityRow, BatchOutcome, DeleteOutcome, DiscoveredRow, EnrichmentRow, RunRecord, RunStatus,
    SqliteStore, StorageError, StorageResult, Store, StoreStats, WorkUnit,
};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADDRESS_A: &str = "서울 강남구 봉은사로 531";
const ADDRESS_C: &str = "전남 해남군 삼산면 대흥사길 400";

/// Two listing pages (one row with an unknown category) and an empty third
async fn mount_catalog(server: &MockServer) {
    mount_listing(
        server,
        1,
        listing_page(&[
            Row { seq: "101", id: "bongeunsa", labels: &["휴식형"] },
            Row { seq: "102", id: "mystery", labels: &["기타"] },
        ]),
    )
    .await;
    mount_listing(
        server,
        2,
        listing_page(&[Row { seq: "103", id: "daeheungsa", labels: &["당일형", "체험형"] }]),
    )
    .await;
    mount_end(server, 3).await;
}

#[tokio::test]
async fn test_discovery_inserts_new_records_and_caches_them() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let base = mock_server.uri();
    mount_catalog(&mock_server).await;

    let config = create_test_config(&base, temp_dir.path());
    let cache_path = config.storage.cache_path.clone();
    let mut coordinator = in_memory_coordinator(config);

    let summary = coordinator.discover().await.unwrap();

    assert_eq!(summary.touched, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.pages, 2);

    let store = coordinator.store();
    let first = store.get_record(&identifier(&base, "101", "bongeunsa")).unwrap().unwrap();
    let third = store.get_record(&identifier(&base, "103", "daeheungsa")).unwrap().unwrap();
    assert!(store.get_record(&identifier(&base, "102", "mystery")).unwrap().is_none());

    assert_eq!(store.get_filter(first.id).unwrap().unwrap().type_bits, Some(2));
    assert_eq!(store.get_filter(third.id).unwrap().unwrap().type_bits, Some(1 | 4));

    // Snapshot on disk holds exactly the inserted identifiers
    let snapshot = DedupCache::load(Path::new(&cache_path)).unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.contains(&identifier(&base, "101", "bongeunsa")));
    assert!(!snapshot.contains(&identifier(&base, "102", "mystery")));
}

#[tokio::test]
async fn test_enrichment_fills_fields_filters_and_images() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let base = mock_server.uri();
    mount_catalog(&mock_server).await;
    mount_detail(&mock_server, "101", detail_page("봉은사 템플스테이", "봉은사", ADDRESS_A, "a.jpg"), 1).await;
    mount_detail(&mock_server, "103", detail_page("대흥사 템플스테이", "대흥사", ADDRESS_C, "c.jpg"), 1).await;

    let mut coordinator = in_memory_coordinator(create_test_config(&base, temp_dir.path()));
    coordinator.discover().await.unwrap();
    let summary = coordinator.enrich(false).await.unwrap();

    assert_eq!(summary.touched, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.images, 2);

    let store = coordinator.store();
    let record = store.get_record(&identifier(&base, "101", "bongeunsa")).unwrap().unwrap();
    assert_eq!(record.fields.display_name.as_deref(), Some("봉은사 템플스테이"));
    assert_eq!(record.fields.parent_name.as_deref(), Some("봉은사"));
    assert_eq!(record.fields.address.as_deref(), Some(ADDRESS_A));
    assert_eq!(record.fields.phone.as_deref(), Some("02-3218-4826"));
    assert_eq!(record.fields.description.as_deref(), Some("봉은사 템플스테이 소개"));
    assert_eq!(
        record.fields.schedule.as_deref(),
        Some(r#"{"1일차":{"04:00":"108배","05:00":"명상"}}"#)
    );

    let filter = store.get_filter(record.id).unwrap().unwrap();
    assert_eq!(filter.type_bits, Some(2));
    assert_eq!(filter.activity_bits, Some(1 | 2));
    assert_eq!(filter.region_bits, Some(1));
    assert_eq!(filter.price, Some(70000));

    let other = store.get_record(&identifier(&base, "103", "daeheungsa")).unwrap().unwrap();
    assert_eq!(store.get_filter(other.id).unwrap().unwrap().region_bits, Some(4));

    assert_eq!(
        store.get_images(record.id).unwrap(),
        vec![format!("{}/upload/a.jpg", base)]
    );
    assert!(store.enrichment_targets(false).unwrap().is_empty());
}

#[tokio::test]
async fn test_second_run_skips_cached_identifiers() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let base = mock_server.uri();

    // First run: two records discovered and enriched
    mount_catalog(&mock_server).await;
    mount_detail(&mock_server, "101", detail_page("A", "봉은사", ADDRESS_A, "a.jpg"), 1).await;
    mount_detail(&mock_server, "103", detail_page("C", "대흥사", ADDRESS_C, "c.jpg"), 1).await;

    let mut first = open_coordinator(create_test_config(&base, temp_dir.path()));
    let discovered = first.discover().await.unwrap();
    let enriched = first.enrich(false).await.unwrap();
    assert_eq!(discovered.touched, 2);
    assert_eq!(enriched.touched, 2);
    drop(first);

    mock_server.verify().await;
    mock_server.reset().await;

    // Second run: one new row; the earlier detail pages must not be fetched
    mount_listing(
        &mock_server,
        1,
        listing_page(&[
            Row { seq: "101", id: "bongeunsa", labels: &["휴식형"] },
            Row { seq: "104", id: "jogyesa", labels: &["휴식형"] },
        ]),
    )
    .await;
    mount_listing(
        &mock_server,
        2,
        listing_page(&[Row { seq: "103", id: "daeheungsa", labels: &["당일형"] }]),
    )
    .await;
    mount_end(&mock_server, 3).await;
    mount_detail(&mock_server, "101", detail_page("A", "봉은사", ADDRESS_A, "a.jpg"), 0).await;
    mount_detail(&mock_server, "103", detail_page("C", "대흥사", ADDRESS_C, "c.jpg"), 0).await;
    mount_detail(&mock_server, "104", detail_page("D", "조계사", ADDRESS_A, "d.jpg"), 1).await;

    let mut second = open_coordinator(create_test_config(&base, temp_dir.path()));
    let discovered = second.discover().await.unwrap();
    assert_eq!(discovered.touched, 1);
    assert_eq!(discovered.skipped, 2);

    let enriched = second.enrich(false).await.unwrap();
    assert_eq!(enriched.touched, 1);

    let stats = second.store().stats().unwrap();
    assert_eq!(stats.records, 3);
    assert_eq!(stats.pending, 0);
    assert_eq!(second.cache().len(), 3);
}

#[tokio::test]
async fn test_failed_detail_fetch_is_counted_and_left_pending() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let base = mock_server.uri();
    mount_catalog(&mock_server).await;
    mount_detail(&mock_server, "101", detail_page("A", "봉은사", ADDRESS_A, "a.jpg"), 1).await;

    Mock::given(method("GET"))
        .and(path("/detail/103"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut coordinator = in_memory_coordinator(create_test_config(&base, temp_dir.path()));
    coordinator.discover().await.unwrap();
    let summary = coordinator.enrich(false).await.unwrap();

    assert_eq!(summary.touched, 1);
    assert_eq!(summary.failed, 1);

    let pending = coordinator.store().enrichment_targets(false).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].identifier, identifier(&base, "103", "daeheungsa"));
}

#[tokio::test]
async fn test_failed_listing_page_does_not_stop_discovery() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let base = mock_server.uri();

    mount_listing(
        &mock_server,
        1,
        listing_page(&[Row { seq: "101", id: "bongeunsa", labels: &["휴식형"] }]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;
    mount_listing(
        &mock_server,
        3,
        listing_page(&[Row { seq: "103", id: "daeheungsa", labels: &["당일형"] }]),
    )
    .await;
    mount_end(&mock_server, 4).await;

    let mut coordinator = in_memory_coordinator(create_test_config(&base, temp_dir.path()));
    let summary = coordinator.discover().await.unwrap();

    assert_eq!(summary.touched, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.pages, 2);
}

#[tokio::test]
async fn test_amenity_merge_matches_parent_names() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let base = mock_server.uri();
    mount_catalog(&mock_server).await;
    mount_detail(&mock_server, "101", detail_page("A", "봉은사", ADDRESS_A, "a.jpg"), 1).await;
    mount_detail(&mock_server, "103", detail_page("C", "대흥사", ADDRESS_C, "c.jpg"), 1).await;

    let mut coordinator = in_memory_coordinator(create_test_config(&base, temp_dir.path()));
    coordinator.discover().await.unwrap();
    coordinator.enrich(false).await.unwrap();

    let entries = vec![
        AmenityEntry {
            name: "봉 은 사".to_string(),
            amenities: "주차 가능".to_string(),
        },
        AmenityEntry {
            name: "봉은사".to_string(),
            amenities: "1인실, 없는 시설".to_string(),
        },
        AmenityEntry {
            name: "없는 사찰".to_string(),
            amenities: "단체 가능".to_string(),
        },
    ];
    let summary = coordinator.merge_amenities(&entries).unwrap();

    assert_eq!(summary.touched, 1);
    assert_eq!(summary.dropped, 1);

    let store = coordinator.store();
    let record = store.get_record(&identifier(&base, "101", "bongeunsa")).unwrap().unwrap();
    let filter = store.get_filter(record.id).unwrap().unwrap();
    assert_eq!(filter.amenity_bits, Some(1 | 2));
    assert_eq!(filter.type_bits, Some(2));

    let untouched = store.get_record(&identifier(&base, "103", "daeheungsa")).unwrap().unwrap();
    assert_ne!(
        store.get_filter(untouched.id).unwrap().unwrap().amenity_bits,
        Some(1 | 2)
    );

    // Same input again writes nothing
    let again = coordinator.merge_amenities(&entries).unwrap();
    assert_eq!(again.touched, 0);
    assert_eq!(again.unchanged, 1);
}

/// SQLite store whose first `discovery_failures` discovery batches fail
struct FlakyStore {
    inner: SqliteStore,
    discovery_failures: usize,
}

impl Store for FlakyStore {
    fn apply_discovered(&mut self, rows: &[DiscoveredRow]) -> StorageResult<BatchOutcome> {
        if self.discovery_failures > 0 {
            self.discovery_failures -= 1;
            return Err(StorageError::ConstraintViolation("disk full".to_string()));
        }
        self.inner.apply_discovered(rows)
    }

    fn apply_enrichment(&mut self, rows: &[EnrichmentRow]) -> StorageResult<BatchOutcome> {
        self.inner.apply_enrichment(rows)
    }

    fn apply_amenities(&mut self, rows: &[AmenityRow]) -> StorageResult<BatchOutcome> {
        self.inner.apply_amenities(rows)
    }

    fn enrichment_targets(&self, refresh_all: bool) -> StorageResult<Vec<WorkUnit>> {
        self.inner.enrichment_targets(refresh_all)
    }

    fn all_identifiers(&self) -> StorageResult<Vec<(i64, String)>> {
        self.inner.all_identifiers()
    }

    fn parent_names(&self) -> StorageResult<Vec<(i64, String)>> {
        self.inner.parent_names()
    }

    fn stats(&self) -> StorageResult<StoreStats> {
        self.inner.stats()
    }

    fn delete_records(&mut self, ids: &[i64]) -> StorageResult<DeleteOutcome> {
        self.inner.delete_records(ids)
    }

    fn create_run(&mut self, mode: &str, config_hash: &str) -> StorageResult<i64> {
        self.inner.create_run(mode, config_hash)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        touched: u64,
        skipped: u64,
        failed: u64,
    ) -> StorageResult<()> {
        self.inner.finish_run(run_id, status, touched, skipped, failed)
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        self.inner.get_latest_run()
    }
}

#[tokio::test]
async fn test_rolled_back_discovery_batch_is_retried_next_run() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let base = mock_server.uri();

    // Page 1 fills one batch of two; page 2 goes out in the final flush
    mount_listing(
        &mock_server,
        1,
        listing_page(&[
            Row { seq: "101", id: "bongeunsa", labels: &["휴식형"] },
            Row { seq: "102", id: "jogyesa", labels: &["휴식형"] },
        ]),
    )
    .await;
    mount_listing(
        &mock_server,
        2,
        listing_page(&[Row { seq: "103", id: "daeheungsa", labels: &["당일형"] }]),
    )
    .await;
    mount_end(&mock_server, 3).await;

    let config = create_test_config(&base, temp_dir.path());
    let cache_path = config.storage.cache_path.clone();
    let store = FlakyStore {
        inner: SqliteStore::new_in_memory().unwrap(),
        discovery_failures: 1,
    };
    let cache = DedupCache::load(Path::new(&cache_path)).unwrap();
    let factory = HttpSessionFactory::new(config.user_agent.clone(), Duration::from_secs(5));
    let mut coordinator = Coordinator::new(config, store, factory, cache).unwrap();

    let first = coordinator.discover().await.unwrap();
    assert_eq!(first.failed, 2);
    assert_eq!(first.touched, 1);

    let snapshot = DedupCache::load(Path::new(&cache_path)).unwrap();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains(&identifier(&base, "103", "daeheungsa")));
    assert!(!snapshot.contains(&identifier(&base, "101", "bongeunsa")));
    assert!(!snapshot.contains(&identifier(&base, "102", "jogyesa")));

    let second = coordinator.discover().await.unwrap();
    assert_eq!(second.touched, 2);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.failed, 0);

    let store = &coordinator.store().inner;
    assert!(store.get_record(&identifier(&base, "101", "bongeunsa")).unwrap().is_some());
    assert!(store.get_record(&identifier(&base, "102", "jogyesa")).unwrap().is_some());
    assert_eq!(store.stats().unwrap().records, 3);

    let snapshot = DedupCache::load(Path::new(&cache_path)).unwrap();
    assert_eq!(snapshot.len(), 3);
}
