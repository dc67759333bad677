//! Reconciliation against complete and incomplete listing traversals

use crate::common::{
    create_test_config, identifier, in_memory_coordinator, listing_page, mount_end,
    mount_listing, Row, TestCoordinator,
};
use jeolloga_sync::storage::{DiscoveredRow, Store};
use jeolloga_sync::SyncError;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Stores records for sequence numbers 101, 102 and 103
fn seed(coordinator: &mut TestCoordinator, base: &str) {
    let rows: Vec<DiscoveredRow> = [("101", "a"), ("102", "b"), ("103", "c")]
        .iter()
        .map(|(seq, id)| DiscoveredRow {
            identifier: identifier(base, seq, id),
            type_bits: 1,
        })
        .collect();
    coordinator.store_mut().apply_discovered(&rows).unwrap();
}

#[tokio::test]
async fn test_reconcile_deletes_records_no_longer_listed() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let base = mock_server.uri();

    mount_listing(
        &mock_server,
        1,
        listing_page(&[Row { seq: "101", id: "a", labels: &["휴식형"] }]),
    )
    .await;
    // A row with an unknown category is still listed upstream
    mount_listing(
        &mock_server,
        2,
        listing_page(&[Row { seq: "103", id: "c", labels: &["기타"] }]),
    )
    .await;
    mount_end(&mock_server, 3).await;

    let mut coordinator = in_memory_coordinator(create_test_config(&base, temp_dir.path()));
    seed(&mut coordinator, &base);

    let (summary, report) = coordinator.reconcile().await.unwrap();

    assert_eq!(report.stored, 3);
    assert_eq!(report.known, 2);
    assert_eq!(report.stale, vec![identifier(&base, "102", "b")]);
    assert_eq!(report.deleted.records, 1);
    assert_eq!(report.deleted.filters, 1);
    assert_eq!(summary.touched, 1);
    assert_eq!(summary.unchanged, 2);
    assert_eq!(summary.pages, 2);

    let store = coordinator.store();
    assert!(store.get_record(&identifier(&base, "102", "b")).unwrap().is_none());
    assert!(store.get_record(&identifier(&base, "101", "a")).unwrap().is_some());
    assert!(store.get_record(&identifier(&base, "103", "c")).unwrap().is_some());
}

#[tokio::test]
async fn test_reconcile_with_everything_listed_is_noop() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let base = mock_server.uri();

    mount_listing(
        &mock_server,
        1,
        listing_page(&[
            Row { seq: "101", id: "a", labels: &["휴식형"] },
            Row { seq: "102", id: "b", labels: &["휴식형"] },
            Row { seq: "103", id: "c", labels: &["휴식형"] },
        ]),
    )
    .await;
    mount_end(&mock_server, 2).await;

    let mut coordinator = in_memory_coordinator(create_test_config(&base, temp_dir.path()));
    seed(&mut coordinator, &base);

    let (summary, report) = coordinator.reconcile().await.unwrap();
    assert!(report.stale.is_empty());
    assert_eq!(summary.touched, 0);
    assert_eq!(coordinator.store().stats().unwrap().records, 3);
}

#[tokio::test]
async fn test_reconcile_refuses_after_failed_page() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let base = mock_server.uri();

    mount_listing(
        &mock_server,
        1,
        listing_page(&[Row { seq: "101", id: "a", labels: &["휴식형"] }]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    mount_end(&mock_server, 3).await;

    let mut coordinator = in_memory_coordinator(create_test_config(&base, temp_dir.path()));
    seed(&mut coordinator, &base);

    let result = coordinator.reconcile().await;

    assert!(matches!(
        result,
        Err(SyncError::IncompleteTraversal {
            failed_pages: 1,
            unparsed_rows: 0,
            reached_end: true
        })
    ));
    assert_eq!(coordinator.store().stats().unwrap().records, 3);
}

#[tokio::test]
async fn test_reconcile_refuses_without_reaching_end() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let base = mock_server.uri();

    // Every page up to end-page has rows; no empty page terminates the walk
    for page in 1..=5 {
        mount_listing(
            &mock_server,
            page,
            listing_page(&[Row { seq: "101", id: "a", labels: &["휴식형"] }]),
        )
        .await;
    }

    let mut coordinator = in_memory_coordinator(create_test_config(&base, temp_dir.path()));
    seed(&mut coordinator, &base);

    let result = coordinator.reconcile().await;

    assert!(matches!(
        result,
        Err(SyncError::IncompleteTraversal {
            failed_pages: 0,
            unparsed_rows: 0,
            reached_end: false
        })
    ));
    assert_eq!(coordinator.store().stats().unwrap().records, 3);
}

#[tokio::test]
async fn test_reconcile_refuses_when_a_listed_row_is_unreadable() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let base = mock_server.uri();

    // Record 102 is still listed, but its handler has an unquoted sequence
    let page = listing_page(&[
        Row { seq: "101", id: "a", labels: &["휴식형"] },
        Row { seq: "103", id: "c", labels: &["휴식형"] },
    ])
    .replace(
        "</ul>",
        r#"<li><div class="txt"><strong onclick="fncReserve(102, 'b')">Stay</strong></div></li></ul>"#,
    );
    mount_listing(&mock_server, 1, page).await;
    mount_end(&mock_server, 2).await;

    let mut coordinator = in_memory_coordinator(create_test_config(&base, temp_dir.path()));
    seed(&mut coordinator, &base);

    let result = coordinator.reconcile().await;

    assert!(matches!(
        result,
        Err(SyncError::IncompleteTraversal {
            failed_pages: 0,
            unparsed_rows: 1,
            reached_end: true
        })
    ));
    let store = coordinator.store();
    assert_eq!(store.stats().unwrap().records, 3);
    assert!(store.get_record(&identifier(&base, "102", "b")).unwrap().is_some());
}

#[tokio::test]
async fn test_reconcile_refuses_empty_listing() {
    let mock_server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let base = mock_server.uri();
    mount_end(&mock_server, 1).await;

    let mut coordinator = in_memory_coordinator(create_test_config(&base, temp_dir.path()));
    seed(&mut coordinator, &base);

    assert!(matches!(
        coordinator.reconcile().await,
        Err(SyncError::EmptyListing)
    ));
    assert_eq!(coordinator.store().stats().unwrap().records, 3);
}
