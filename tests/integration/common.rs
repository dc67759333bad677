//! Shared fixtures: configuration pointing at a mock catalog site and the
//! markup of its listing and detail pages

use jeolloga_sync::cache::DedupCache;
use jeolloga_sync::config::{
    BatchConfig, Config, CrawlerConfig, DetailRules, ListingRules, StorageConfig, UserAgentConfig,
};
use jeolloga_sync::crawler::{Coordinator, HttpSessionFactory};
use jeolloga_sync::encoder::{Vocabularies, Vocabulary};
use jeolloga_sync::storage::SqliteStore;
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub type TestCoordinator = Coordinator<SqliteStore, HttpSessionFactory>;

/// Creates a test configuration for the catalog served at `base_url`
pub fn create_test_config(base_url: &str, dir: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            listing_url: format!("{}/list?page=", base_url),
            site_origin: base_url.to_string(),
            start_page: 1,
            end_page: 5,
            workers: 2,
            request_delay_ms: 0,
            page_delay_ms: 0,
            timeout_secs: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        storage: StorageConfig {
            database_path: dir.join("jeolloga.db").display().to_string(),
            cache_path: dir.join("seen.json").display().to_string(),
        },
        batch: BatchConfig {
            discovery_size: 2,
            enrichment_size: 2,
            amenity_size: 2,
        },
        vocabulary: Vocabularies {
            stay_type: Vocabulary::from_pairs([("당일형", 1), ("휴식형", 2), ("체험형", 4)]),
            activity: Vocabulary::from_pairs([("108배", 1), ("명상", 2), ("발우공양", 4)]),
            region: Vocabulary::from_pairs([("서울", 1), ("경기", 2), ("전남", 4)]),
            amenity: Vocabulary::from_pairs([("주차 가능", 1), ("1인실", 2), ("단체 가능", 4)]),
        },
        listing: ListingRules {
            identifier_template: format!("{}/detail/{{1}}?id={{2}}", base_url),
            ..ListingRules::default()
        },
        detail: DetailRules::default(),
    }
}

/// Coordinator over the config's on-disk database and cache
pub fn open_coordinator(config: Config) -> TestCoordinator {
    jeolloga_sync::crawler::open(config).expect("Failed to open coordinator")
}

/// Coordinator over an in-memory database and the config's cache path
pub fn in_memory_coordinator(config: Config) -> TestCoordinator {
    let store = SqliteStore::new_in_memory().expect("Failed to create store");
    let cache = DedupCache::load(Path::new(&config.storage.cache_path)).expect("Failed to load cache");
    let factory = HttpSessionFactory::new(config.user_agent.clone(), Duration::from_secs(5));
    Coordinator::new(config, store, factory, cache).expect("Failed to build coordinator")
}

/// Identifier the listing rules build for a row
pub fn identifier(base_url: &str, seq: &str, id: &str) -> String {
    format!("{}/detail/{}?id={}", base_url, seq, id)
}

/// One listing row: sequence number, bookmark id, category labels
pub struct Row<'a> {
    pub seq: &'a str,
    pub id: &'a str,
    pub labels: &'a [&'a str],
}

pub fn listing_page(rows: &[Row]) -> String {
    let items: String = rows
        .iter()
        .map(|row| {
            let spans: String = row
                .labels
                .iter()
                .map(|label| format!(r#"<span class="cate1">{}</span>"#, label))
                .collect();
            format!(
                r#"<li><div class="txt"><strong onclick="fncReserve('{}', '{}')">Stay</strong>{}</div></li>"#,
                row.seq, row.id, spans
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="myplace_list"><ul>{}</ul></div></body></html>"#,
        items
    )
}

pub fn detail_page(name: &str, parent: &str, address: &str, image: &str) -> String {
    format!(
        r#"<html><body>
<div class="place">
  <h3>{name}</h3>
  <div class="info"><ul>
    <li><img alt="주소">{parent}, {address}</li>
    <li><img alt="연락처">02-3218-4826</li>
  </ul></div>
</div>
<div class="swiper-slide"><img src="/upload/{image}"></div>
<div class="section">
  <h4>프로그램 소개</h4>
  <div class="txt"><p>{name} 소개</p></div>
</div>
<div class="section">
  <h4>프로그램 일정</h4>
  <div class="table"><table>
    <tr><th>일차</th><th>시간</th><th>내용</th></tr>
    <tr><td>1일차</td><td>04:00</td><td>108배</td></tr>
    <tr><td></td><td>05:00</td><td>명상</td></tr>
  </table></div>
</div>
<div class="section">
  <h4>참가비</h4>
  <div class="table"><table>
    <tr><th>성인</th></tr>
    <tr><td>70,000원</td></tr>
  </table></div>
</div>
</body></html>"#
    )
}

/// Serves `body` as listing page `page`
pub async fn mount_listing(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Serves an empty listing page (end of pagination)
pub async fn mount_end(server: &MockServer, page: u32) {
    mount_listing(server, page, listing_page(&[])).await;
}

/// Serves a detail page, expecting exactly `expected` fetches
pub async fn mount_detail(server: &MockServer, seq: &str, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/detail/{}", seq)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected)
        .mount(server)
        .await;
}
