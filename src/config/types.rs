use crate::encoder::Vocabularies;
use serde::Deserialize;

/// Main configuration structure for Jeolloga-Sync
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    pub vocabulary: Vocabularies,
    #[serde(default)]
    pub listing: ListingRules,
    #[serde(default)]
    pub detail: DetailRules,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Listing URL prefix; the page number is appended
    #[serde(rename = "listing-url")]
    pub listing_url: String,

    /// Origin used to resolve relative image paths
    #[serde(rename = "site-origin")]
    pub site_origin: String,

    /// First listing page to crawl (inclusive)
    #[serde(rename = "start-page", default = "default_start_page")]
    pub start_page: u32,

    /// Last listing page to crawl (inclusive)
    #[serde(rename = "end-page")]
    pub end_page: u32,

    /// Number of detail workers, each owning one session
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Pause after every detail fetch (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay")]
    pub request_delay_ms: u64,

    /// Pause after every listing page (milliseconds)
    #[serde(rename = "page-delay-ms", default = "default_page_delay")]
    pub page_delay_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout")]
    pub timeout_secs: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Where records and the dedup snapshot live
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the dedup cache snapshot
    #[serde(rename = "cache-path")]
    pub cache_path: String,
}

/// Flush thresholds for each write operation
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(rename = "discovery-size", default = "default_discovery_size")]
    pub discovery_size: usize,

    #[serde(rename = "enrichment-size", default = "default_enrichment_size")]
    pub enrichment_size: usize,

    #[serde(rename = "amenity-size", default = "default_amenity_size")]
    pub amenity_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            discovery_size: default_discovery_size(),
            enrichment_size: default_enrichment_size(),
            amenity_size: default_amenity_size(),
        }
    }
}

/// Markup rules for listing pages
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingRules {
    /// One element per listing row
    #[serde(rename = "item-selector")]
    pub item_selector: String,

    /// Element (inside a row) carrying the link handler
    #[serde(rename = "link-selector")]
    pub link_selector: String,

    /// Attribute of the link element holding the handler text
    #[serde(rename = "link-attribute")]
    pub link_attribute: String,

    /// Regex over the handler text; its captures fill the identifier template
    #[serde(rename = "identifier-pattern")]
    pub identifier_pattern: String,

    /// Identifier URL with `{1}`, `{2}`... placeholders
    #[serde(rename = "identifier-template")]
    pub identifier_template: String,

    /// Category label elements inside a row
    #[serde(rename = "type-selector")]
    pub type_selector: String,
}

impl Default for ListingRules {
    fn default() -> Self {
        Self {
            item_selector: "div.myplace_list > ul > li".to_string(),
            link_selector: "div.txt > strong".to_string(),
            link_attribute: "onclick".to_string(),
            identifier_pattern: r"fncReserve\('(\d+)',\s*'([\w_]+)'\)".to_string(),
            identifier_template: concat!(
                "https://www.templestay.com/fe/MI000000000000000062/reserve/view.do",
                "?pageIndex=1&areaCd=&templestaySeq={1}&templeBookMarkId={2}",
                "&templeIdTmp=&areaSelect=&templeId=&templePrgType=&searchCnt=",
                "&searchStaDate=&searchEndDate=&searchKeyword="
            )
            .to_string(),
            type_selector: r#"span[class^="cate"]"#.to_string(),
        }
    }
}

/// Markup rules for detail pages
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetailRules {
    /// Root content container; its absence is a page-level failure
    #[serde(rename = "root-selector")]
    pub root_selector: String,

    #[serde(rename = "name-selector")]
    pub name_selector: String,

    /// Items of the composite name/address/phone block
    #[serde(rename = "info-item-selector")]
    pub info_item_selector: String,

    #[serde(rename = "address-label")]
    pub address_label: String,

    #[serde(rename = "phone-label")]
    pub phone_label: String,

    /// Delimiter between parent name and address in the address item
    #[serde(rename = "composite-delimiter")]
    pub composite_delimiter: String,

    /// Text that looks like a phone number even without a label
    #[serde(rename = "phone-hint-pattern")]
    pub phone_hint_pattern: String,

    #[serde(rename = "section-selector")]
    pub section_selector: String,

    #[serde(rename = "heading-selector")]
    pub heading_selector: String,

    #[serde(rename = "intro-heading")]
    pub intro_heading: String,

    #[serde(rename = "intro-body-selector")]
    pub intro_body_selector: String,

    #[serde(rename = "schedule-heading")]
    pub schedule_heading: String,

    #[serde(rename = "schedule-table-selector")]
    pub schedule_table_selector: String,

    #[serde(rename = "price-table-selector")]
    pub price_table_selector: String,

    /// Header text of the adult price column
    #[serde(rename = "price-label")]
    pub price_label: String,

    /// Currency text stripped from the price cell
    #[serde(rename = "currency-suffix")]
    pub currency_suffix: String,

    #[serde(rename = "gallery-selector")]
    pub gallery_selector: String,

    /// Substring identifying content images outside the gallery
    #[serde(rename = "content-image-pattern")]
    pub content_image_pattern: String,
}

impl Default for DetailRules {
    fn default() -> Self {
        Self {
            root_selector: "div.place".to_string(),
            name_selector: "h3".to_string(),
            info_item_selector: "div.info li".to_string(),
            address_label: "주소".to_string(),
            phone_label: "연락처".to_string(),
            composite_delimiter: ",".to_string(),
            phone_hint_pattern: r"\d{2,3}[-\s]?\d{3,4}[-\s]?\d{4}".to_string(),
            section_selector: "div.section".to_string(),
            heading_selector: "h4".to_string(),
            intro_heading: "프로그램 소개".to_string(),
            intro_body_selector: "div.txt".to_string(),
            schedule_heading: "프로그램 일정".to_string(),
            schedule_table_selector: "div.table table".to_string(),
            price_table_selector: "div.table table".to_string(),
            price_label: "성인".to_string(),
            currency_suffix: "원".to_string(),
            gallery_selector: "div.swiper-slide img".to_string(),
            content_image_pattern: "templePrg".to_string(),
        }
    }
}

fn default_start_page() -> u32 {
    1
}

fn default_workers() -> u32 {
    3
}

fn default_request_delay() -> u64 {
    200
}

fn default_page_delay() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    20
}

fn default_discovery_size() -> usize {
    100
}

fn default_enrichment_size() -> usize {
    100
}

fn default_amenity_size() -> usize {
    200
}
