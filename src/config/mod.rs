//! Configuration module for Jeolloga-Sync
//!
//! This module handles loading, parsing, and validating TOML configuration files:
//! crawl range and pacing, storage locations, batch sizes, bit vocabularies, and
//! the markup rules used by the extractors.
//!
//! # Example
//!
//! ```no_run
//! use jeolloga_sync::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("jeolloga.toml")).unwrap();
//! println!("Crawling pages {}..={}", config.crawler.start_page, config.crawler.end_page);
//! ```

mod amenities;
mod parser;
mod types;
mod validation;

pub use types::{
    BatchConfig, Config, CrawlerConfig, DetailRules, ListingRules, StorageConfig,
    UserAgentConfig,
};

pub use amenities::{load_amenities, parse_amenities, AmenityEntry};
pub use parser::{compute_config_hash, load_config, load_config_with_hash};

pub(crate) use validation::{compile_pattern, compile_selector};
