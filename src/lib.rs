//! Jeolloga-Sync: incremental catalog crawler and store synchronizer
//!
//! This crate walks a paginated catalog site, enriches every discovered record
//! from its detail page, encodes categorical attributes into bitmasks, and keeps
//! a SQLite store in step with the catalog across repeated runs.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod encoder;
pub mod output;
pub mod reconcile;
pub mod storage;
pub mod sync;

use thiserror::Error;

/// Main error type for Jeolloga-Sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cache snapshot error at {path}: {message}")]
    Cache { path: String, message: String },

    #[error("Listing traversal incomplete: {failed_pages} page(s) failed, {unparsed_rows} unreadable row(s), end of listing reached: {reached_end}")]
    IncompleteTraversal {
        failed_pages: usize,
        unparsed_rows: usize,
        reached_end: bool,
    },

    #[error("Listing traversal found no records; refusing to reconcile against an empty set")]
    EmptyListing,

    #[error("Worker pool error: {0}")]
    Pool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Errors from a single page retrieval
///
/// Fetch errors are never retried by the fetcher itself; the caller decides.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {code} for {url}")]
    HttpStatus { url: String, code: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Session error: {0}")]
    Session(String),
}

/// Result type alias for Jeolloga-Sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cache::DedupCache;
pub use config::Config;
pub use encoder::{encode, normalize_name, Vocabulary};
pub use reconcile::reconcile;
pub use sync::BatchSynchronizer;
