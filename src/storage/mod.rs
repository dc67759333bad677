//! Storage module for persisting catalog records
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Transactional batch application of discovered, enriched and amenity rows
//! - Cascading deletion of records that vanished upstream
//! - Run tracking for auditing

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{Store, StorageError, StorageResult};

use std::ops::AddAssign;

/// A record as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRow {
    pub id: i64,
    pub identifier: String,
    pub fields: RecordFields,
    pub created_at: String,
    pub updated_at: String,
}

/// The enrichable fields of a record, each independently present or absent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFields {
    pub display_name: Option<String>,
    pub parent_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    /// Serialized schedule (compact JSON object)
    pub schedule: Option<String>,
}

impl RecordFields {
    /// Overlays `update` on `self`: present values win, absent values keep ours
    pub fn merged_with(&self, update: &RecordFields) -> RecordFields {
        RecordFields {
            display_name: update.display_name.clone().or_else(|| self.display_name.clone()),
            parent_name: update.parent_name.clone().or_else(|| self.parent_name.clone()),
            address: update.address.clone().or_else(|| self.address.clone()),
            phone: update.phone.clone().or_else(|| self.phone.clone()),
            description: update.description.clone().or_else(|| self.description.clone()),
            schedule: update.schedule.clone().or_else(|| self.schedule.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.parent_name.is_none()
            && self.address.is_none()
            && self.phone.is_none()
            && self.description.is_none()
            && self.schedule.is_none()
    }
}

/// The derived filter row of a record
///
/// `None` means the dimension has never been computed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterRow {
    pub record_id: i64,
    pub type_bits: Option<u32>,
    pub activity_bits: Option<u32>,
    pub region_bits: Option<u32>,
    pub amenity_bits: Option<u32>,
    pub price: Option<i64>,
}

/// A listing candidate accepted for insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredRow {
    pub identifier: String,
    pub type_bits: u32,
}

/// Filter dimensions derived from one detail page
///
/// An absent dimension keeps its stored value; if it was never computed it
/// becomes zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterUpdate {
    pub activity_bits: Option<u32>,
    pub region_bits: Option<u32>,
    pub price: Option<i64>,
}

/// Everything extracted for one record from its detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentRow {
    pub record_id: i64,
    pub identifier: String,
    pub fields: RecordFields,
    pub filter: FilterUpdate,
    pub images: Vec<String>,
}

/// Amenity bits resolved to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmenityRow {
    pub record_id: i64,
    pub amenity_bits: u32,
}

/// A record due for detail enrichment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub record_id: i64,
    pub identifier: String,
}

/// Per-batch write accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    /// Rows whose parent record no longer exists
    pub dropped: u64,
    pub images: u64,
}

impl BatchOutcome {
    /// Rows that caused a write
    pub fn touched(&self) -> u64 {
        self.inserted + self.updated
    }
}

impl AddAssign for BatchOutcome {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.dropped += other.dropped;
        self.images += other.images;
    }
}

/// Rows removed by a cascading delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub records: u64,
    pub filters: u64,
    pub images: u64,
}

/// Aggregate counts over the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub records: u64,
    pub enriched: u64,
    pub filters: u64,
    pub images: u64,
    pub pending: u64,
}

/// Represents a pipeline run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub mode: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub touched: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
