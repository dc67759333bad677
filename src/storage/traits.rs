//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    AmenityRow, BatchOutcome, DeleteOutcome, DiscoveredRow, EnrichmentRow, RunRecord, RunStatus,
    StoreStats, WorkUnit,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    /// A row broke a CHECK, NOT NULL or UNIQUE constraint
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::ConstraintViolation(
                    message.clone().unwrap_or_else(|| failure.to_string()),
                )
            }
            _ => StorageError::Sqlite(err),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every `apply_*` method runs inside a single transaction: either all rows of
/// the slice are applied or none are.
pub trait Store {
    // ===== Batch Application =====

    /// Inserts unseen identifiers (existing ones are left alone) and writes
    /// their filter type bits
    fn apply_discovered(&mut self, rows: &[DiscoveredRow]) -> StorageResult<BatchOutcome>;

    /// Merges detail extraction results into existing records
    ///
    /// Records and filters are only written when a compared value differs.
    /// Rows whose record no longer exists are dropped.
    fn apply_enrichment(&mut self, rows: &[EnrichmentRow]) -> StorageResult<BatchOutcome>;

    /// Writes amenity bits for existing records, dropping rows for missing ones
    fn apply_amenities(&mut self, rows: &[AmenityRow]) -> StorageResult<BatchOutcome>;

    // ===== Queries =====

    /// Records due for enrichment (all records when `refresh_all`)
    fn enrichment_targets(&self, refresh_all: bool) -> StorageResult<Vec<WorkUnit>>;

    /// Every stored `(id, identifier)` pair
    fn all_identifiers(&self) -> StorageResult<Vec<(i64, String)>>;

    /// Every `(id, parent_name)` pair with a known parent name
    fn parent_names(&self) -> StorageResult<Vec<(i64, String)>>;

    fn stats(&self) -> StorageResult<StoreStats>;

    // ===== Deletion =====

    /// Deletes the records and all their dependent rows in one transaction
    fn delete_records(&mut self, ids: &[i64]) -> StorageResult<DeleteOutcome>;

    // ===== Run Management =====

    fn create_run(&mut self, mode: &str, config_hash: &str) -> StorageResult<i64>;

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        touched: u64,
        skipped: u64,
        failed: u64,
    ) -> StorageResult<()>;

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;
}
