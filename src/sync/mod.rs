//! Batch synchronizer
//!
//! Rows produced by the crawl stages are buffered here and applied to the
//! store in bounded transactions. A synchronizer cycles between two states:
//!
//! ```text
//! Accumulating --(threshold reached / finish)--> Flushing --> Accumulating
//! ```
//!
//! Each flush is all-or-nothing. A failed flush rolls back its whole batch,
//! clears the buffer and hands the rows back to the caller together with the
//! error; what happens next is the caller's decision.

use crate::storage::{
    AmenityRow, BatchOutcome, DiscoveredRow, EnrichmentRow, StorageError, StorageResult, Store,
};
use std::fmt;
use thiserror::Error;

/// A row kind the synchronizer knows how to apply
pub trait SyncRow: fmt::Debug + Sized {
    /// Stage name used in log lines
    const STAGE: &'static str;

    /// Applies one batch in a single transaction
    fn apply<S: Store + ?Sized>(store: &mut S, rows: &[Self]) -> StorageResult<BatchOutcome>;
}

impl SyncRow for DiscoveredRow {
    const STAGE: &'static str = "discovery";

    fn apply<S: Store + ?Sized>(store: &mut S, rows: &[Self]) -> StorageResult<BatchOutcome> {
        store.apply_discovered(rows)
    }
}

impl SyncRow for EnrichmentRow {
    const STAGE: &'static str = "enrichment";

    fn apply<S: Store + ?Sized>(store: &mut S, rows: &[Self]) -> StorageResult<BatchOutcome> {
        store.apply_enrichment(rows)
    }
}

impl SyncRow for AmenityRow {
    const STAGE: &'static str = "amenity";

    fn apply<S: Store + ?Sized>(store: &mut S, rows: &[Self]) -> StorageResult<BatchOutcome> {
        store.apply_amenities(rows)
    }
}

/// Current state of a synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Accumulating,
    Flushing,
}

/// A committed batch
#[derive(Debug)]
pub struct Flushed<R> {
    pub rows: Vec<R>,
    pub outcome: BatchOutcome,
}

/// A batch that was rolled back
#[derive(Debug, Error)]
#[error("{} batch of {} row(s) rolled back: {error}", R::STAGE, .rows.len())]
pub struct FlushFailure<R: SyncRow> {
    pub rows: Vec<R>,
    #[source]
    pub error: StorageError,
}

pub type FlushResult<R> = Result<Flushed<R>, FlushFailure<R>>;

/// Running totals over every flush of one synchronizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTotals {
    pub outcome: BatchOutcome,
    pub batches: u64,
    pub failed_batches: u64,
    /// Rows lost to rolled-back batches
    pub failed_rows: u64,
}

/// Buffers rows and applies them to a store in fixed-size transactions
///
/// The synchronizer is the only writer for its row kind; callers hand it rows
/// from a single task.
///
/// # Example
///
/// ```
/// use jeolloga_sync::storage::{DiscoveredRow, SqliteStore};
/// use jeolloga_sync::sync::BatchSynchronizer;
///
/// let mut store = SqliteStore::new_in_memory().unwrap();
/// let mut sync = BatchSynchronizer::new(100);
/// sync.add(&mut store, DiscoveredRow { identifier: "https://a".into(), type_bits: 1 });
/// let flushed = sync.finish(&mut store).unwrap().unwrap();
/// assert_eq!(flushed.outcome.inserted, 1);
/// ```
#[derive(Debug)]
pub struct BatchSynchronizer<R: SyncRow> {
    batch_size: usize,
    buffer: Vec<R>,
    state: SyncState,
    totals: SyncTotals,
}

impl<R: SyncRow> BatchSynchronizer<R> {
    /// Creates a synchronizer flushing every `batch_size` rows (at least one)
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            state: SyncState::Accumulating,
            totals: SyncTotals::default(),
        }
    }

    /// Buffers a row, flushing when the threshold is reached
    ///
    /// Returns the flush result if this row triggered one.
    pub fn add<S: Store + ?Sized>(&mut self, store: &mut S, row: R) -> Option<FlushResult<R>> {
        self.buffer.push(row);
        if self.buffer.len() >= self.batch_size {
            self.flush(store)
        } else {
            None
        }
    }

    /// Applies every buffered row in one transaction
    ///
    /// Returns `None` when nothing was buffered.
    pub fn flush<S: Store + ?Sized>(&mut self, store: &mut S) -> Option<FlushResult<R>> {
        if self.buffer.is_empty() {
            return None;
        }

        self.state = SyncState::Flushing;
        let rows = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.batch_size));
        let result = R::apply(store, &rows);
        self.state = SyncState::Accumulating;

        match result {
            Ok(outcome) => {
                self.totals.outcome += outcome;
                self.totals.batches += 1;
                tracing::info!(
                    "{}: committed batch of {} ({} inserted, {} updated, {} unchanged, {} dropped)",
                    R::STAGE,
                    rows.len(),
                    outcome.inserted,
                    outcome.updated,
                    outcome.unchanged,
                    outcome.dropped
                );
                Some(Ok(Flushed { rows, outcome }))
            }
            Err(error) => {
                self.totals.batches += 1;
                self.totals.failed_batches += 1;
                self.totals.failed_rows += rows.len() as u64;
                tracing::error!(
                    "{}: batch of {} rolled back: {}",
                    R::STAGE,
                    rows.len(),
                    error
                );
                Some(Err(FlushFailure { rows, error }))
            }
        }
    }

    /// Final flush at end of stream
    pub fn finish<S: Store + ?Sized>(&mut self, store: &mut S) -> Option<FlushResult<R>> {
        self.flush(store)
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Rows buffered but not yet applied
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn totals(&self) -> SyncTotals {
        self.totals
    }
}
