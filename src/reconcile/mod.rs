//! Reconciliation of the store against a complete upstream listing
//!
//! Records whose identifier is absent from the known set are deleted together
//! with their filter and image rows. The known set must come from a complete,
//! uninterrupted listing traversal; a partial set would delete live records.

use crate::storage::{DeleteOutcome, StorageResult, Store};
use std::collections::HashSet;

/// What a reconciliation pass found and removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records in the store before the pass
    pub stored: usize,
    /// Identifiers supplied as currently live
    pub known: usize,
    /// Identifiers that were deleted
    pub stale: Vec<String>,
    pub deleted: DeleteOutcome,
}

/// Deletes every stored record whose identifier is not in `known`
///
/// An empty stale set is a no-op. Deletion of the stale set happens in a
/// single transaction.
///
/// # Arguments
///
/// * `store` - The store to reconcile
/// * `known` - Identifiers seen by a complete listing traversal
///
/// # Returns
///
/// A report of the stale identifiers and the rows removed
pub fn reconcile<S: Store + ?Sized>(
    store: &mut S,
    known: &HashSet<String>,
) -> StorageResult<ReconcileReport> {
    let stored = store.all_identifiers()?;

    let (stale_ids, stale): (Vec<i64>, Vec<String>) = stored
        .iter()
        .filter(|(_, identifier)| !known.contains(identifier))
        .cloned()
        .unzip();

    let mut report = ReconcileReport {
        stored: stored.len(),
        known: known.len(),
        stale,
        deleted: DeleteOutcome::default(),
    };

    if stale_ids.is_empty() {
        tracing::info!(
            "reconcile: all {} stored records are still listed",
            report.stored
        );
        return Ok(report);
    }

    for identifier in &report.stale {
        tracing::warn!("reconcile: {} no longer listed, deleting", identifier);
    }

    report.deleted = store.delete_records(&stale_ids)?;

    tracing::info!(
        "reconcile: deleted {} records, {} filters, {} images",
        report.deleted.records,
        report.deleted.filters,
        report.deleted.images
    );

    Ok(report)
}
