//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Store trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Store, StorageError, StorageResult};
use crate::storage::{
    AmenityRow, BatchOutcome, DeleteOutcome, DiscoveredRow, EnrichmentRow, FilterRow, FilterUpdate,
    RecordFields, RecordRow, RunRecord, RunStatus, StoreStats, WorkUnit,
};
use crate::SyncError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
///
/// Owns a single connection; all writes are serialized through it.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and applies the schema
    pub fn new(path: &Path) -> Result<Self, SyncError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (tests and dry runs)
    pub fn new_in_memory() -> Result<Self, SyncError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Gets a record by identifier
    pub fn get_record(&self, identifier: &str) -> StorageResult<Option<RecordRow>> {
        let record = self
            .conn
            .query_row(
                "SELECT id, identifier, display_name, parent_name, address, phone, description,
                 schedule, created_at, updated_at
                 FROM records WHERE identifier = ?1",
                params![identifier],
                |row| {
                    Ok(RecordRow {
                        id: row.get(0)?,
                        identifier: row.get(1)?,
                        fields: RecordFields {
                            display_name: row.get(2)?,
                            parent_name: row.get(3)?,
                            address: row.get(4)?,
                            phone: row.get(5)?,
                            description: row.get(6)?,
                            schedule: row.get(7)?,
                        },
                        created_at: row.get(8)?,
                        updated_at: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Gets the filter row of a record
    pub fn get_filter(&self, record_id: i64) -> StorageResult<Option<FilterRow>> {
        load_filter(&self.conn, record_id)
    }

    /// Image URLs stored for a record, in insertion order
    pub fn get_images(&self, record_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT image_url FROM images WHERE record_id = ?1 ORDER BY id")?;
        let images = stmt
            .query_map(params![record_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(images)
    }
}

impl Store for SqliteStore {
    // ===== Batch Application =====

    fn apply_discovered(&mut self, rows: &[DiscoveredRow]) -> StorageResult<BatchOutcome> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut outcome = BatchOutcome::default();

        for row in rows {
            let inserted = tx.execute(
                "INSERT INTO records (identifier, created_at, updated_at) VALUES (?1, ?2, ?2)
                 ON CONFLICT(identifier) DO NOTHING",
                params![row.identifier, now],
            )?;

            let record_id: Option<i64> = tx
                .query_row(
                    "SELECT id FROM records WHERE identifier = ?1",
                    params![row.identifier],
                    |r| r.get(0),
                )
                .optional()?;

            let Some(record_id) = record_id else {
                tracing::warn!(
                    "discovery: no record for {} after insert, dropping filter row",
                    row.identifier
                );
                outcome.dropped += 1;
                continue;
            };

            let existing = load_filter(&tx, record_id)?;
            let next = FilterRow {
                type_bits: Some(row.type_bits),
                ..existing.clone().unwrap_or_else(|| empty_filter(record_id))
            };
            let filter_changed = existing.as_ref() != Some(&next);
            if filter_changed {
                upsert_filter(&tx, &next)?;
            }

            if inserted == 1 {
                outcome.inserted += 1;
            } else if filter_changed {
                outcome.updated += 1;
            } else {
                outcome.unchanged += 1;
            }
        }

        tx.commit()?;
        Ok(outcome)
    }

    fn apply_enrichment(&mut self, rows: &[EnrichmentRow]) -> StorageResult<BatchOutcome> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut outcome = BatchOutcome::default();

        for row in rows {
            let Some(current) = load_fields(&tx, row.record_id)? else {
                tracing::warn!(
                    "enrichment: record {} vanished before write, dropping row",
                    row.identifier
                );
                outcome.dropped += 1;
                continue;
            };

            let merged = current.merged_with(&row.fields);
            let record_changed = merged != current;
            if record_changed {
                tx.execute(
                    "UPDATE records SET display_name = ?1, parent_name = ?2, address = ?3,
                     phone = ?4, description = ?5, schedule = ?6, updated_at = ?7
                     WHERE id = ?8",
                    params![
                        merged.display_name,
                        merged.parent_name,
                        merged.address,
                        merged.phone,
                        merged.description,
                        merged.schedule,
                        now,
                        row.record_id
                    ],
                )?;
            }

            let filter_changed = apply_filter_update(&tx, row.record_id, &row.filter)?;

            // At-least-once: images are appended without checking earlier runs
            for image_url in &row.images {
                tx.execute(
                    "INSERT INTO images (record_id, image_url, created_at) VALUES (?1, ?2, ?3)",
                    params![row.record_id, image_url, now],
                )?;
                outcome.images += 1;
            }

            if record_changed || filter_changed {
                tracing::debug!("enrichment: {} changed", row.identifier);
                outcome.updated += 1;
            } else {
                tracing::debug!("enrichment: {} unchanged", row.identifier);
                outcome.unchanged += 1;
            }
        }

        tx.commit()?;
        Ok(outcome)
    }

    fn apply_amenities(&mut self, rows: &[AmenityRow]) -> StorageResult<BatchOutcome> {
        let tx = self.conn.transaction()?;
        let mut outcome = BatchOutcome::default();

        for row in rows {
            let exists: Option<i64> = tx
                .query_row(
                    "SELECT id FROM records WHERE id = ?1",
                    params![row.record_id],
                    |r| r.get(0),
                )
                .optional()?;

            if exists.is_none() {
                tracing::warn!(
                    "amenity: record id {} no longer exists, dropping row",
                    row.record_id
                );
                outcome.dropped += 1;
                continue;
            }

            let existing = load_filter(&tx, row.record_id)?;
            let next = FilterRow {
                amenity_bits: Some(row.amenity_bits),
                ..existing.clone().unwrap_or_else(|| empty_filter(row.record_id))
            };

            if existing.as_ref() == Some(&next) {
                outcome.unchanged += 1;
            } else {
                upsert_filter(&tx, &next)?;
                outcome.updated += 1;
            }
        }

        tx.commit()?;
        Ok(outcome)
    }

    // ===== Queries =====

    fn enrichment_targets(&self, refresh_all: bool) -> StorageResult<Vec<WorkUnit>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.identifier
             FROM records r
             LEFT JOIN filters f ON f.record_id = r.id
             WHERE ?1 = 1
                OR r.display_name IS NULL
                OR f.record_id IS NULL
                OR f.activity_bits IS NULL
                OR f.region_bits IS NULL
                OR f.price IS NULL
             ORDER BY r.id",
        )?;

        let units = stmt
            .query_map(params![refresh_all as i64], |row| {
                Ok(WorkUnit {
                    record_id: row.get(0)?,
                    identifier: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(units)
    }

    fn all_identifiers(&self) -> StorageResult<Vec<(i64, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, identifier FROM records ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn parent_names(&self) -> StorageResult<Vec<(i64, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, parent_name FROM records WHERE parent_name IS NOT NULL ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn stats(&self) -> StorageResult<StoreStats> {
        let count = |sql: &str| -> StorageResult<u64> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };

        Ok(StoreStats {
            records: count("SELECT COUNT(*) FROM records")?,
            enriched: count("SELECT COUNT(*) FROM records WHERE display_name IS NOT NULL")?,
            filters: count("SELECT COUNT(*) FROM filters")?,
            images: count("SELECT COUNT(*) FROM images")?,
            pending: self.enrichment_targets(false)?.len() as u64,
        })
    }

    // ===== Deletion =====

    fn delete_records(&mut self, ids: &[i64]) -> StorageResult<DeleteOutcome> {
        let tx = self.conn.transaction()?;
        let mut outcome = DeleteOutcome::default();

        {
            let mut delete_filters = tx.prepare("DELETE FROM filters WHERE record_id = ?1")?;
            let mut delete_images = tx.prepare("DELETE FROM images WHERE record_id = ?1")?;
            let mut delete_record = tx.prepare("DELETE FROM records WHERE id = ?1")?;

            // Dependents first so the delete never relies on cascade support
            for id in ids {
                outcome.filters += delete_filters.execute(params![id])? as u64;
                outcome.images += delete_images.execute(params![id])? as u64;
                outcome.records += delete_record.execute(params![id])? as u64;
            }
        }

        tx.commit()?;
        Ok(outcome)
    }

    // ===== Run Management =====

    fn create_run(&mut self, mode: &str, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (mode, started_at, config_hash, status) VALUES (?1, ?2, ?3, ?4)",
            params![mode, now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        touched: u64,
        skipped: u64,
        failed: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, touched = ?3, skipped = ?4, failed = ?5
             WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                touched as i64,
                skipped as i64,
                failed as i64,
                run_id
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, mode, started_at, finished_at, config_hash, status, touched, skipped, failed
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        mode: row.get(1)?,
                        started_at: row.get(2)?,
                        finished_at: row.get(3)?,
                        config_hash: row.get(4)?,
                        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
                            .unwrap_or(RunStatus::Failed),
                        touched: row.get::<_, i64>(6)? as u64,
                        skipped: row.get::<_, i64>(7)? as u64,
                        failed: row.get::<_, i64>(8)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }
}

fn empty_filter(record_id: i64) -> FilterRow {
    FilterRow {
        record_id,
        ..FilterRow::default()
    }
}

fn load_fields(conn: &Connection, record_id: i64) -> StorageResult<Option<RecordFields>> {
    let fields = conn
        .query_row(
            "SELECT display_name, parent_name, address, phone, description, schedule
             FROM records WHERE id = ?1",
            params![record_id],
            |row| {
                Ok(RecordFields {
                    display_name: row.get(0)?,
                    parent_name: row.get(1)?,
                    address: row.get(2)?,
                    phone: row.get(3)?,
                    description: row.get(4)?,
                    schedule: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(fields)
}

fn load_filter(conn: &Connection, record_id: i64) -> StorageResult<Option<FilterRow>> {
    let filter = conn
        .query_row(
            "SELECT record_id, type_bits, activity_bits, region_bits, amenity_bits, price
             FROM filters WHERE record_id = ?1",
            params![record_id],
            |row| {
                Ok(FilterRow {
                    record_id: row.get(0)?,
                    type_bits: row.get(1)?,
                    activity_bits: row.get(2)?,
                    region_bits: row.get(3)?,
                    amenity_bits: row.get(4)?,
                    price: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(filter)
}

fn upsert_filter(conn: &Connection, filter: &FilterRow) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO filters (record_id, type_bits, activity_bits, region_bits, amenity_bits, price)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(record_id) DO UPDATE SET
             type_bits = excluded.type_bits,
             activity_bits = excluded.activity_bits,
             region_bits = excluded.region_bits,
             amenity_bits = excluded.amenity_bits,
             price = excluded.price",
        params![
            filter.record_id,
            filter.type_bits,
            filter.activity_bits,
            filter.region_bits,
            filter.amenity_bits,
            filter.price
        ],
    )?;
    Ok(())
}

/// Applies derived dimensions; returns whether the filter row changed
///
/// A dimension absent from the update keeps its stored value, or becomes zero
/// if it was never computed.
fn apply_filter_update(
    conn: &Connection,
    record_id: i64,
    update: &FilterUpdate,
) -> StorageResult<bool> {
    let existing = load_filter(conn, record_id)?;
    let base = existing.clone().unwrap_or_else(|| empty_filter(record_id));
    let next = FilterRow {
        activity_bits: Some(update.activity_bits.or(base.activity_bits).unwrap_or(0)),
        region_bits: Some(update.region_bits.or(base.region_bits).unwrap_or(0)),
        price: Some(update.price.or(base.price).unwrap_or(0)),
        ..base
    };

    if existing.as_ref() == Some(&next) {
        return Ok(false);
    }
    upsert_filter(conn, &next)?;
    Ok(true)
}
