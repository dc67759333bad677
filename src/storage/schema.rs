//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Jeolloga-Sync database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track pipeline runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    mode TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    touched INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0
);

-- One row per catalog item
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier TEXT NOT NULL UNIQUE CHECK (length(identifier) > 0),
    display_name TEXT,
    parent_name TEXT,
    address TEXT,
    phone TEXT,
    description TEXT,
    schedule TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_parent_name ON records(parent_name);

-- Derived bitmask filters, one per record
CREATE TABLE IF NOT EXISTS filters (
    record_id INTEGER PRIMARY KEY REFERENCES records(id) ON DELETE CASCADE,
    type_bits INTEGER CHECK (type_bits >= 0),
    activity_bits INTEGER CHECK (activity_bits >= 0),
    region_bits INTEGER CHECK (region_bits >= 0),
    amenity_bits INTEGER CHECK (amenity_bits >= 0),
    price INTEGER CHECK (price >= 0)
);

-- Images, appended on every successful enrichment
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id INTEGER NOT NULL REFERENCES records(id) ON DELETE CASCADE,
    image_url TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_images_record ON images(record_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
