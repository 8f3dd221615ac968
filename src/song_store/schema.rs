//! SQLite schema definitions for the song database.

use anyhow::Result;
use rusqlite::Transaction;

/// Offset added to the schema version stored in `PRAGMA user_version`,
/// so an untouched database (version 0) is distinguishable from one
/// created at schema version 0.
pub const BASE_DB_VERSION: usize = 100;

/// One version of the song database schema.
///
/// `create_sql` builds the schema from scratch at this version;
/// `migration` upgrades a database from the previous version.
pub struct VersionedSchema {
    pub version: usize,
    pub create_sql: &'static str,
    pub migration: Option<fn(&Transaction) -> Result<()>>,
}

const SONGS_SCHEMA_V0: &str = "
CREATE TABLE songs (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    slug             TEXT UNIQUE,
    task_id          TEXT,
    status           TEXT NOT NULL DEFAULT 'PENDING',
    variants         TEXT NOT NULL DEFAULT '[]',
    selected_variant INTEGER NOT NULL DEFAULT 0,
    timed_lyrics     TEXT,
    error_message    TEXT,
    created_at       INTEGER NOT NULL,
    updated_at       INTEGER NOT NULL
);
CREATE INDEX idx_songs_task_id ON songs(task_id);
";

pub const SONG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    create_sql: SONGS_SCHEMA_V0,
    migration: None,
}];
