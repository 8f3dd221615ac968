//! SQLite-backed song store implementation.

use super::models::{NewSong, Song, SongStatus, Variant};
use super::schema::{BASE_DB_VERSION, SONG_VERSIONED_SCHEMAS};
use super::trait_def::SongStore;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// SQLite-backed song store.
///
/// Uses the usual dual-connection setup: one read-only connection and one
/// write connection, both in WAL mode so readers never block the writer.
#[derive(Clone)]
pub struct SqliteSongStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

fn migrate_if_needed(conn: &mut Connection) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    let latest_version = SONG_VERSIONED_SCHEMAS.len() - 1;
    let latest_schema = &SONG_VERSIONED_SCHEMAS[latest_version];

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!("Creating song db schema at version {}", latest_version);
        conn.execute_batch(latest_schema.create_sql)?;
        conn.pragma_update(None, "user_version", BASE_DB_VERSION + latest_version)?;
        return Ok(());
    }

    let mut current_version = if db_version < BASE_DB_VERSION as i64 {
        0
    } else {
        (db_version - BASE_DB_VERSION as i64) as usize
    };

    if current_version >= latest_version {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for schema in SONG_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating song db from version {} to {}",
                current_version, schema.version
            );
            migration_fn(&tx)?;
            current_version = schema.version;
        }
    }
    tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
    tx.commit()?;
    Ok(())
}

impl SqliteSongStore {
    /// Create a new SqliteSongStore, creating the database if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open song database")?;

        migrate_if_needed(&mut write_conn)?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on song write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open song database for reading")?;

        read_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on song read connection")?;

        let count: i64 = read_conn.query_row("SELECT COUNT(*) FROM songs", [], |r| r.get(0))?;
        info!("Song store ready: {} songs", count);

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }
}

const SONG_COLUMNS: &str = "id, slug, task_id, status, variants, selected_variant, \
                            timed_lyrics, error_message, created_at, updated_at";

// Helper: serialize the variant snapshot to its JSON column form.
fn variants_to_json(variants: &[Variant]) -> Result<String> {
    serde_json::to_string(variants).context("Failed to serialize variant snapshot")
}

// Helper: deserialize the JSON variant column. A malformed snapshot degrades
// to an empty list rather than poisoning every read of the row.
fn parse_variants(json: &str) -> Vec<Variant> {
    serde_json::from_str(json).unwrap_or_else(|e| {
        warn!("Malformed variant snapshot in song db: {}", e);
        Vec::new()
    })
}

fn parse_timed_lyrics(json: Option<String>) -> Option<serde_json::Value> {
    json.and_then(|s| {
        serde_json::from_str(&s)
            .map_err(|e| warn!("Malformed timed lyrics in song db: {}", e))
            .ok()
    })
}

fn row_to_song(row: &Row) -> rusqlite::Result<Song> {
    let status_str: String = row.get(3)?;
    let variants_json: String = row.get(4)?;
    Ok(Song {
        id: row.get(0)?,
        slug: row.get(1)?,
        task_id: row.get(2)?,
        // An unrecognized status is treated as Pending, which fails open
        // toward refreshing (see the reconciler).
        status: SongStatus::parse(&status_str).unwrap_or_else(|| {
            warn!("Unrecognized song status in db: {}", status_str);
            SongStatus::Pending
        }),
        variants: parse_variants(&variants_json),
        selected_variant: row.get::<_, i64>(5)? as usize,
        timed_lyrics: parse_timed_lyrics(row.get(6)?),
        error_message: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl SongStore for SqliteSongStore {
    fn get_song(&self, id: i64) -> Result<Option<Song>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM songs WHERE id = ?1",
            SONG_COLUMNS
        ))?;
        let result = stmt.query_row(params![id], row_to_song).optional()?;
        Ok(result)
    }

    fn get_song_by_slug(&self, slug: &str) -> Result<Option<Song>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM songs WHERE slug = ?1",
            SONG_COLUMNS
        ))?;
        let result = stmt.query_row(params![slug], row_to_song).optional()?;
        Ok(result)
    }

    fn insert_song(&self, new: &NewSong) -> Result<Song> {
        let now = chrono::Utc::now().timestamp();
        let variants_json = variants_to_json(&new.variants)?;
        let id = {
            let conn = self.write_conn.lock().unwrap();
            conn.execute(
                "INSERT INTO songs (slug, task_id, status, variants, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![new.slug, new.task_id, new.status.as_str(), variants_json, now],
            )?;
            conn.last_insert_rowid()
        };
        self.get_song(id)?
            .context("Inserted song row disappeared before readback")
    }

    fn update_generation_state(
        &self,
        id: i64,
        status: SongStatus,
        variants: &[Variant],
        error_message: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let variants_json = variants_to_json(variants)?;
        let conn = self.write_conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE songs
             SET status = ?2, variants = ?3, error_message = ?4, updated_at = ?5
             WHERE id = ?1",
            params![id, status.as_str(), variants_json, error_message, now],
        )?;
        if updated == 0 {
            warn!("update_generation_state: no song row with id {}", id);
        }
        Ok(())
    }
}
