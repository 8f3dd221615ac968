//! Database reconciliation service.
//!
//! Decides whether the persisted song row alone can answer a status query,
//! and owns all writes the refresh cycles perform. The stored status column
//! is the source of truth for what has already been committed; recomputing
//! from the stored snapshot is done for comparison logging only.

use crate::song_store::{Song, SongStatus, SongStore, Variant};
use crate::status;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Outcome of asking "can the database alone answer this query?".
#[derive(Debug, Clone)]
pub struct DatabaseDecision {
    /// The persisted status column, authoritative for this response.
    pub status: SongStatus,
    /// The persisted variant snapshot.
    pub variants: Vec<Variant>,
    /// True when the persisted state is terminal and no refresh may run.
    pub should_return: bool,
}

pub struct Reconciler {
    store: Arc<dyn SongStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn SongStore>) -> Self {
        Self { store }
    }

    /// Whether a refresh cycle may be started for this song.
    ///
    /// Terminal persisted states are never re-fetched. Anything else,
    /// including a status we do not recognize, fails open toward
    /// refreshing.
    pub fn is_refresh_needed(song: &Song) -> bool {
        !song.status.is_terminal()
    }

    /// Answer a status query from the persisted row.
    ///
    /// The status is recomputed from the stored snapshot purely to detect
    /// drift; the value handed back is always the persisted column.
    pub fn respond_from_database(&self, song: &Song) -> DatabaseDecision {
        let recomputed = status::song_status(&song.variants);
        if song.status != SongStatus::Failed && recomputed.song_status != song.status {
            // Stale is expected mid-refresh; a persistent mismatch would
            // mean a write skipped the aggregator.
            debug!(
                song_id = song.id,
                persisted = song.status.as_str(),
                recomputed = recomputed.song_status.as_str(),
                "Persisted status differs from recomputed snapshot status"
            );
        }

        DatabaseDecision {
            status: song.status,
            variants: song.variants.clone(),
            should_return: song.status.is_terminal(),
        }
    }

    /// Persist the result of a refresh cycle: status plus the full variant
    /// snapshot, as one idempotent upsert.
    ///
    /// A failed write is logged and swallowed; the read path stays
    /// available and the next refresh cycle retries the write.
    pub fn persist_refresh(
        &self,
        song_id: i64,
        status: SongStatus,
        variants: &[Variant],
        error_message: Option<&str>,
    ) {
        if let Err(e) = self
            .store
            .update_generation_state(song_id, status, variants, error_message)
        {
            error!(
                song_id = song_id,
                status = status.as_str(),
                "Failed to persist refreshed generation state: {:#}",
                e
            );
        }
    }

    /// Re-read the persisted row after a write, so the response reflects
    /// whatever write landed last.
    pub fn reload(&self, song_id: i64) -> Option<Song> {
        match self.store.get_song(song_id) {
            Ok(song) => song,
            Err(e) => {
                warn!(song_id = song_id, "Failed to re-read song row: {:#}", e);
                None
            }
        }
    }
}
