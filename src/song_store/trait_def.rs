//! SongStore trait definition.

use super::models::{NewSong, Song, SongStatus, Variant};
use anyhow::Result;

/// Trait for song storage backends.
///
/// Fetch operations return `Ok(None)` when no row matches; an `Err` always
/// means the storage itself misbehaved, never "not found".
pub trait SongStore: Send + Sync {
    /// Get a song by its numeric id.
    fn get_song(&self, id: i64) -> Result<Option<Song>>;

    /// Get a song by its public slug.
    fn get_song_by_slug(&self, slug: &str) -> Result<Option<Song>>;

    /// Insert a new song row. Returns the stored song with its id and
    /// timestamps set.
    fn insert_song(&self, new: &NewSong) -> Result<Song>;

    /// Upsert the song's status and full variant snapshot in one write.
    ///
    /// Idempotent: calling it redundantly with the same data has no effect
    /// beyond bumping `updated_at`. The variant list replaces the stored
    /// snapshot wholesale.
    fn update_generation_state(
        &self,
        id: i64,
        status: SongStatus,
        variants: &[Variant],
        error_message: Option<&str>,
    ) -> Result<()>;
}
