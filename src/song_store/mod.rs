mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{NewSong, Song, SongStatus, Variant, VariantStatus};
pub use store::SqliteSongStore;
pub use trait_def::SongStore;
