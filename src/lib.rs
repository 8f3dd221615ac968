pub mod config;
pub mod generation;
pub mod server;
pub mod song_store;
pub mod status;
