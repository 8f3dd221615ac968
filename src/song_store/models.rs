//! Data models for songs and their generated audio variants.
//!
//! A song is one user-facing generation job. Each job produces one or more
//! candidate audio renderings (variants) that become progressively more
//! complete as the external generation service works: first metadata only,
//! then a streaming preview URL, finally a stable downloadable file.

use serde::{Deserialize, Serialize};

/// Readiness of a single audio variant, derived from its URL fields.
///
/// Never persisted independently of the raw URLs; always recomputed from
/// them (see `crate::status`). Declaration order matters: it is the
/// forward progression of a variant's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariantStatus {
    /// No playable URL yet.
    Pending,
    /// Streaming preview available, no stable download yet.
    StreamReady,
    /// Stable downloadable audio available.
    DownloadReady,
}

impl VariantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::StreamReady => "STREAM_READY",
            Self::DownloadReady => "DOWNLOAD_READY",
        }
    }
}

/// Song-level status, persisted on the song row.
///
/// Forward path is `Pending -> StreamAvailable -> Completed`; `Failed` is an
/// orthogonal terminal state entered only by an explicit job-failure signal
/// from the generation service, never derived from variant data alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SongStatus {
    /// Job accepted, no playable audio yet.
    Pending,
    /// At least one variant can be streamed.
    StreamAvailable,
    /// Every variant has a stable downloadable file.
    Completed,
    /// The generation job reported a non-recoverable error.
    Failed,
}

impl SongStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::StreamAvailable => "STREAM_AVAILABLE",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "STREAM_AVAILABLE" => Some(Self::StreamAvailable),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states are never refreshed again by the engine.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One candidate audio rendering of a song.
///
/// Variant lists are always replaced wholesale when new data arrives from
/// the generation job; there is no per-variant mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Opaque id assigned by the generation job.
    pub id: String,
    /// Streaming preview URL, present once the job starts rendering.
    #[serde(default)]
    pub stream_url: Option<String>,
    /// Source-quality streaming URL.
    #[serde(default)]
    pub source_stream_url: Option<String>,
    /// Stable downloadable audio URL, present once rendering finishes.
    #[serde(default)]
    pub audio_url: Option<String>,
    /// Source-quality download URL.
    #[serde(default)]
    pub source_audio_url: Option<String>,
    /// Cover image URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Duration in seconds, 0 when not yet known.
    #[serde(default)]
    pub duration_secs: f64,
    /// Free-text prompt the variant was generated from.
    #[serde(default)]
    pub prompt: String,
    /// Generation model name.
    #[serde(default)]
    pub model_name: String,
    /// Comma-separated style tags.
    #[serde(default)]
    pub tags: String,
    /// Unix seconds when the generation job created this variant.
    #[serde(default)]
    pub created_at: i64,
}

impl Variant {
    pub fn has_stream_url(&self) -> bool {
        self.stream_url.is_some() || self.source_stream_url.is_some()
    }

    pub fn has_download_url(&self) -> bool {
        self.audio_url.is_some() || self.source_audio_url.is_some()
    }
}

/// One user-facing generation job with its current variant snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Song {
    pub id: i64,
    /// Stable public identifier, if one was assigned.
    pub slug: Option<String>,
    /// External generation job task id. Demo task ids carry a fixed prefix.
    pub task_id: Option<String>,
    pub status: SongStatus,
    /// Current variant snapshot (full replacement, never a diff).
    pub variants: Vec<Variant>,
    /// Index of the variant selected as primary for playback.
    pub selected_variant: usize,
    /// Timestamped lyrics keyed by variant id. Produced by a separate
    /// subsystem; opaque to the reconciliation engine.
    pub timed_lyrics: Option<serde_json::Value>,
    /// Error message from the last job-failure signal, if any.
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Data needed to create a song row when a generation job is started.
#[derive(Debug, Clone)]
pub struct NewSong {
    pub slug: Option<String>,
    pub task_id: Option<String>,
    pub status: SongStatus,
    pub variants: Vec<Variant>,
}

impl Default for NewSong {
    fn default() -> Self {
        Self {
            slug: None,
            task_id: None,
            status: SongStatus::Pending,
            variants: Vec::new(),
        }
    }
}
