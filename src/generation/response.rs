//! Status API response builder.
//!
//! Pure shaping of `(status, variant snapshot)` into the stable envelope
//! the HTTP layer returns. Contains no business logic and never decides a
//! status on its own.

use crate::song_store::{SongStatus, Variant, VariantStatus};
use crate::status;
use serde::Serialize;

/// Fixed error code reported for songs in the terminal FAILED state.
pub const ERROR_CODE_GENERATION_FAILED: &str = "GENERATION_FAILED";

const DEFAULT_FAILURE_MESSAGE: &str = "Song generation failed";

/// Per-variant slice of the response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct VariantEntry {
    pub id: String,
    pub status: VariantStatus,
    pub stream_url: Option<String>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub duration_secs: f64,
}

/// Response envelope for a song status query.
///
/// `error_code`/`error_message` are populated for FAILED songs and for
/// client-reported API errors; null for every other status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: SongStatus,
    pub variants: Vec<VariantEntry>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl StatusResponse {
    /// Build the envelope from a persisted (status, snapshot) pair.
    pub fn from_state(
        song_status: SongStatus,
        variants: &[Variant],
        error_message: Option<&str>,
    ) -> Self {
        let entries = variants
            .iter()
            .map(|v| VariantEntry {
                id: v.id.clone(),
                status: status::variant_status(v),
                stream_url: v.stream_url.clone().or_else(|| v.source_stream_url.clone()),
                audio_url: v.audio_url.clone().or_else(|| v.source_audio_url.clone()),
                image_url: v.image_url.clone(),
                duration_secs: v.duration_secs,
            })
            .collect();

        let (error_code, error_message) = if song_status == SongStatus::Failed {
            (
                Some(ERROR_CODE_GENERATION_FAILED.to_string()),
                Some(
                    error_message
                        .unwrap_or(DEFAULT_FAILURE_MESSAGE)
                        .to_string(),
                ),
            )
        } else {
            (None, None)
        };

        Self {
            status: song_status,
            variants: entries,
            error_code,
            error_message,
        }
    }

    /// Attach a client-reported API error to an otherwise ordinary
    /// envelope. The status itself is untouched: failure propagation is
    /// explicit and the state machine is not involved.
    pub fn with_client_error(mut self, code: i64, message: impl Into<String>) -> Self {
        self.error_code = Some(format!("API_ERROR_{}", code));
        self.error_message = Some(message.into());
        self
    }
}
