//! Pure status calculators.
//!
//! These functions are the only place variant and song statuses are ever
//! derived. They take no dependencies, perform no I/O and never fail:
//! absent URLs and empty variant lists are valid inputs, not errors.

use crate::song_store::{SongStatus, Variant, VariantStatus};

/// Derive a variant's status from its URL fields.
///
/// Download capability supersedes streaming capability: a variant with a
/// download URL is `DownloadReady` even if it somehow lacks a streaming URL.
pub fn variant_status(variant: &Variant) -> VariantStatus {
    if variant.has_download_url() {
        VariantStatus::DownloadReady
    } else if variant.has_stream_url() {
        VariantStatus::StreamReady
    } else {
        VariantStatus::Pending
    }
}

/// Result of aggregating all variants of a song into one song-level status.
#[derive(Debug, Clone, PartialEq)]
pub struct SongStatusCalculation {
    pub song_status: SongStatus,
    pub variant_statuses: Vec<VariantStatus>,
    pub has_any_stream_ready: bool,
    pub has_any_download_ready: bool,
    pub all_download_ready: bool,
}

/// Aggregate a variant snapshot into a song-level status.
///
/// An empty snapshot is `Pending`. The song is `Completed` only when every
/// variant is download-ready, `StreamAvailable` when anything is playable.
/// This function never produces `Failed`; that is an external signal, and
/// not regressing an already terminal persisted status is the caller's job.
pub fn song_status(variants: &[Variant]) -> SongStatusCalculation {
    if variants.is_empty() {
        return SongStatusCalculation {
            song_status: SongStatus::Pending,
            variant_statuses: Vec::new(),
            has_any_stream_ready: false,
            has_any_download_ready: false,
            all_download_ready: false,
        };
    }

    let variant_statuses: Vec<VariantStatus> = variants.iter().map(variant_status).collect();

    let has_any_stream_ready = variant_statuses
        .iter()
        .any(|s| *s == VariantStatus::StreamReady);
    let has_any_download_ready = variant_statuses
        .iter()
        .any(|s| *s == VariantStatus::DownloadReady);
    let all_download_ready = variant_statuses
        .iter()
        .all(|s| *s == VariantStatus::DownloadReady);

    let song_status = if all_download_ready {
        SongStatus::Completed
    } else if has_any_stream_ready || has_any_download_ready {
        SongStatus::StreamAvailable
    } else {
        SongStatus::Pending
    };

    SongStatusCalculation {
        song_status,
        variant_statuses,
        has_any_stream_ready,
        has_any_download_ready,
        all_download_ready,
    }
}
