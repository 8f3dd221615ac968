//! Deterministic demo-data simulator.
//!
//! Used when the external generation API is disabled or unreachable.
//! Fabricates a variant snapshot whose completeness is a pure function of
//! elapsed time since the demo job was created, so the same task id queried
//! at the same clock value always yields byte-identical variants. This is
//! what makes offline development and scenario tests replayable.

use crate::song_store::Variant;

/// Prefix that marks a task id as belonging to a simulated job. The suffix
/// is the unix timestamp of job creation.
pub const DEMO_TASK_PREFIX: &str = "demo-task-";

/// Seconds after creation at which simulated streaming previews appear.
pub const DEMO_STREAM_READY_AFTER_SECS: i64 = 10;
/// Seconds after creation at which the first variant becomes downloadable.
pub const DEMO_FIRST_DOWNLOAD_AFTER_SECS: i64 = 30;
/// Seconds after creation at which the whole job completes.
pub const DEMO_ALL_DOWNLOAD_AFTER_SECS: i64 = 45;

const DEMO_VARIANT_COUNT: usize = 2;
const DEMO_MODEL_NAME: &str = "demo-chirp-v4";
const DEMO_CDN_BASE: &str = "https://demo.serenata.invalid";

/// Build a demo task id for a job created at the given unix timestamp.
pub fn demo_task_id(created_at: i64) -> String {
    format!("{}{}", DEMO_TASK_PREFIX, created_at)
}

/// Fabricate the variant snapshot a simulated job would report at `now`.
///
/// Progress is monotonic in elapsed time: metadata-only variants first,
/// then streaming URLs for all variants, then download URLs appearing one
/// variant at a time until the job is fully downloadable.
pub fn simulate_variants(created_at: i64, now: i64) -> Vec<Variant> {
    let elapsed = now - created_at;

    (0..DEMO_VARIANT_COUNT)
        .map(|index| {
            let id = format!("demo-{}-v{}", created_at, index + 1);

            let stream_url = if elapsed >= DEMO_STREAM_READY_AFTER_SECS {
                Some(format!("{}/stream/{}.mp3", DEMO_CDN_BASE, id))
            } else {
                None
            };

            // Downloads land staggered: the first variant finishes earlier
            // than the rest, exercising the partial-readiness state.
            let download_at = if index == 0 {
                DEMO_FIRST_DOWNLOAD_AFTER_SECS
            } else {
                DEMO_ALL_DOWNLOAD_AFTER_SECS
            };
            let audio_url = if elapsed >= download_at {
                Some(format!("{}/audio/{}.mp3", DEMO_CDN_BASE, id))
            } else {
                None
            };

            let duration_secs = if stream_url.is_some() { 184.0 } else { 0.0 };

            Variant {
                id,
                stream_url,
                source_stream_url: None,
                audio_url,
                source_audio_url: None,
                image_url: Some(format!(
                    "{}/image/demo-{}-v{}.jpeg",
                    DEMO_CDN_BASE,
                    created_at,
                    index + 1
                )),
                duration_secs,
                prompt: "a simulated song for offline development".to_string(),
                model_name: DEMO_MODEL_NAME.to_string(),
                tags: "demo, simulated".to_string(),
                created_at,
            }
        })
        .collect()
}
