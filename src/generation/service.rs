//! Mode handlers (demo / production) and the background refresher.
//!
//! Both handlers run the same refresh cycle: fetch raw variant data (from
//! the simulator or the real generation API), aggregate, persist, then
//! respond from the freshly re-read persisted row. The response is never
//! built from the value computed in-memory moments earlier: re-reading
//! after the write means that when two refreshes race, whichever write
//! lands last is what every subsequent reader observes.

use super::client::GenerationClient;
use super::reconciler::Reconciler;
use super::response::StatusResponse;
use super::{demo, Clock, JobSource, SystemClock};
use crate::song_store::{Song, SongStatus, SongStore, Variant};
use crate::status;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct GenerationStatusService {
    store: Arc<dyn SongStore>,
    client: Arc<dyn GenerationClient>,
    reconciler: Reconciler,
    clock: Arc<dyn Clock>,
}

impl GenerationStatusService {
    pub fn new(store: Arc<dyn SongStore>, client: Arc<dyn GenerationClient>) -> Self {
        Self::with_clock(store, client, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn SongStore>,
        client: Arc<dyn GenerationClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(store.clone()),
            store,
            client,
            clock,
        }
    }

    /// Answer a status query for the given song id.
    ///
    /// Database-first: a terminal persisted status is returned as-is and
    /// nothing else happens. Otherwise the caller gets the best-known
    /// persisted state immediately and a background refresh is scheduled.
    /// `Ok(None)` means no such song.
    pub async fn song_status(self: Arc<Self>, song_id: i64) -> Result<Option<StatusResponse>> {
        let Some(song) = self.store.get_song(song_id)? else {
            return Ok(None);
        };
        Ok(Some(self.answer_query(song)))
    }

    /// Same query, addressed by the song's public slug.
    pub async fn song_status_by_slug(
        self: Arc<Self>,
        slug: &str,
    ) -> Result<Option<StatusResponse>> {
        let Some(song) = self.store.get_song_by_slug(slug)? else {
            return Ok(None);
        };
        Ok(Some(self.answer_query(song)))
    }

    fn answer_query(self: Arc<Self>, song: Song) -> StatusResponse {
        let decision = self.reconciler.respond_from_database(&song);
        if decision.should_return {
            return StatusResponse::from_state(
                decision.status,
                &decision.variants,
                song.error_message.as_deref(),
            );
        }

        match song.task_id.as_deref().and_then(JobSource::from_task_id) {
            Some(source) => Arc::clone(&self).refresh_in_background(song.id, source),
            None => debug!(
                song_id = song.id,
                "Song has no resolvable task id; responding from database only"
            ),
        }

        StatusResponse::from_state(decision.status, &decision.variants, None)
    }

    /// Run one synchronous refresh cycle for a song and return the
    /// resulting envelope. `Ok(None)` means no such song.
    pub async fn refresh_now(&self, song_id: i64) -> Result<Option<StatusResponse>> {
        let Some(song) = self.store.get_song(song_id)? else {
            return Ok(None);
        };

        if !Reconciler::is_refresh_needed(&song) {
            let decision = self.reconciler.respond_from_database(&song);
            return Ok(Some(StatusResponse::from_state(
                decision.status,
                &decision.variants,
                song.error_message.as_deref(),
            )));
        }

        let source = match song.task_id.as_deref().and_then(JobSource::from_task_id) {
            Some(source) => source,
            None => {
                let decision = self.reconciler.respond_from_database(&song);
                return Ok(Some(StatusResponse::from_state(
                    decision.status,
                    &decision.variants,
                    None,
                )));
            }
        };

        let response = match source {
            JobSource::Demo { created_at } => self.refresh_demo(song, created_at).await?,
            JobSource::Production { ref task_id } => {
                self.refresh_production(song, task_id).await?
            }
        };
        Ok(Some(response))
    }

    /// Fire-and-forget refresh. Any failure is caught and logged; nothing
    /// ever propagates back to the request that scheduled it. A refresh
    /// that fails leaves state untouched for the next query to retry.
    pub fn refresh_in_background(self: Arc<Self>, song_id: i64, source: JobSource) {
        tokio::spawn(async move {
            debug!(song_id = song_id, source = ?source, "Background refresh starting");
            match self.refresh_now(song_id).await {
                Ok(Some(_)) => {}
                Ok(None) => warn!(song_id = song_id, "Background refresh: song disappeared"),
                Err(e) => error!(song_id = song_id, "Background refresh failed: {:#}", e),
            }
        });
    }

    /// Demo handler: fabricate the snapshot a simulated job would report
    /// at this elapsed time, then run the common persist-and-reread cycle.
    async fn refresh_demo(&self, song: Song, created_at: i64) -> Result<StatusResponse> {
        let now = self.clock.now_unix();
        let fresh = demo::simulate_variants(created_at, now);
        debug!(
            song_id = song.id,
            elapsed_secs = now - created_at,
            "Demo refresh simulated {} variants",
            fresh.len()
        );
        Ok(self.finish_refresh(song, fresh, None))
    }

    /// Production handler: query the generation API and reconcile.
    ///
    /// Client-reported errors are surfaced in the envelope without touching
    /// the stored status; a job-level `errorMessage` in the payload is the
    /// explicit failure signal that forces the terminal FAILED state.
    async fn refresh_production(&self, song: Song, task_id: &str) -> Result<StatusResponse> {
        let reply = match self.client.job_status(task_id).await {
            Ok(reply) => reply,
            Err(e) => {
                // Collaborator failure: degrade to best-known persisted
                // state; the next refresh cycle retries.
                warn!(
                    song_id = song.id,
                    task_id = %task_id,
                    "Generation API unreachable: {}",
                    e
                );
                return Ok(StatusResponse::from_state(
                    song.status,
                    &song.variants,
                    None,
                ));
            }
        };

        if !reply.is_success() {
            warn!(
                song_id = song.id,
                task_id = %task_id,
                code = reply.code,
                "Generation API reported an error"
            );
            return Ok(StatusResponse::from_state(song.status, &song.variants, None)
                .with_client_error(reply.code, reply.message));
        }

        let Some(data) = reply.data else {
            // Success with no payload: the job is still queued upstream.
            debug!(song_id = song.id, "Job still queued, nothing to reconcile");
            return Ok(StatusResponse::from_state(
                song.status,
                &song.variants,
                None,
            ));
        };

        let failure = data.error_message;
        let fresh: Vec<Variant> = data.variants.into_iter().map(Variant::from).collect();

        if let Some(ref message) = failure {
            info!(
                song_id = song.id,
                task_id = %task_id,
                "Generation job failed: {}",
                message
            );
        }

        Ok(self.finish_refresh(song, fresh, failure.as_deref()))
    }

    /// Common tail of every refresh cycle, preserved as three distinct
    /// phases:
    ///
    /// 1. aggregate the snapshot that is authoritative at call time (the
    ///    persisted one) — this is the pre-write view of this caller;
    /// 2. persist the fresh snapshot together with its own aggregate, so
    ///    the stored status is always derivable from the stored variants;
    /// 3. re-read the row and build the response from whatever is now
    ///    persisted, closing the loop under concurrent refreshes.
    fn finish_refresh(
        &self,
        song: Song,
        fresh: Vec<Variant>,
        failure: Option<&str>,
    ) -> StatusResponse {
        let pre_write = status::song_status(&song.variants);

        if fresh.is_empty() && failure.is_none() {
            // The job reported nothing yet; an empty overwrite would only
            // discard a snapshot another cycle may have landed.
            return StatusResponse::from_state(song.status, &song.variants, None);
        }

        let (next_status, snapshot, error_message) = match failure {
            // Explicit job-failure signal: terminal, keeps whichever
            // snapshot is more complete.
            Some(message) => {
                let snapshot = if fresh.is_empty() {
                    song.variants.clone()
                } else {
                    fresh
                };
                (SongStatus::Failed, snapshot, Some(message))
            }
            None => {
                let calc = status::song_status(&fresh);
                (calc.song_status, fresh, None)
            }
        };

        if next_status != pre_write.song_status {
            debug!(
                song_id = song.id,
                from = pre_write.song_status.as_str(),
                to = next_status.as_str(),
                "Refresh advances song status"
            );
        }

        self.reconciler
            .persist_refresh(song.id, next_status, &snapshot, error_message);

        match self.reconciler.reload(song.id) {
            Some(row) => {
                StatusResponse::from_state(row.status, &row.variants, row.error_message.as_deref())
            }
            // Re-read failed; fall back to the pre-write view rather than
            // guessing what landed.
            None => StatusResponse::from_state(pre_write.song_status, &song.variants, None),
        }
    }
}
