//! Song status reconciliation engine.
//!
//! Tracks an asynchronous, externally-driven generation job through its
//! partial states while reconciling three sources of truth: the persisted
//! song row, the third-party generation API, and a deterministic demo
//! simulation used when the API is unavailable. The persisted database is
//! the source of truth for what has been committed; the external API only
//! refreshes it.

pub mod client;
pub mod demo;
mod reconciler;
mod response;
mod service;

pub use client::{GenerationClient, GenerationClientError, HttpGenerationClient};
pub use reconciler::{DatabaseDecision, Reconciler};
pub use response::{StatusResponse, VariantEntry};
pub use service::GenerationStatusService;

use demo::DEMO_TASK_PREFIX;

/// Where a song's generation data comes from, resolved once from the
/// stored task id instead of re-inferring the string prefix on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSource {
    /// Simulated job; `created_at` is the unix timestamp encoded in the
    /// demo task id, from which elapsed time (and thus simulated progress)
    /// is derived.
    Demo { created_at: i64 },
    /// Real job tracked by the external generation API.
    Production { task_id: String },
}

impl JobSource {
    /// Resolve the job source from a stored task id. The demo prefix is
    /// the sole dispatch key between the two modes.
    pub fn from_task_id(task_id: &str) -> Option<Self> {
        match task_id.strip_prefix(DEMO_TASK_PREFIX) {
            Some(suffix) => suffix
                .parse::<i64>()
                .ok()
                .map(|created_at| JobSource::Demo { created_at }),
            None => Some(JobSource::Production {
                task_id: task_id.to_string(),
            }),
        }
    }
}

/// Clock abstraction so the demo simulator (and its tests) can pin time.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

/// Wall-clock implementation used outside tests.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[cfg(test)]
pub(crate) struct FixedClock(pub i64);

#[cfg(test)]
impl Clock for FixedClock {
    fn now_unix(&self) -> i64 {
        self.0
    }
}
