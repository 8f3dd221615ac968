//! Job-status client for the external music-generation API.

use crate::song_store::Variant;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur when querying the generation API.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,
}

/// Job-status reply as the engine reads it.
///
/// `code != 200` signals a client-reported failure. `data` may be absent
/// even on success when the job is still queued and has produced nothing.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusReply {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<JobData>,
}

impl JobStatusReply {
    pub fn is_success(&self) -> bool {
        self.code == 200
    }
}

/// Payload of a successful job-status reply.
#[derive(Debug, Clone, Deserialize)]
pub struct JobData {
    #[serde(default)]
    pub variants: Vec<ApiVariant>,
    /// Job-level failure signal. When present the job is dead and the song
    /// is forced to its terminal FAILED state.
    #[serde(default, rename = "errorMessage")]
    pub error_message: Option<String>,
}

/// Raw variant record as the generation API reports it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiVariant {
    pub id: String,
    #[serde(default)]
    pub stream_audio_url: Option<String>,
    #[serde(default)]
    pub source_stream_audio_url: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub source_audio_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub create_time: i64,
}

impl From<ApiVariant> for Variant {
    fn from(raw: ApiVariant) -> Self {
        // Empty strings from the API mean "not there yet"; treating them as
        // present would inflate the derived status.
        fn non_empty(url: Option<String>) -> Option<String> {
            url.filter(|u| !u.is_empty())
        }

        Variant {
            id: raw.id,
            stream_url: non_empty(raw.stream_audio_url),
            source_stream_url: non_empty(raw.source_stream_audio_url),
            audio_url: non_empty(raw.audio_url),
            source_audio_url: non_empty(raw.source_audio_url),
            image_url: non_empty(raw.image_url),
            duration_secs: raw.duration,
            prompt: raw.prompt,
            model_name: raw.model_name,
            tags: raw.tags,
            created_at: raw.create_time,
        }
    }
}

/// Trait for generation job-status backends.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Fetch the current state of a generation job by task id.
    async fn job_status(&self, task_id: &str) -> Result<JobStatusReply, GenerationClientError>;
}

/// HTTP implementation backed by the real generation service.
pub struct HttpGenerationClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpGenerationClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn job_status(&self, task_id: &str) -> Result<JobStatusReply, GenerationClientError> {
        let url = format!("{}/api/v1/generate/record-info", self.base_url);

        debug!(task_id = %task_id, "Querying generation API for job status");

        let mut request = self
            .client
            .get(&url)
            .query(&[("taskId", task_id)])
            .timeout(self.timeout);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationClientError::Timeout
            } else {
                GenerationClientError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let reply: JobStatusReply = response.json().await.map_err(|e| {
            GenerationClientError::InvalidResponse(format!(
                "Failed to parse job-status response: {}",
                e
            ))
        })?;

        debug!(
            task_id = %task_id,
            code = reply.code,
            variant_count = reply.data.as_ref().map(|d| d.variants.len()).unwrap_or(0),
            "Received job status"
        );

        Ok(reply)
    }
}
