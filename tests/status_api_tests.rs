//! End-to-end tests for the song status API.
//!
//! Each test spins up the real axum router on an ephemeral port, backed by
//! a temporary SQLite database and a stub generation client, and drives it
//! over HTTP.

use async_trait::async_trait;
use serenata_server::generation::client::{
    ApiVariant, GenerationClient, GenerationClientError, JobData, JobStatusReply,
};
use serenata_server::generation::demo;
use serenata_server::generation::GenerationStatusService;
use serenata_server::server::{make_router, AppState};
use serenata_server::song_store::{NewSong, SongStatus, SongStore, SqliteSongStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Generation client stub with a programmable reply and a call counter.
struct StubGenerationClient {
    reply: Mutex<Option<JobStatusReply>>,
    calls: AtomicUsize,
}

impl StubGenerationClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    fn set_reply(&self, reply: JobStatusReply) {
        *self.reply.lock().unwrap() = Some(reply);
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for StubGenerationClient {
    async fn job_status(&self, _task_id: &str) -> Result<JobStatusReply, GenerationClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply.lock().unwrap().clone() {
            Some(reply) => Ok(reply),
            None => Err(GenerationClientError::Connection(
                "stub has no reply".to_string(),
            )),
        }
    }
}

struct TestServer {
    base_url: String,
    store: Arc<SqliteSongStore>,
    client: Arc<StubGenerationClient>,
    _tmp: TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(SqliteSongStore::new(tmp.path().join("songs.db")).unwrap());
        let client = StubGenerationClient::new();
        let service = Arc::new(GenerationStatusService::new(
            store.clone(),
            client.clone() as Arc<dyn GenerationClient>,
        ));

        let router = make_router(AppState { service });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            store,
            client,
            _tmp: tmp,
        }
    }

    async fn get_status(&self, id_path: &str) -> reqwest::Response {
        reqwest::get(format!("{}/v1/songs/{}/status", self.base_url, id_path))
            .await
            .unwrap()
    }

    /// Poll the store until `predicate` holds or a short deadline passes.
    async fn wait_for_row(
        &self,
        song_id: i64,
        predicate: impl Fn(&serenata_server::song_store::Song) -> bool,
    ) -> bool {
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let row = self.store.get_song(song_id).unwrap().unwrap();
            if predicate(&row) {
                return true;
            }
        }
        false
    }
}

fn api_variant(id: &str, stream: bool, download: bool) -> ApiVariant {
    let raw = format!(
        r#"{{
            "id": "{id}",
            "streamAudioUrl": {stream},
            "audioUrl": {download},
            "imageUrl": "https://cdn.example/img/{id}.jpeg",
            "duration": 92.4,
            "prompt": "an end-to-end test song",
            "modelName": "chirp-v4",
            "tags": "test",
            "createTime": 1700000000
        }}"#,
        id = id,
        stream = if stream {
            format!(r#""https://cdn.example/stream/{}.mp3""#, id)
        } else {
            "null".to_string()
        },
        download = if download {
            format!(r#""https://cdn.example/audio/{}.mp3""#, id)
        } else {
            "null".to_string()
        },
    );
    serde_json::from_str(&raw).unwrap()
}

// ============================================================================
// Transport-level behavior
// ============================================================================

#[tokio::test]
async fn test_health() {
    let server = TestServer::spawn().await;
    let resp = reqwest::get(format!("{}/health", server.base_url))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_unknown_song_is_404() {
    let server = TestServer::spawn().await;
    let resp = server.get_status("12345").await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "song not found");
    assert_eq!(server.client.call_count(), 0);
}

#[tokio::test]
async fn test_malformed_id_is_400() {
    let server = TestServer::spawn().await;
    let resp = server.get_status("not-a-number").await;
    assert_eq!(resp.status(), 400);
    assert_eq!(server.client.call_count(), 0);
}

// ============================================================================
// Status scenarios
// ============================================================================

#[tokio::test]
async fn test_cold_start_returns_pending_then_refreshes() {
    let server = TestServer::spawn().await;
    let now = chrono::Utc::now().timestamp();
    let song = server
        .store
        .insert_song(&NewSong {
            task_id: Some(demo::demo_task_id(now)),
            ..Default::default()
        })
        .unwrap();

    let resp = server.get_status(&song.id.to_string()).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["variants"].as_array().unwrap().len(), 0);
    assert!(body["error_code"].is_null());

    // The background refresh lands the simulated (still pending) snapshot.
    assert!(server.wait_for_row(song.id, |row| !row.variants.is_empty()).await);
}

#[tokio::test]
async fn test_demo_job_completes_after_enough_elapsed_time() {
    let server = TestServer::spawn().await;
    let created_at = chrono::Utc::now().timestamp() - 120;
    let song = server
        .store
        .insert_song(&NewSong {
            task_id: Some(demo::demo_task_id(created_at)),
            ..Default::default()
        })
        .unwrap();

    // First query schedules the refresh that completes the song.
    let resp = server.get_status(&song.id.to_string()).await;
    assert_eq!(resp.status(), 200);
    assert!(server.wait_for_row(song.id, |row| row.status == SongStatus::Completed).await);

    let resp = server.get_status(&song.id.to_string()).await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "COMPLETED");
    let variants = body["variants"].as_array().unwrap();
    assert_eq!(variants.len(), 2);
    for v in variants {
        assert_eq!(v["status"], "DOWNLOAD_READY");
        assert!(v["audio_url"].is_string());
    }
}

#[tokio::test]
async fn test_production_flow_over_http() {
    let server = TestServer::spawn().await;
    server.client.set_reply(JobStatusReply {
        code: 200,
        message: "success".to_string(),
        data: Some(JobData {
            variants: vec![api_variant("v1", true, false), api_variant("v2", true, true)],
            error_message: None,
        }),
    });

    let song = server
        .store
        .insert_song(&NewSong {
            task_id: Some("prod-task-77".to_string()),
            ..Default::default()
        })
        .unwrap();

    // Immediate answer is best-known database state.
    let resp = server.get_status(&song.id.to_string()).await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "PENDING");

    assert!(server.wait_for_row(song.id, |row| row.status == SongStatus::StreamAvailable).await);
    assert!(server.client.call_count() >= 1);

    let resp = server.get_status(&song.id.to_string()).await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "STREAM_AVAILABLE");
    let variants = body["variants"].as_array().unwrap();
    assert_eq!(variants.len(), 2);
    assert_eq!(variants[0]["status"], "STREAM_READY");
    assert_eq!(variants[1]["status"], "DOWNLOAD_READY");
}

#[tokio::test]
async fn test_status_by_slug_over_http() {
    let server = TestServer::spawn().await;
    let created_at = chrono::Utc::now().timestamp() - 120;
    let song = server
        .store
        .insert_song(&NewSong {
            slug: Some("wedding-waltz".to_string()),
            task_id: Some(demo::demo_task_id(created_at)),
            ..Default::default()
        })
        .unwrap();

    let slug_url = format!("{}/v1/songs/by-slug/wedding-waltz/status", server.base_url);

    // First query schedules the refresh, same as the id route.
    let resp = reqwest::get(&slug_url).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(server.wait_for_row(song.id, |row| row.status == SongStatus::Completed).await);

    let resp = reqwest::get(&slug_url).await.unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "COMPLETED");

    let resp = reqwest::get(format!(
        "{}/v1/songs/by-slug/no-such-slug/status",
        server.base_url
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_completed_song_short_circuits_external_calls() {
    let server = TestServer::spawn().await;
    let song = server
        .store
        .insert_song(&NewSong {
            task_id: Some("prod-task-done".to_string()),
            ..Default::default()
        })
        .unwrap();
    server
        .store
        .update_generation_state(song.id, SongStatus::Completed, &[], None)
        .unwrap();

    for _ in 0..3 {
        let resp = server.get_status(&song.id.to_string()).await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "COMPLETED");
    }

    // Give any (wrongly) scheduled background work a chance to run.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.client.call_count(), 0);
}

#[tokio::test]
async fn test_failed_song_is_200_with_error_envelope() {
    let server = TestServer::spawn().await;
    let song = server.store.insert_song(&NewSong::default()).unwrap();
    server
        .store
        .update_generation_state(song.id, SongStatus::Failed, &[], Some("quota exhausted"))
        .unwrap();

    let resp = server.get_status(&song.id.to_string()).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "FAILED");
    assert_eq!(body["error_code"], "GENERATION_FAILED");
    assert_eq!(body["error_message"], "quota exhausted");
}
