//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own temp storage, registry and
//! in-process broker. A stand-in worker task answers job messages the way a
//! remote separation worker would.

use super::constants::*;
use super::fixtures::fake_worker_result;
use demix_server::engine::{Engine, GuardedEngine, ResultListener, DEFAULT_CHUNK_MS};
use demix_server::library::MusicLibrary;
use demix_server::queue::{InProcessBroker, JobMessage, WorkQueue};
use demix_server::server::server::make_app;
use demix_server::server::{RequestsLoggingLevel, ServerConfig};
use demix_server::store::ContentStore;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

/// Test server instance with isolated storage and broker.
///
/// When dropped, the server and its background tasks shut down and temp
/// resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// The broker backing the server, for tests acting as the worker side.
    pub broker: Arc<InProcessBroker>,

    /// Direct engine access for state assertions.
    pub engine: GuardedEngine,

    // Private fields - keep resources alive until drop
    _temp_data_dir: TempDir,
    shutdown: CancellationToken,
}

impl TestServer {
    /// Spawns a test server with a stand-in worker that answers every job.
    pub async fn spawn() -> Self {
        let (server, job_receiver) = Self::spawn_manual().await;

        let broker = server.broker.clone();
        let shutdown = server.shutdown.clone();
        let mut job_receiver = job_receiver;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    body = job_receiver.recv() => {
                        let Some(body) = body else { return };
                        let job: JobMessage =
                            serde_json::from_slice(&body).expect("worker got undecodable job");
                        broker
                            .publish_result(fake_worker_result(&job))
                            .await
                            .expect("worker failed to publish result");
                    }
                }
            }
        });

        server
    }

    /// Spawns a test server without a worker; the caller receives the job
    /// queue consumer side and plays the worker itself.
    pub async fn spawn_manual() -> (Self, UnboundedReceiver<Vec<u8>>) {
        let temp_data_dir = TempDir::new().expect("Failed to create temp data dir");
        let store = Arc::new(ContentStore::new(
            temp_data_dir.path().join("uploads"),
            temp_data_dir.path().join("download"),
        ));
        store.init().await.expect("Failed to init content store");

        let broker = Arc::new(InProcessBroker::new());
        let job_receiver = broker
            .take_job_receiver()
            .expect("job receiver already taken");
        let result_receiver = broker
            .take_result_receiver()
            .expect("result receiver already taken");

        let library = Arc::new(MusicLibrary::new());
        let engine = Arc::new(Engine::new(
            library,
            store,
            broker.clone() as Arc<dyn WorkQueue>,
            DEFAULT_CHUNK_MS,
        ));

        let shutdown = CancellationToken::new();
        let listener_task =
            ResultListener::new(engine.clone(), result_receiver, shutdown.clone());
        tokio::spawn(listener_task.run());

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
        };
        let app = make_app(config, engine.clone());

        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            broker,
            engine,
            _temp_data_dir: temp_data_dir,
            shutdown,
        };

        server.wait_for_ready().await;

        (server, job_receiver)
    }

    /// Waits for the server to become ready by polling the home endpoint.
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    return;
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        // TempDir is cleaned up automatically
    }
}
