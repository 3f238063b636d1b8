//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own database and a stub catalog.

use super::constants::*;
use super::fixtures::{create_test_db_with_users, StubCatalog};
use std::sync::Arc;
use std::time::Duration;
use swipesound_server::config::DiscoverySettings;
use swipesound_server::server::{server::make_app, RequestsLoggingLevel, ServerConfig};
use swipesound_server::user::PASSWORD_RESET_TOKEN_TTL;
use swipesound_server::{DiscoveryEngine, SqliteUserStore, UserManager};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with an isolated database
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Store for direct database access in tests
    pub user_store: Arc<SqliteUserStore>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port, backed by a healthy
    /// stub catalog.
    ///
    /// # Panics
    ///
    /// Panics if the database cannot be created, the port cannot be bound
    /// or the server doesn't become ready within timeout.
    pub async fn spawn() -> Self {
        Self::spawn_with(true, PASSWORD_RESET_TOKEN_TTL).await
    }

    /// Spawns a test server whose catalog fails every call.
    pub async fn spawn_with_unavailable_catalog() -> Self {
        Self::spawn_with(false, PASSWORD_RESET_TOKEN_TTL).await
    }

    /// Spawns a test server whose password reset tokens expire right away.
    pub async fn spawn_with_expiring_reset_tokens() -> Self {
        Self::spawn_with(true, Duration::ZERO).await
    }

    async fn spawn_with(catalog_available: bool, password_reset_ttl: Duration) -> Self {
        let (temp_db_dir, db_path) =
            create_test_db_with_users().expect("Failed to create test database");

        let user_store =
            Arc::new(SqliteUserStore::new(&db_path).expect("Failed to open user store"));

        let discovery = DiscoveryEngine::new(
            user_store.clone(),
            Arc::new(StubCatalog {
                available: catalog_available,
            }),
            DiscoverySettings::default(),
        )
        .expect("Failed to create discovery engine");
        let user_manager = UserManager::new(user_store.clone(), discovery.taxonomy().clone())
            .with_password_reset_ttl(password_reset_ttl);

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
        };

        let app = make_app(
            config,
            Arc::new(user_manager),
            Arc::new(discovery),
        )
        .expect("Failed to build app");

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            user_store,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
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
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
