use std::path::Path;
use std::sync::Arc;

use depot::server::{AppState, create_router};
use depot::store::{SqliteStore, Store};
use tempfile::TempDir;

/// An in-process server on an ephemeral port, backed by a throwaway
/// database. Each test gets its own, so tests can run in parallel.
pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
}

impl TestServer {
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");

        let store = SqliteStore::new(temp_dir.path().join("depot.db")).expect("open store");
        store.initialize().expect("initialize store");

        let state = Arc::new(AppState {
            store: Arc::new(store),
        });
        let app = create_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let base_url = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self { temp_dir, base_url }
    }

    #[allow(dead_code)]
    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }
}
