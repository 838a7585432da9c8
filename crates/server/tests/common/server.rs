//! Server test utilities.

use super::storage::RecordingBackend;
use easel_core::config::{AppConfig, StorageConfig};
use easel_server::{AppState, create_router};
use easel_storage::{FilesystemBackend, ObjectStore};
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: Option<TempDir>,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server backed by a temporary filesystem store.
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let storage_path = temp_dir.path().join("storage");

        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path)
                .await
                .expect("Failed to create storage backend"),
        );

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem {
            path: storage_path,
        };

        let state = AppState::new(config, storage);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Create a test server over an arbitrary backend.
    pub fn with_backend(config: AppConfig, storage: Arc<dyn ObjectStore>) -> Self {
        let state = AppState::new(config, storage);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: None,
        }
    }

    /// Create a test server over a recording backend, returning a handle
    /// for asserting what reached the store.
    pub fn recording(config: AppConfig) -> (Self, RecordingBackend) {
        let backend = RecordingBackend::default();
        let storage: Arc<dyn ObjectStore> = Arc::new(backend.clone());
        (Self::with_backend(config, storage), backend)
    }
}
