//! Application state shared across handlers.

use easel_core::config::AppConfig;
use easel_storage::ObjectStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Performs configuration validation up front so misconfigured field
    /// names or size ceilings are caught at startup rather than on the
    /// first request.
    ///
    /// # Panics
    ///
    /// Panics if upload or storage configuration validation fails.
    pub fn new(config: AppConfig, storage: Arc<dyn ObjectStore>) -> Self {
        if let Err(error) = config.upload.validate() {
            panic!("Invalid upload configuration: {error}");
        }
        if let Err(error) = config.storage.validate() {
            panic!("Invalid storage configuration: {error}");
        }

        Self {
            config: Arc::new(config),
            storage,
        }
    }
}
