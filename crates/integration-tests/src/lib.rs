//! Integration tests for the Pharmadesk session client.
//!
//! Tests drive a real [`SessionManager`] over HTTP against [`MockApi`], an
//! in-process axum server, with the token store in a throwaway file.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pharmadesk-integration-tests
//! ```

pub mod mock_api;

use std::collections::HashMap;
use std::path::PathBuf;

use pharmadesk_session::{FileTokenStore, HttpAuthBackend, SessionConfig, SessionManager};

pub use mock_api::{GOOGLE_EMAIL, GOOGLE_ID_TOKEN, MockApi, RESET_TOKEN, RecordedRequest};

/// Session manager wired the way the application wires it.
pub type Manager = SessionManager<HttpAuthBackend, FileTokenStore>;

/// A mock API plus a session manager pointed at it.
pub struct TestContext {
    pub api: MockApi,
    pub config: SessionConfig,
    pub manager: Manager,
    dir: PathBuf,
}

impl TestContext {
    /// Start a mock API and build a manager with an empty token store.
    ///
    /// # Panics
    ///
    /// Panics if the mock server cannot start or the configuration is invalid.
    pub async fn new() -> Self {
        let api = MockApi::spawn().await.expect("mock API should start");
        let dir = std::env::temp_dir().join(format!("pharmadesk-it-{}", uuid::Uuid::new_v4()));
        let config = config_for(api.base_url().as_str(), dir.join("storage.json"));
        let manager = build_manager(&config);

        Self {
            api,
            config,
            manager,
            dir,
        }
    }

    /// A second manager over the same token file, as after a process restart.
    #[must_use]
    pub fn restart(&self) -> Manager {
        build_manager(&self.config)
    }

    /// Path of the token store file.
    #[must_use]
    pub fn storage_path(&self) -> &std::path::Path {
        &self.config.storage_path
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// Configuration for an API root and token file, read through the same
/// parser as the environment.
///
/// # Panics
///
/// Panics if `base_url` is not a valid HTTP URL.
#[must_use]
pub fn config_for(base_url: &str, storage_path: PathBuf) -> SessionConfig {
    let vars = HashMap::from([
        ("PHARMADESK_API_BASE_URL", base_url.to_string()),
        (
            "PHARMADESK_STORAGE_PATH",
            storage_path.to_string_lossy().into_owned(),
        ),
        ("PHARMADESK_HTTP_TIMEOUT_SECONDS", "5".to_string()),
    ]);
    SessionConfig::from_source(|key| vars.get(key).cloned()).expect("test config should be valid")
}

/// Build a manager from configuration.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn build_manager(config: &SessionConfig) -> Manager {
    let backend = HttpAuthBackend::new(config).expect("HTTP client should build");
    SessionManager::new(backend, FileTokenStore::new(&config.storage_path))
}
