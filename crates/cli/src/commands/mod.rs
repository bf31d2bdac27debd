//! CLI command implementations.
//!
//! Every command shares one [`Manager`], built and rehydrated by [`start`]
//! before the command runs.

pub mod auth;
pub mod guard;
pub mod password_reset;
pub mod register;

use pharmadesk_core::EmailError;
use pharmadesk_session::{
    ConfigError, FileTokenStore, HttpAuthBackend, SessionConfig, SessionError, SessionManager,
};
use thiserror::Error;
use tracing::{debug, warn};

/// The session manager as wired up for the command line.
pub type Manager = SessionManager<HttpAuthBackend, FileTokenStore>;

/// Errors that can end a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Environment configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// A session operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An email argument is malformed.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Any other argument is unusable.
    #[error("Invalid input: {0}")]
    Input(String),
}

impl CliError {
    /// Text to show on the terminal.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Session(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Build the process-wide session manager and restore any stored session.
///
/// With `PHARMADESK_VERIFY_ON_STARTUP` set, a restored session is checked
/// against the server; a rejected token signs the session out.
///
/// # Errors
///
/// Returns `CliError::HttpClient` if the HTTP client cannot be created.
pub async fn start(config: &SessionConfig) -> Result<Manager, CliError> {
    let backend =
        HttpAuthBackend::new(config).map_err(|e| CliError::HttpClient(e.to_string()))?;
    let store = FileTokenStore::new(&config.storage_path);
    let manager = SessionManager::new(backend, store);

    let session = manager.rehydrate();
    debug!(
        authenticated = session.is_authenticated(),
        storage = %config.storage_path.display(),
        "Session rehydrated"
    );

    if config.verify_on_startup
        && session.is_authenticated()
        && let Err(e) = manager.verify_session().await
    {
        warn!(error = %e, "Startup session check failed");
    }

    Ok(manager)
}
