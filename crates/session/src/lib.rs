//! Pharmadesk Session library.
//!
//! Client-side authentication for Pharmadesk: a [`SessionManager`] that owns
//! the signed-in state, a durable [`TokenStore`], an [`AuthBackend`] talking
//! to the REST API, and [`RouteGuard`]s deciding access to protected pages.
//!
//! ```rust,ignore
//! let config = SessionConfig::from_env()?;
//! let backend = HttpAuthBackend::new(&config)?;
//! let manager = SessionManager::new(backend, FileTokenStore::new(&config.storage_path));
//!
//! manager.rehydrate();
//! let user = manager.login(Credentials::new("a@b.com", "secret")?).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod guard;
pub mod manager;
pub mod models;
pub mod routes;
pub mod storage;
pub mod token;

pub use backend::{AuthBackend, AuthPayload, HttpAuthBackend};
pub use config::{ConfigError, SessionConfig};
pub use error::SessionError;
pub use guard::{GuardDecision, Requirement, RouteGuard};
pub use manager::SessionManager;
pub use models::{
    Credentials, CustomerRegistration, PasswordResetConfirmation, PharmacyRegistration,
    ProfilePatch, RegistrationForm, RegistrationResult, ResetTokenStatus, Session, SessionState,
    SocialLogin, UserProfile,
};
pub use storage::{FileTokenStore, MemoryTokenStore, StorageError, TokenStore};
pub use token::AccessToken;
