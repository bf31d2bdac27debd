//! Session error types.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors returned by session operations.
///
/// Every variant is handed back to the caller; the session never presents
/// messages itself. Use [`SessionError::user_message`] for the text a
/// person should see.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend rejected the credentials (HTTP 401 on a sign-in call).
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The backend already has an account for this email (HTTP 409).
    #[error("duplicate account: {0}")]
    DuplicateAccount(String),

    /// The request never completed (connection refused, timeout, DNS).
    #[error("network error: {0}")]
    NetworkError(String),

    /// The backend answered with a 5xx status.
    #[error("server unavailable (HTTP {status}): {message}")]
    ServerUnavailable {
        /// HTTP status code.
        status: u16,
        /// Message from the response body, if any.
        message: String,
    },

    /// The stored token was rejected on an authenticated call.
    #[error("session token expired")]
    TokenExpired,

    /// An authenticated call was attempted with no stored token.
    #[error("no active session")]
    NotAuthenticated,

    /// Anything the backend said that does not fit another variant.
    #[error("unexpected response: {0}")]
    Unknown(String),

    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] pharmadesk_core::EmailError),

    /// Input rejected before any request was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The durable token store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Text suitable for showing to the person using the application.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials(msg) if !msg.trim().is_empty() => msg.clone(),
            Self::InvalidCredentials(_) => "Invalid credentials".to_string(),
            Self::DuplicateAccount(_) => "An account with this email already exists".to_string(),
            Self::NetworkError(_) => {
                "Unable to reach the server. Check your connection and try again.".to_string()
            }
            Self::ServerUnavailable { .. } => {
                "The service is temporarily unavailable. Please try again later.".to_string()
            }
            Self::TokenExpired => "Your session has expired. Please log in again.".to_string(),
            Self::NotAuthenticated => "Please log in to continue.".to_string(),
            Self::Unknown(msg) if !msg.trim().is_empty() => msg.clone(),
            Self::Unknown(_) => "Something went wrong. Please try again.".to_string(),
            Self::InvalidEmail(_) => "Email is invalid".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::Storage(_) => "Unable to save your session on this device.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_account_message_mentions_existing_account() {
        let err = SessionError::DuplicateAccount("already registered".to_string());
        assert!(err.user_message().contains("already exists"));
    }

    #[test]
    fn test_invalid_credentials_prefers_backend_message() {
        let err = SessionError::InvalidCredentials("Invalid credentials".to_string());
        assert_eq!(err.user_message(), "Invalid credentials");

        let err = SessionError::InvalidCredentials("  ".to_string());
        assert_eq!(err.user_message(), "Invalid credentials");
    }

    #[test]
    fn test_server_details_are_not_exposed() {
        let err = SessionError::ServerUnavailable {
            status: 503,
            message: "db pool exhausted".to_string(),
        };
        assert!(!err.user_message().contains("pool"));
        assert!(err.to_string().contains("503"));
    }
}
