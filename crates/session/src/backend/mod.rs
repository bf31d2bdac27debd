//! Auth REST API collaborator.
//!
//! [`AuthBackend`] is the seam between the session manager and the network.
//! [`HttpAuthBackend`] talks to the real API; tests substitute scripted
//! implementations.
//!
//! # Endpoints
//!
//! | call | method | path |
//! |---|---|---|
//! | login | POST | `auth/login` |
//! | register | POST | `auth/register/{customer,pharmacy}` |
//! | social login | POST | `auth/social-login` |
//! | logout | POST | `auth/logout` |
//! | profile | GET | `auth/profile` |
//! | reset request | POST | `auth/password-reset/request` |
//! | reset verify | POST | `auth/password-reset/verify` |
//! | reset confirm | POST | `auth/password-reset/confirm` |

mod http;

use std::future::Future;
use std::sync::Arc;

pub use http::HttpAuthBackend;

use pharmadesk_core::Email;

use crate::error::SessionError;
use crate::models::{
    Credentials, PasswordResetConfirmation, RegistrationForm, ResetTokenStatus, SocialLogin,
    UserProfile,
};
use crate::token::AccessToken;

/// Normalized body of a successful sign-in or registration.
#[derive(Debug, Clone, Default)]
pub struct AuthPayload {
    /// Bearer token, when the call opened a session.
    pub token: Option<String>,
    /// Profile of the account.
    pub user: Option<UserProfile>,
    /// Informational message from the backend.
    pub message: Option<String>,
}

/// Operations the session manager needs from the auth API.
///
/// Implementations map transport and status failures onto [`SessionError`]
/// with [`classify_status`], so the manager sees one taxonomy regardless of
/// transport.
pub trait AuthBackend: Send + Sync {
    /// Exchange email and password for a session.
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<AuthPayload, SessionError>> + Send;

    /// Submit a role-specific registration.
    fn register(
        &self,
        form: &RegistrationForm,
    ) -> impl Future<Output = Result<AuthPayload, SessionError>> + Send;

    /// Exchange a third-party identity token for a session.
    fn social_login(
        &self,
        login: &SocialLogin,
    ) -> impl Future<Output = Result<AuthPayload, SessionError>> + Send;

    /// Invalidate the token server-side.
    fn logout(&self, token: &AccessToken)
    -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Fetch the profile the token belongs to.
    fn profile(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<UserProfile, SessionError>> + Send;

    /// Ask for a reset link to be emailed. Returns the backend message.
    fn request_password_reset(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<String>, SessionError>> + Send;

    /// Check whether a reset token is still usable.
    fn verify_reset_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<ResetTokenStatus, SessionError>> + Send;

    /// Set a new password with a reset token. Returns the backend message.
    fn confirm_password_reset(
        &self,
        confirmation: &PasswordResetConfirmation,
    ) -> impl Future<Output = Result<Option<String>, SessionError>> + Send;
}

impl<T: AuthBackend> AuthBackend for Arc<T> {
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<AuthPayload, SessionError>> + Send {
        (**self).login(credentials)
    }

    fn register(
        &self,
        form: &RegistrationForm,
    ) -> impl Future<Output = Result<AuthPayload, SessionError>> + Send {
        (**self).register(form)
    }

    fn social_login(
        &self,
        login: &SocialLogin,
    ) -> impl Future<Output = Result<AuthPayload, SessionError>> + Send {
        (**self).social_login(login)
    }

    fn logout(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<(), SessionError>> + Send {
        (**self).logout(token)
    }

    fn profile(
        &self,
        token: &AccessToken,
    ) -> impl Future<Output = Result<UserProfile, SessionError>> + Send {
        (**self).profile(token)
    }

    fn request_password_reset(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<String>, SessionError>> + Send {
        (**self).request_password_reset(email)
    }

    fn verify_reset_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<ResetTokenStatus, SessionError>> + Send {
        (**self).verify_reset_token(token)
    }

    fn confirm_password_reset(
        &self,
        confirmation: &PasswordResetConfirmation,
    ) -> impl Future<Output = Result<Option<String>, SessionError>> + Send {
        (**self).confirm_password_reset(confirmation)
    }
}

/// What kind of call produced a response; decides how a 401 is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Login or social login: 401/403 means bad credentials.
    SignIn,
    /// Registration: no token involved.
    Register,
    /// Carries the session token: 401 means the token is dead.
    Authenticated,
    /// Anonymous utility calls such as password reset.
    Public,
}

/// Map a non-success HTTP status onto the session error taxonomy.
#[must_use]
pub fn classify_status(status: u16, message: Option<String>, kind: CallKind) -> SessionError {
    let message = message.filter(|m| !m.trim().is_empty());
    match (status, kind) {
        (401 | 403, CallKind::SignIn) => SessionError::InvalidCredentials(
            message.unwrap_or_else(|| "Invalid credentials".to_string()),
        ),
        (401, CallKind::Authenticated) => SessionError::TokenExpired,
        (409, _) => SessionError::DuplicateAccount(
            message.unwrap_or_else(|| "Account already exists".to_string()),
        ),
        (500..=599, _) => SessionError::ServerUnavailable {
            status,
            message: message.unwrap_or_default(),
        },
        _ => SessionError::Unknown(message.unwrap_or_else(|| format!("HTTP error {status}"))),
    }
}

/// Map a 2xx body that reports `success: false`.
#[must_use]
pub fn classify_rejection(message: Option<String>, kind: CallKind) -> SessionError {
    let message = message.filter(|m| !m.trim().is_empty());
    match kind {
        CallKind::SignIn => {
            SessionError::InvalidCredentials(message.unwrap_or_else(|| "Login failed".to_string()))
        }
        CallKind::Register => match message {
            Some(m) if m.to_ascii_lowercase().contains("already") => {
                SessionError::DuplicateAccount(m)
            }
            other => {
                SessionError::Unknown(other.unwrap_or_else(|| "Registration failed".to_string()))
            }
        },
        CallKind::Authenticated | CallKind::Public => {
            SessionError::Unknown(message.unwrap_or_else(|| "Request failed".to_string()))
        }
    }
}
