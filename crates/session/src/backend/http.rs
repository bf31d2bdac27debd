//! REST implementation of [`AuthBackend`] over `reqwest`.

use pharmadesk_core::{Email, UserRole};
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::{AuthBackend, AuthPayload, CallKind, classify_rejection, classify_status};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::models::{
    Credentials, PasswordResetConfirmation, RegistrationForm, ResetTokenStatus, SocialLogin,
    UserProfile,
};
use crate::token::AccessToken;

/// Header carrying a per-call correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Success envelope shared by the sign-in and registration endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthEnvelope {
    #[serde(default, alias = "accessToken")]
    token: Option<String>,
    #[serde(default, alias = "customer")]
    user: Option<Value>,
    /// Some endpoints send the role beside the user instead of inside it.
    #[serde(default)]
    user_type: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct EmailBody<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct TokenBody<'a> {
    token: &'a str,
}

/// Auth API client.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpAuthBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpAuthBackend {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `reqwest::Error` if the HTTP client cannot be constructed.
    pub fn new(config: &SessionConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self::with_client(client, config.api_base_url.clone()))
    }

    /// Use an existing `reqwest` client. `base_url` should end with `/`.
    #[must_use]
    pub const fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Root all endpoint paths are joined onto.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, SessionError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| SessionError::Unknown(format!("invalid endpoint {path}: {e}")))?;
        Ok(self
            .client
            .request(method, url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string()))
    }

    /// Send a request and return the parsed body of a 2xx response.
    ///
    /// Non-2xx statuses are classified by `kind`. Empty bodies read as
    /// `null`; bodies that are not JSON read as a JSON string.
    async fn execute(
        &self,
        request: RequestBuilder,
        kind: CallKind,
    ) -> Result<Value, SessionError> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "Auth request failed to complete");
            SessionError::NetworkError(e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SessionError::NetworkError(e.to_string()))?;
        let body = parse_body(text);

        if status.is_success() {
            debug!(status = status.as_u16(), "Auth request succeeded");
            Ok(body)
        } else {
            warn!(status = status.as_u16(), "Auth request rejected");
            Err(classify_status(status.as_u16(), body_message(&body), kind))
        }
    }

    /// Like [`Self::execute`], but also fails on `success: false` bodies.
    async fn execute_checked(
        &self,
        request: RequestBuilder,
        kind: CallKind,
    ) -> Result<Value, SessionError> {
        let body = self.execute(request, kind).await?;
        if body.get("success").and_then(Value::as_bool) == Some(false) {
            return Err(classify_rejection(body_message(&body), kind));
        }
        Ok(body)
    }
}

impl AuthBackend for HttpAuthBackend {
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn login(&self, credentials: &Credentials) -> Result<AuthPayload, SessionError> {
        let request = self.request(Method::POST, "auth/login")?.json(credentials);
        auth_payload(self.execute_checked(request, CallKind::SignIn).await?)
    }

    #[instrument(skip(self, form), fields(role = ?form.role(), email = %form.login_email()))]
    async fn register(&self, form: &RegistrationForm) -> Result<AuthPayload, SessionError> {
        let path = format!("auth/register/{}", form.role().path_segment());
        let request = self.request(Method::POST, &path)?.json(form);
        auth_payload(self.execute_checked(request, CallKind::Register).await?)
    }

    #[instrument(skip(self, login), fields(provider = ?login.provider))]
    async fn social_login(&self, login: &SocialLogin) -> Result<AuthPayload, SessionError> {
        let request = self.request(Method::POST, "auth/social-login")?.json(login);
        auth_payload(self.execute_checked(request, CallKind::SignIn).await?)
    }

    #[instrument(skip(self, token))]
    async fn logout(&self, token: &AccessToken) -> Result<(), SessionError> {
        let request = self
            .request(Method::POST, "auth/logout")?
            .bearer_auth(token.expose());
        self.execute(request, CallKind::Authenticated).await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn profile(&self, token: &AccessToken) -> Result<UserProfile, SessionError> {
        let request = self
            .request(Method::GET, "auth/profile")?
            .bearer_auth(token.expose());
        let body = self
            .execute_checked(request, CallKind::Authenticated)
            .await?;
        profile_from_body(body)
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn request_password_reset(&self, email: &Email) -> Result<Option<String>, SessionError> {
        let request = self
            .request(Method::POST, "auth/password-reset/request")?
            .json(&EmailBody {
                email: email.as_str(),
            });
        let body = self.execute_checked(request, CallKind::Public).await?;
        Ok(body_message(&body))
    }

    #[instrument(skip(self, token))]
    async fn verify_reset_token(&self, token: &str) -> Result<ResetTokenStatus, SessionError> {
        let request = self
            .request(Method::POST, "auth/password-reset/verify")?
            .json(&TokenBody {
                token: token.trim(),
            });
        match self.execute(request, CallKind::Public).await {
            Ok(body) => Ok(ResetTokenStatus {
                valid: body
                    .get("valid")
                    .or_else(|| body.get("success"))
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
                message: body_message(&body),
            }),
            // An unknown or used token is an answer, not a failure.
            Err(SessionError::Unknown(message)) => Ok(ResetTokenStatus {
                valid: false,
                message: Some(message),
            }),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, confirmation))]
    async fn confirm_password_reset(
        &self,
        confirmation: &PasswordResetConfirmation,
    ) -> Result<Option<String>, SessionError> {
        let request = self
            .request(Method::POST, "auth/password-reset/confirm")?
            .json(confirmation);
        let body = self.execute_checked(request, CallKind::Public).await?;
        Ok(body_message(&body))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Human-readable message from an error or success body.
fn body_message(body: &Value) -> Option<String> {
    let message = match body {
        Value::String(text) => Some(text.as_str()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| map.get("error").and_then(Value::as_str)),
        _ => None,
    };
    message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn malformed(e: &serde_json::Error) -> SessionError {
    SessionError::Unknown(format!("malformed response body: {e}"))
}

fn auth_payload(body: Value) -> Result<AuthPayload, SessionError> {
    if !body.is_object() {
        return Ok(AuthPayload::default());
    }
    let envelope: AuthEnvelope = serde_json::from_value(body).map_err(|e| malformed(&e))?;

    let mut user = envelope
        .user
        .filter(|u| !u.is_null())
        .map(serde_json::from_value::<UserProfile>)
        .transpose()
        .map_err(|e| malformed(&e))?;

    if let (Some(user), Some(raw)) = (user.as_mut(), envelope.user_type.as_deref()) {
        match raw.parse::<UserRole>() {
            Ok(role) => user.user_type = role,
            Err(e) => warn!(error = %e, "Ignoring unrecognised userType"),
        }
    }

    Ok(AuthPayload {
        token: envelope.token.filter(|t| !t.trim().is_empty()),
        user,
        message: envelope.message,
    })
}

/// The profile endpoint answers with either `{ user: {...} }` or the bare object.
fn profile_from_body(mut body: Value) -> Result<UserProfile, SessionError> {
    let wrapper = ["user", "data"]
        .into_iter()
        .find(|key| body.get(*key).is_some_and(Value::is_object));
    let profile = match wrapper {
        Some(key) => body.get_mut(key).map(Value::take).unwrap_or_default(),
        None => body,
    };
    serde_json::from_value(profile).map_err(|e| malformed(&e))
}
