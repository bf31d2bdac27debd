//! Bearer token held by the session.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Opaque bearer credential issued by the backend.
///
/// The value never appears in `Debug` output. Tokens are treated as opaque;
/// the only thing read from them is an optional JWT `exp` claim, used to
/// drop a token that is already past its lifetime without asking the server.
#[derive(Clone)]
pub struct AccessToken(SecretString);

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

impl AccessToken {
    /// Wrap a raw token. Returns `None` for empty or whitespace-only input.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(SecretString::from(trimmed.to_string())))
    }

    /// The raw token, for `Authorization` headers and storage.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Expiry from the JWT `exp` claim, when the token is a JWT that has one.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let payload = self.expose().split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claim: ExpiryClaim = serde_json::from_slice(&bytes).ok()?;
        DateTime::from_timestamp(claim.exp?, 0)
    }

    /// Whether the token carries an expiry that is at or before `now`.
    ///
    /// Tokens without a readable expiry are never considered expired here.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"1","exp":{exp}}}"#));
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn test_rejects_blank_tokens() {
        assert!(AccessToken::new("").is_none());
        assert!(AccessToken::new("   ").is_none());
        assert_eq!(AccessToken::new(" abc ").unwrap().expose(), "abc");
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = AccessToken::new("super-secret").unwrap();
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_reads_jwt_expiry() {
        let now = Utc::now();
        let past = AccessToken::new(jwt_with_exp((now - Duration::hours(1)).timestamp())).unwrap();
        let future =
            AccessToken::new(jwt_with_exp((now + Duration::hours(1)).timestamp())).unwrap();

        assert!(past.is_expired_at(now));
        assert!(!future.is_expired_at(now));
        assert!(future.expires_at().is_some());
    }

    #[test]
    fn test_opaque_tokens_never_expire_locally() {
        let token = AccessToken::new("opaque-session-token").unwrap();
        assert!(token.expires_at().is_none());
        assert!(!token.is_expired_at(Utc::now()));

        let garbage = AccessToken::new("a.!!!.c").unwrap();
        assert!(garbage.expires_at().is_none());
    }
}
