//! The session manager: single owner of "who is logged in".
//!
//! # State
//!
//! The current [`Session`] lives in a `tokio::sync::watch` channel. Every
//! mutation replaces or edits the whole value under the channel lock, so
//! readers always see a consistent snapshot. Concurrent operations are not
//! ordered against each other; the last write wins.
//!
//! A watch receiver only sees the latest value, so short-lived states such as
//! `Authenticating` and `Error` can be skipped over. Every change of
//! [`SessionState`] is also sent on a broadcast channel, available from
//! [`SessionManager::transitions`].
//!
//! # Persistence
//!
//! The token store is the source of truth for the token. The manager keeps
//! `is_authenticated` equal to "a non-empty token is stored" at every
//! settled state; the token itself never appears in a [`Session`].

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use pharmadesk_core::Email;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use crate::backend::{AuthBackend, AuthPayload};
use crate::error::SessionError;
use crate::models::{
    Credentials, PasswordResetConfirmation, ProfilePatch, RegistrationForm, RegistrationResult,
    ResetTokenStatus, Session, SessionState, SocialLogin, UserProfile,
};
use crate::storage::{TokenStore, keys, load_json, save_json};
use crate::token::AccessToken;

/// Owns the session state, the token store, and the backend client.
///
/// Create one per process and hand out clones; clones share state.
pub struct SessionManager<B, S> {
    inner: Arc<SessionManagerInner<B, S>>,
}

struct SessionManagerInner<B, S> {
    backend: B,
    store: S,
    state: watch::Sender<Session>,
    transitions: broadcast::Sender<SessionState>,
}

/// Buffered transitions per receiver before the oldest are dropped.
const TRANSITION_CAPACITY: usize = 32;

impl<B, S> Clone for SessionManager<B, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: AuthBackend, S: TokenStore> SessionManager<B, S> {
    /// Create a manager in the initial, not yet rehydrated state.
    #[must_use]
    pub fn new(backend: B, store: S) -> Self {
        let (state, _) = watch::channel(Session::default());
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            inner: Arc::new(SessionManagerInner {
                backend,
                store,
                state,
                transitions,
            }),
        }
    }

    /// The backend client, for issuing authenticated calls via [`Self::authorized`].
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    // =========================================================================
    // State exposure
    // =========================================================================

    /// Copy of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Receiver of every state change, in order, including `Authenticating`
    /// and `Error`.
    ///
    /// Only changes made after this call are delivered.
    #[must_use]
    pub fn transitions(&self) -> broadcast::Receiver<SessionState> {
        self.inner.transitions.subscribe()
    }

    /// Whether a session is active.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// Profile of the signed-in user.
    #[must_use]
    pub fn user(&self) -> Option<UserProfile> {
        self.inner.state.borrow().user.clone()
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Restore the session from the token store.
    ///
    /// A stored token is trusted without contacting the server, except that a
    /// JWT whose `exp` has already passed is discarded. Always marks the
    /// session initialized, even when the store cannot be read.
    #[instrument(skip(self))]
    pub fn rehydrate(&self) -> Session {
        let token = self.stored_token().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read stored token");
            None
        });

        match token {
            Some(token) if token.is_expired_at(Utc::now()) => {
                info!("Stored token has expired, clearing it");
                self.clear_store();
                self.publish_signed_out(None);
            }
            Some(_) => {
                let user = load_json::<_, UserProfile>(&self.inner.store, keys::USER_DATA)
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "Ignoring unreadable cached profile");
                        None
                    });
                info!(
                    user_id = user.as_ref().map(|u| u.id.as_i64()),
                    "Restored session from storage"
                );
                self.update(|session| {
                    session.state = SessionState::Authenticated;
                    session.user = user;
                    session.loading = false;
                    session.error = None;
                });
            }
            None => {
                debug!("No stored session");
                // A profile without a token is stale.
                if let Err(e) = self.inner.store.remove(keys::USER_DATA) {
                    warn!(error = %e, "Could not remove stale cached profile");
                }
                self.publish_signed_out(None);
            }
        }

        self.update(|session| session.initialized = true);
        self.snapshot()
    }

    // =========================================================================
    // Sign-in
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` when the backend rejects the credentials
    /// - `NetworkError` when the request cannot complete
    /// - `Storage` when the token cannot be persisted
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: Credentials) -> Result<UserProfile, SessionError> {
        let attempt = self.inner.backend.login(&credentials);
        self.sign_in(attempt).await
    }

    /// Exchange a third-party identity token for a session.
    ///
    /// # Errors
    ///
    /// Same as [`Self::login`].
    #[instrument(skip(self, login), fields(provider = ?login.provider))]
    pub async fn social_login(&self, login: SocialLogin) -> Result<UserProfile, SessionError> {
        let attempt = self.inner.backend.social_login(&login);
        self.sign_in(attempt).await
    }

    /// Submit a registration form.
    ///
    /// The session becomes authenticated only when the backend returns a
    /// token. Pharmacy registrations await approval and never do.
    ///
    /// # Errors
    ///
    /// - `DuplicateAccount` when the email is already registered
    /// - `ServerUnavailable` on a 5xx response
    /// - `NetworkError` when the request cannot complete
    #[instrument(skip(self, form), fields(role = ?form.role(), email = %form.login_email()))]
    pub async fn register(
        &self,
        form: RegistrationForm,
    ) -> Result<RegistrationResult, SessionError> {
        let previous = self.begin_attempt();

        let outcome = match self.inner.backend.register(&form).await {
            Ok(payload) if payload.token.is_some() => {
                let message = payload.message.clone();
                self.establish(payload).map(|user| RegistrationResult {
                    user: Some(user),
                    authenticated: true,
                    message,
                })
            }
            Ok(payload) => {
                info!("Registration accepted without a session");
                self.update(|session| {
                    session.state = previous;
                    session.loading = false;
                    session.error = None;
                });
                Ok(RegistrationResult {
                    user: payload.user,
                    authenticated: false,
                    message: payload.message,
                })
            }
            Err(e) => Err(e),
        };

        outcome.inspect_err(|e| self.fail_attempt(previous, e))
    }

    async fn sign_in<F>(&self, attempt: F) -> Result<UserProfile, SessionError>
    where
        F: Future<Output = Result<AuthPayload, SessionError>>,
    {
        let previous = self.begin_attempt();
        attempt
            .await
            .and_then(|payload| self.establish(payload))
            .inspect_err(|e| self.fail_attempt(previous, e))
    }

    /// Enter `Authenticating` and return the state to fall back to on failure.
    fn begin_attempt(&self) -> SessionState {
        let mut previous = SessionState::Unauthenticated;
        self.update(|session| {
            previous = match session.state {
                SessionState::Authenticated => SessionState::Authenticated,
                _ => SessionState::Unauthenticated,
            };
            session.state = SessionState::Authenticating;
            session.loading = true;
            session.error = None;
        });
        previous
    }

    /// Persist a sign-in response and publish the authenticated session.
    fn establish(&self, payload: AuthPayload) -> Result<UserProfile, SessionError> {
        let token = payload
            .token
            .and_then(AccessToken::new)
            .ok_or_else(|| SessionError::Unknown("Response did not include a token".to_string()))?;
        let user = payload
            .user
            .ok_or_else(|| SessionError::Unknown("Response did not include a user".to_string()))?;

        self.inner.store.set(keys::AUTH_TOKEN, token.expose())?;
        if let Err(e) = save_json(&self.inner.store, keys::USER_DATA, &user) {
            // Half-written sessions are not left behind.
            self.clear_store();
            return Err(e.into());
        }

        info!(user_id = user.id.as_i64(), role = %user.user_type, "Signed in");
        let published = user.clone();
        self.update(|session| {
            session.state = SessionState::Authenticated;
            session.user = Some(published);
            session.loading = false;
            session.error = None;
        });
        Ok(user)
    }

    /// Publish `Error`, then settle back where the attempt started.
    ///
    /// A previous session is only restored while its token is still stored;
    /// a failed write may have cleared it.
    fn fail_attempt(&self, previous: SessionState, error: &SessionError) {
        warn!(error = %error, "Authentication attempt failed");
        let settled = if previous == SessionState::Authenticated && !self.has_stored_token() {
            warn!("Stored session was lost during the attempt, signing out");
            SessionState::Unauthenticated
        } else {
            previous
        };

        let message = error.user_message();
        self.update(|session| {
            session.state = SessionState::Error;
            session.loading = false;
            session.error = Some(message);
        });
        self.update(|session| {
            session.state = settled;
            if settled != SessionState::Authenticated {
                session.user = None;
            }
        });
    }

    // =========================================================================
    // Sign-out
    // =========================================================================

    /// End the session.
    ///
    /// The server is told on a best-effort basis; local state is cleared
    /// regardless. Calling this with no session is a no-op.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        match self.stored_token() {
            Ok(Some(token)) => {
                if let Err(e) = self.inner.backend.logout(&token).await {
                    warn!(error = %e, "Server-side logout failed, clearing local session anyway");
                }
            }
            Ok(None) => debug!("Logout without a stored token"),
            Err(e) => warn!(error = %e, "Could not read stored token during logout"),
        }

        self.clear_store();
        self.publish_signed_out(None);
        info!("Signed out");
    }

    /// Run an authenticated call with the stored token.
    ///
    /// A `TokenExpired` result signs the session out before being returned.
    ///
    /// # Errors
    ///
    /// - `NotAuthenticated` when no token is stored
    /// - `TokenExpired` when the backend rejected the token
    /// - any error returned by `call`
    pub async fn authorized<T, F, Fut>(&self, call: F) -> Result<T, SessionError>
    where
        F: FnOnce(AccessToken) -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let token = self.stored_token()?.ok_or(SessionError::NotAuthenticated)?;
        match call(token).await {
            Err(SessionError::TokenExpired) => {
                self.handle_unauthorized();
                Err(SessionError::TokenExpired)
            }
            other => other,
        }
    }

    /// Sign out locally after the backend rejected the token.
    ///
    /// The server is not contacted; the token is already dead.
    pub fn handle_unauthorized(&self) {
        warn!("Session token rejected, signing out");
        self.clear_store();
        self.publish_signed_out(Some(SessionError::TokenExpired.user_message()));
    }

    fn clear_store(&self) {
        for key in [keys::AUTH_TOKEN, keys::USER_DATA] {
            if let Err(e) = self.inner.store.remove(key) {
                warn!(error = %e, key, "Could not clear stored session data");
            }
        }
    }

    fn publish_signed_out(&self, error: Option<String>) {
        self.update(|session| {
            session.state = SessionState::Unauthenticated;
            session.user = None;
            session.loading = false;
            session.error = error;
        });
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Check the stored token against the server and refresh the profile.
    ///
    /// # Errors
    ///
    /// - `NotAuthenticated` when no token is stored
    /// - `TokenExpired` when the server rejected the token (the session is
    ///   signed out)
    #[instrument(skip(self))]
    pub async fn verify_session(&self) -> Result<UserProfile, SessionError> {
        let backend = &self.inner.backend;
        let user = self
            .authorized(|token| async move { backend.profile(&token).await })
            .await?;

        // A logout may have finished while the request was in flight.
        if !self.has_stored_token() {
            debug!("Session ended during verification, discarding profile");
            return Err(SessionError::NotAuthenticated);
        }

        save_json(&self.inner.store, keys::USER_DATA, &user)?;
        let published = user.clone();
        self.update(|session| {
            session.state = SessionState::Authenticated;
            session.user = Some(published);
        });
        debug!(user_id = user.id.as_i64(), "Session verified");
        Ok(user)
    }

    /// Merge `patch` into the cached profile.
    ///
    /// Returns `None` without changing anything when no user is signed in.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the updated profile cannot be persisted.
    pub fn update_user(&self, patch: ProfilePatch) -> Result<Option<UserProfile>, SessionError> {
        let current = {
            let session = self.inner.state.borrow();
            if !session.is_authenticated() {
                return Ok(None);
            }
            session.user.clone()
        };
        let Some(mut user) = current else {
            return Ok(None);
        };

        user.apply(patch);
        save_json(&self.inner.store, keys::USER_DATA, &user)?;
        let published = user.clone();
        self.update(|session| session.user = Some(published));
        Ok(Some(user))
    }

    // =========================================================================
    // Password reset
    // =========================================================================

    /// Ask the backend to email a reset link.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEmail` for a malformed address, or the backend error.
    #[instrument(skip(self))]
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<String>, SessionError> {
        let email = Email::parse(email)?;
        self.inner.backend.request_password_reset(&email).await
    }

    /// Check whether a reset token from an emailed link is usable.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank token, or the backend error.
    #[instrument(skip(self, token))]
    pub async fn verify_reset_token(&self, token: &str) -> Result<ResetTokenStatus, SessionError> {
        if token.trim().is_empty() {
            return Err(SessionError::Validation("Invalid reset link".to_string()));
        }
        self.inner.backend.verify_reset_token(token).await
    }

    /// Set a new password using a reset token.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the token is blank or the passwords differ;
    /// nothing is sent in that case.
    #[instrument(skip(self, confirmation))]
    pub async fn confirm_password_reset(
        &self,
        confirmation: PasswordResetConfirmation,
    ) -> Result<Option<String>, SessionError> {
        if confirmation.token.trim().is_empty() {
            return Err(SessionError::Validation("Invalid reset link".to_string()));
        }
        if !confirmation.passwords_match() {
            return Err(SessionError::Validation("Passwords do not match".to_string()));
        }
        self.inner.backend.confirm_password_reset(&confirmation).await
    }

    /// Apply `change` to the session and announce any state transition.
    fn update(&self, change: impl FnOnce(&mut Session)) {
        let mut transition = None;
        self.inner.state.send_modify(|session| {
            let before = session.state;
            change(session);
            if session.state != before {
                transition = Some(session.state);
            }
        });
        if let Some(state) = transition {
            // No receivers is not an error.
            let _ = self.inner.transitions.send(state);
        }
    }

    fn has_stored_token(&self) -> bool {
        matches!(self.stored_token(), Ok(Some(_)))
    }

    fn stored_token(&self) -> Result<Option<AccessToken>, SessionError> {
        Ok(self
            .inner
            .store
            .get(keys::AUTH_TOKEN)?
            .and_then(AccessToken::new))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use pharmadesk_core::UserRole;
    use secrecy::SecretString;
    use serde_json::json;
    use tokio::sync::Notify;

    use super::*;
    use crate::models::{CustomerRegistration, PharmacyRegistration};
    use crate::storage::{MemoryTokenStore, StorageError};

    enum Reply {
        Auth(AuthPayload),
        Profile(UserProfile),
        Done,
    }

    /// Backend that answers from a queue and records which calls were made.
    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<Reply, SessionError>>>,
        calls: Mutex<Vec<&'static str>>,
        /// When set, `profile` waits for a notification before answering.
        profile_gate: Option<Notify>,
    }

    impl ScriptedBackend {
        fn with(replies: Vec<Result<Reply, SessionError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Self::default()
            }
        }

        fn gated(replies: Vec<Result<Reply, SessionError>>) -> Self {
            Self {
                profile_gate: Some(Notify::new()),
                ..Self::with(replies)
            }
        }

        fn open_gate(&self) {
            if let Some(gate) = &self.profile_gate {
                gate.notify_one();
            }
        }

        fn next(&self, call: &'static str) -> Result<Reply, SessionError> {
            self.calls.lock().unwrap().push(call);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SessionError::NetworkError("no scripted reply".to_string())))
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn auth(&self, call: &'static str) -> Result<AuthPayload, SessionError> {
            match self.next(call)? {
                Reply::Auth(payload) => Ok(payload),
                _ => panic!("unexpected reply for {call}"),
            }
        }
    }

    impl AuthBackend for ScriptedBackend {
        async fn login(&self, _: &Credentials) -> Result<AuthPayload, SessionError> {
            self.auth("login")
        }

        async fn register(&self, _: &RegistrationForm) -> Result<AuthPayload, SessionError> {
            self.auth("register")
        }

        async fn social_login(&self, _: &SocialLogin) -> Result<AuthPayload, SessionError> {
            self.auth("social_login")
        }

        async fn logout(&self, _: &AccessToken) -> Result<(), SessionError> {
            self.next("logout").map(|_| ())
        }

        async fn profile(&self, _: &AccessToken) -> Result<UserProfile, SessionError> {
            let reply = self.next("profile");
            if let Some(gate) = &self.profile_gate {
                gate.notified().await;
            }
            match reply? {
                Reply::Profile(user) => Ok(user),
                _ => panic!("unexpected reply for profile"),
            }
        }

        async fn request_password_reset(&self, _: &Email) -> Result<Option<String>, SessionError> {
            self.next("request_password_reset").map(|_| None)
        }

        async fn verify_reset_token(&self, _: &str) -> Result<ResetTokenStatus, SessionError> {
            self.next("verify_reset_token").map(|_| ResetTokenStatus {
                valid: true,
                message: None,
            })
        }

        async fn confirm_password_reset(
            &self,
            _: &PasswordResetConfirmation,
        ) -> Result<Option<String>, SessionError> {
            self.next("confirm_password_reset").map(|_| None)
        }
    }

    /// Memory store whose profile writes fail once `broken` is set.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryTokenStore,
        broken: AtomicBool,
    }

    impl TokenStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == keys::USER_DATA && self.broken.load(Ordering::SeqCst) {
                return Err(StorageError::Poisoned);
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    type TestManager = SessionManager<Arc<ScriptedBackend>, Arc<MemoryTokenStore>>;

    fn manager(
        replies: Vec<Result<Reply, SessionError>>,
    ) -> (TestManager, Arc<ScriptedBackend>, Arc<MemoryTokenStore>) {
        let backend = Arc::new(ScriptedBackend::with(replies));
        let store = Arc::new(MemoryTokenStore::new());
        let manager = SessionManager::new(Arc::clone(&backend), Arc::clone(&store));
        (manager, backend, store)
    }

    fn user(id: i64, role: &str) -> UserProfile {
        serde_json::from_value(json!({
            "id": id,
            "email": format!("user{id}@example.com"),
            "firstName": "Test",
            "userType": role
        }))
        .unwrap()
    }

    fn signed_in(token: &str, user: UserProfile) -> Result<Reply, SessionError> {
        Ok(Reply::Auth(AuthPayload {
            token: Some(token.to_string()),
            user: Some(user),
            message: None,
        }))
    }

    fn credentials() -> Credentials {
        Credentials::new("a@b.com", "password1").unwrap()
    }

    fn jwt_with_exp(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#));
        format!("{header}.{payload}.sig")
    }

    fn customer_form() -> RegistrationForm {
        RegistrationForm::Customer(CustomerRegistration {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: Email::parse("ada@example.com").unwrap(),
            phone: "0771234567".to_string(),
            password: SecretString::from("password1".to_string()),
            date_of_birth: None,
            terms_accepted: true,
        })
    }

    fn pharmacy_form() -> RegistrationForm {
        RegistrationForm::Pharmacy(PharmacyRegistration {
            name: "Central Pharmacy".to_string(),
            address: "1 Main St".to_string(),
            phone_number: "0112345678".to_string(),
            email: Email::parse("central@pharmacy.lk").unwrap(),
            license_number: "PH-001".to_string(),
            license_expiry_date: None,
            operating_hours: std::collections::BTreeMap::new(),
            services: vec!["delivery".to_string()],
            delivery_available: true,
            delivery_radius_km: Some(5),
            admin_first_name: "Owner".to_string(),
            admin_last_name: "One".to_string(),
            admin_email: Email::parse("owner@pharmacy.lk").unwrap(),
            admin_password: SecretString::from("password1".to_string()),
        })
    }

    #[tokio::test]
    async fn test_login_persists_token_and_profile() {
        let (manager, _, store) = manager(vec![signed_in("tok-1", user(1, "customer"))]);

        let profile = manager.login(credentials()).await.unwrap();

        let session = manager.snapshot();
        assert!(session.is_authenticated());
        assert_eq!(session.user.as_ref(), Some(&profile));
        assert!(!session.loading);
        assert!(session.error.is_none());
        assert_eq!(store.get(keys::AUTH_TOKEN).unwrap().as_deref(), Some("tok-1"));
        assert!(store.get(keys::USER_DATA).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_login_then_logout_clears_everything() {
        let (manager, backend, store) =
            manager(vec![signed_in("tok-1", user(1, "customer")), Ok(Reply::Done)]);

        manager.login(credentials()).await.unwrap();
        manager.logout().await;

        let session = manager.snapshot();
        assert_eq!(session.state, SessionState::Unauthenticated);
        assert!(session.user.is_none());
        assert!(store.is_empty().unwrap());
        assert_eq!(backend.calls(), vec!["login", "logout"]);
    }

    #[tokio::test]
    async fn test_rejected_login_leaves_no_session() {
        let (manager, _, store) = manager(vec![Err(SessionError::InvalidCredentials(
            "Invalid credentials".to_string(),
        ))]);

        let err = manager.login(credentials()).await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::InvalidCredentials(ref m) if m == "Invalid credentials"
        ));
        let session = manager.snapshot();
        assert_eq!(session.state, SessionState::Unauthenticated);
        assert!(session.user.is_none());
        assert_eq!(session.error.as_deref(), Some("Invalid credentials"));
        assert!(store.get(keys::AUTH_TOKEN).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_failure_is_reported() {
        let (manager, _, _) = manager(vec![Err(SessionError::NetworkError(
            "connection refused".to_string(),
        ))]);

        let err = manager.login(credentials()).await.unwrap_err();

        assert!(matches!(err, SessionError::NetworkError(_)));
        assert!(!manager.is_authenticated());
        assert!(manager.snapshot().error.is_some());
    }

    #[tokio::test]
    async fn test_failed_login_keeps_existing_session() {
        let (manager, _, store) = manager(vec![
            signed_in("tok-1", user(1, "customer")),
            Err(SessionError::InvalidCredentials("Invalid credentials".to_string())),
        ]);
        let first = manager.login(credentials()).await.unwrap();

        manager.login(credentials()).await.unwrap_err();

        let session = manager.snapshot();
        assert!(session.is_authenticated());
        assert_eq!(session.user, Some(first));
        assert!(session.error.is_some());
        assert_eq!(store.get(keys::AUTH_TOKEN).unwrap().as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_failed_relogin_write_does_not_leave_orphaned_session() {
        let backend = Arc::new(ScriptedBackend::with(vec![
            signed_in("tok-1", user(1, "customer")),
            signed_in("tok-2", user(1, "customer")),
        ]));
        let store = Arc::new(FlakyStore::default());
        let manager = SessionManager::new(Arc::clone(&backend), Arc::clone(&store));
        manager.login(credentials()).await.unwrap();

        store.broken.store(true, Ordering::SeqCst);
        let err = manager.login(credentials()).await.unwrap_err();

        assert!(matches!(err, SessionError::Storage(StorageError::Poisoned)));
        let session = manager.snapshot();
        assert_eq!(session.state, SessionState::Unauthenticated);
        assert!(session.user.is_none());
        assert!(session.error.is_some());
        assert!(store.get(keys::AUTH_TOKEN).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transitions_include_error_state() {
        let (manager, _, _) = manager(vec![Err(SessionError::InvalidCredentials(
            "Invalid credentials".to_string(),
        ))]);
        let mut transitions = manager.transitions();
        let mut rx = manager.subscribe();

        manager.login(credentials()).await.unwrap_err();

        let mut seen = Vec::new();
        while let Ok(state) = transitions.try_recv() {
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                SessionState::Authenticating,
                SessionState::Error,
                SessionState::Unauthenticated,
            ]
        );
        // The snapshot channel only holds the settled value.
        assert_eq!(rx.borrow_and_update().state, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_transitions_on_sign_in_and_out() {
        let (manager, _, _) = manager(vec![signed_in("tok-1", user(1, "admin")), Ok(Reply::Done)]);
        let mut transitions = manager.transitions();

        manager.login(credentials()).await.unwrap();
        manager.logout().await;

        assert_eq!(transitions.try_recv().unwrap(), SessionState::Authenticating);
        assert_eq!(transitions.try_recv().unwrap(), SessionState::Authenticated);
        assert_eq!(transitions.try_recv().unwrap(), SessionState::Unauthenticated);
        assert!(transitions.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_response_without_token_is_rejected() {
        let (manager, _, store) = manager(vec![Ok(Reply::Auth(AuthPayload {
            token: None,
            user: Some(user(1, "customer")),
            message: None,
        }))]);

        let err = manager.login(credentials()).await.unwrap_err();

        assert!(matches!(err, SessionError::Unknown(_)));
        assert!(!manager.is_authenticated());
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_subscribers_see_sign_in() {
        let (manager, _, _) = manager(vec![signed_in("tok-1", user(4, "pharmacist"))]);
        let mut rx = manager.subscribe();

        manager.login(credentials()).await.unwrap();

        assert!(rx.has_changed().unwrap());
        let session = rx.borrow_and_update().clone();
        assert!(session.has_role(UserRole::Pharmacist));
    }

    #[tokio::test]
    async fn test_social_login_signs_in() {
        let (manager, backend, _) = manager(vec![signed_in("tok-g", user(2, "customer"))]);

        manager
            .social_login(SocialLogin::google("google-id-token"))
            .await
            .unwrap();

        assert!(manager.is_authenticated());
        assert_eq!(backend.calls(), vec!["social_login"]);
    }

    #[test]
    fn test_rehydrate_trusts_stored_token_without_network() {
        let (manager, backend, store) = manager(vec![]);
        store.set(keys::AUTH_TOKEN, "opaque-token").unwrap();
        save_json(&*store, keys::USER_DATA, &user(3, "admin")).unwrap();

        let session = manager.rehydrate();

        assert!(session.initialized);
        assert!(session.is_authenticated());
        assert!(session.has_role(UserRole::Admin));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_rehydrate_discards_expired_jwt() {
        let (manager, backend, store) = manager(vec![]);
        let expired = jwt_with_exp(Utc::now().timestamp() - 60);
        store.set(keys::AUTH_TOKEN, &expired).unwrap();
        save_json(&*store, keys::USER_DATA, &user(3, "customer")).unwrap();

        let session = manager.rehydrate();

        assert!(session.initialized);
        assert!(!session.is_authenticated());
        assert!(store.is_empty().unwrap());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_rehydrate_empty_store() {
        let (manager, _, store) = manager(vec![]);
        save_json(&*store, keys::USER_DATA, &user(3, "customer")).unwrap();

        let session = manager.rehydrate();

        assert!(session.initialized);
        assert_eq!(session.state, SessionState::Unauthenticated);
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent_and_ignores_server_errors() {
        let (manager, backend, store) = manager(vec![
            signed_in("tok-1", user(1, "customer")),
            Err(SessionError::ServerUnavailable {
                status: 502,
                message: String::new(),
            }),
        ]);
        manager.login(credentials()).await.unwrap();

        manager.logout().await;
        let first = manager.snapshot();
        manager.logout().await;

        assert_eq!(manager.snapshot(), first);
        assert!(!first.is_authenticated());
        assert!(store.is_empty().unwrap());
        // The second logout has no token to send.
        assert_eq!(backend.calls(), vec!["login", "logout"]);
    }

    #[tokio::test]
    async fn test_customer_registration_with_token_signs_in() {
        let (manager, _, _) = manager(vec![signed_in("tok-r", user(8, "customer"))]);

        let result = manager.register(customer_form()).await.unwrap();

        assert!(result.authenticated);
        assert!(manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_pharmacy_registration_awaits_approval() {
        let (manager, _, store) = manager(vec![Ok(Reply::Auth(AuthPayload {
            token: None,
            user: None,
            message: Some("Registration submitted for approval".to_string()),
        }))]);

        let result = manager.register(pharmacy_form()).await.unwrap();

        assert!(!result.authenticated);
        assert_eq!(
            result.message.as_deref(),
            Some("Registration submitted for approval")
        );
        let session = manager.snapshot();
        assert_eq!(session.state, SessionState::Unauthenticated);
        assert!(!session.loading);
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_registration_message() {
        let (manager, _, _) = manager(vec![Err(SessionError::DuplicateAccount(
            "Email already registered".to_string(),
        ))]);

        let err = manager.register(customer_form()).await.unwrap_err();

        assert!(matches!(err, SessionError::DuplicateAccount(_)));
        assert_eq!(
            manager.snapshot().error.as_deref(),
            Some("An account with this email already exists")
        );
    }

    #[tokio::test]
    async fn test_rejected_token_forces_logout() {
        let (manager, backend, store) = manager(vec![
            signed_in("tok-1", user(1, "customer")),
            Err(SessionError::TokenExpired),
        ]);
        manager.login(credentials()).await.unwrap();

        let err = manager.verify_session().await.unwrap_err();

        assert!(matches!(err, SessionError::TokenExpired));
        let session = manager.snapshot();
        assert!(!session.is_authenticated());
        assert!(session.user.is_none());
        assert!(session.error.is_some());
        assert!(store.is_empty().unwrap());
        // The dead token is not sent to the logout endpoint.
        assert_eq!(backend.calls(), vec!["login", "profile"]);
    }

    #[tokio::test]
    async fn test_authorized_passes_other_errors_through() {
        let (manager, _, _) = manager(vec![signed_in("tok-1", user(1, "customer"))]);
        manager.login(credentials()).await.unwrap();

        let result: Result<(), _> = manager
            .authorized(|token| async move {
                assert_eq!(token.expose(), "tok-1");
                Err(SessionError::Unknown("boom".to_string()))
            })
            .await;

        assert!(matches!(result, Err(SessionError::Unknown(_))));
        assert!(manager.is_authenticated());
    }

    #[tokio::test]
    async fn test_verify_session_refreshes_profile() {
        let mut fresh = user(1, "pharmacy-admin");
        fresh.pharmacy_name = Some("Central".to_string());
        let (manager, _, store) = manager(vec![Ok(Reply::Profile(fresh.clone()))]);
        store.set(keys::AUTH_TOKEN, "opaque").unwrap();
        manager.rehydrate();

        let verified = manager.verify_session().await.unwrap();

        assert_eq!(verified, fresh);
        assert_eq!(manager.user(), Some(fresh.clone()));
        let cached: Option<UserProfile> = load_json(&*store, keys::USER_DATA).unwrap();
        assert_eq!(cached, Some(fresh));
    }

    #[tokio::test]
    async fn test_logout_during_verification_is_not_undone() {
        let backend = Arc::new(ScriptedBackend::gated(vec![
            Ok(Reply::Profile(user(1, "pharmacist"))),
            Ok(Reply::Done),
        ]));
        let store = Arc::new(MemoryTokenStore::new());
        store.set(keys::AUTH_TOKEN, "opaque").unwrap();
        let manager = SessionManager::new(Arc::clone(&backend), Arc::clone(&store));
        manager.rehydrate();

        let (verified, ()) = tokio::join!(manager.verify_session(), async {
            manager.logout().await;
            backend.open_gate();
        });

        assert!(matches!(verified, Err(SessionError::NotAuthenticated)));
        assert!(!manager.is_authenticated());
        assert!(manager.user().is_none());
        assert!(store.get(keys::AUTH_TOKEN).unwrap().is_none());
        assert!(store.get(keys::USER_DATA).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_verify_session_without_token() {
        let (manager, backend, _) = manager(vec![]);

        let err = manager.verify_session().await.unwrap_err();

        assert!(matches!(err, SessionError::NotAuthenticated));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_user_merges_and_persists() {
        let (manager, _, store) = manager(vec![signed_in("tok-1", user(1, "customer"))]);
        assert!(manager.update_user(ProfilePatch::default()).unwrap().is_none());
        manager.login(credentials()).await.unwrap();

        let updated = manager
            .update_user(ProfilePatch {
                first_name: Some("Renamed".to_string()),
                ..ProfilePatch::default()
            })
            .unwrap()
            .unwrap();

        assert_eq!(updated.first_name.as_deref(), Some("Renamed"));
        assert_eq!(manager.user(), Some(updated.clone()));
        let cached: Option<UserProfile> = load_json(&*store, keys::USER_DATA).unwrap();
        assert_eq!(cached, Some(updated));
    }

    #[tokio::test]
    async fn test_password_reset_mismatch_is_local() {
        let (manager, backend, _) = manager(vec![]);

        let err = manager
            .confirm_password_reset(PasswordResetConfirmation {
                token: "reset-token".to_string(),
                new_password: SecretString::from("password1".to_string()),
                confirm_password: SecretString::from("password2".to_string()),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Validation(ref m) if m == "Passwords do not match"
        ));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_password_reset_request_validates_email() {
        let (manager, backend, _) = manager(vec![Ok(Reply::Done)]);

        assert!(matches!(
            manager.request_password_reset("not-an-email").await,
            Err(SessionError::InvalidEmail(_))
        ));
        manager.request_password_reset("a@b.com").await.unwrap();
        assert!(manager.verify_reset_token("  ").await.is_err());

        assert_eq!(backend.calls(), vec!["request_password_reset"]);
        assert!(!manager.is_authenticated());
    }
}
