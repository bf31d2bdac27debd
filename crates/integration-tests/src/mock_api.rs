//! In-process stand-in for the Pharmadesk REST API.
//!
//! Serves the `/api/auth/*` endpoints from memory on an ephemeral port and
//! records every request it sees.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pharmadesk_core::UserRole;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

/// Reset token the mock hands out for every reset request.
pub const RESET_TOKEN: &str = "reset-token-1";

/// ID token the mock accepts for Google sign-in.
pub const GOOGLE_ID_TOKEN: &str = "valid-google-id-token";

/// Email of the account behind [`GOOGLE_ID_TOKEN`].
pub const GOOGLE_EMAIL: &str = "google.user@example.com";

/// One request as seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub request_id: Option<String>,
    pub authorization: Option<String>,
}

struct Account {
    password: String,
    profile: Value,
    /// Pharmacy accounts cannot sign in until approved.
    approved: bool,
}

#[derive(Default)]
struct MockState {
    accounts: Mutex<HashMap<String, Account>>,
    /// Live bearer tokens, mapped to the account email.
    tokens: Mutex<HashMap<String, String>>,
    /// Outstanding reset tokens, mapped to the account email.
    reset_tokens: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<RecordedRequest>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockState {
    fn create_account(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
        mut profile: Value,
    ) -> Value {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(map) = profile.as_object_mut() {
            map.insert("id".to_string(), json!(id));
            map.insert("email".to_string(), json!(email));
            map.insert("userType".to_string(), json!(role.as_str()));
        }
        lock(&self.accounts).insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                profile: profile.clone(),
                approved: role != UserRole::PharmacyAdmin,
            },
        );
        profile
    }

    fn issue_token(&self, email: &str) -> String {
        let token = format!("tok-{}", Uuid::new_v4());
        lock(&self.tokens).insert(token.clone(), email.to_string());
        token
    }

    fn profile_for_token(&self, headers: &HeaderMap) -> Option<Value> {
        let token = bearer(headers)?;
        let email = lock(&self.tokens).get(&token).cloned()?;
        lock(&self.accounts).get(&email).map(|a| a.profile.clone())
    }
}

/// A running mock API server. Stops when dropped.
pub struct MockApi {
    addr: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockApi {
    /// Start the server on `127.0.0.1` with an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the listener cannot be bound.
    pub async fn spawn() -> std::io::Result<Self> {
        let state = Arc::new(MockState::default());

        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register/{role}", post(register))
            .route("/api/auth/social-login", post(social_login))
            .route("/api/auth/logout", post(logout))
            .route("/api/auth/profile", get(profile))
            .route("/api/auth/password-reset/request", post(reset_request))
            .route("/api/auth/password-reset/verify", post(reset_verify))
            .route("/api/auth/password-reset/confirm", post(reset_confirm))
            .layer(middleware::from_fn_with_state(Arc::clone(&state), record))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    /// API root the session client should be configured with.
    ///
    /// # Panics
    ///
    /// Panics if the socket address does not form a valid URL.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/api/", self.addr)).expect("mock address is a valid URL")
    }

    /// Create an approved account that can sign in immediately.
    pub fn add_account(&self, email: &str, password: &str, role: UserRole) {
        self.state.create_account(
            email,
            password,
            role,
            json!({"firstName": "Test", "lastName": role.as_str()}),
        );
    }

    /// Invalidate every issued bearer token, as a server-side expiry would.
    pub fn revoke_tokens(&self) {
        lock(&self.state.tokens).clear();
    }

    /// Number of bearer tokens currently accepted.
    #[must_use]
    pub fn live_tokens(&self) -> usize {
        lock(&self.state.tokens).len()
    }

    /// Make every endpoint answer 503.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state.requests).clone()
    }

    /// Requests received for `path` (e.g. `/api/auth/logout`).
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// =============================================================================
// Handlers
// =============================================================================

type Shared = Arc<MockState>;

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn field(body: &Value, name: &str) -> String {
    body.get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let recorded = {
        let header_value = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        RecordedRequest {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            request_id: header_value("x-request-id"),
            authorization: header_value("authorization"),
        }
    };
    lock(&state.requests).push(recorded);

    if state.unavailable.load(Ordering::SeqCst) {
        return reply(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({"message": "Down for maintenance"}),
        );
    }
    next.run(request).await
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let email = field(&body, "email");
    let password = field(&body, "password");

    let profile = lock(&state.accounts)
        .get(&email)
        .filter(|a| a.password == password && a.approved)
        .map(|a| a.profile.clone());

    match profile {
        Some(user) => {
            let user_type = user.get("userType").cloned().unwrap_or(Value::Null);
            reply(
                StatusCode::OK,
                json!({
                    "success": true,
                    "token": state.issue_token(&email),
                    "user": user,
                    "userType": user_type,
                }),
            )
        }
        None => reply(
            StatusCode::UNAUTHORIZED,
            json!({"success": false, "message": "Invalid credentials"}),
        ),
    }
}

async fn register(
    State(state): State<Shared>,
    Path(role): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let (email, password) = match role.as_str() {
        "customer" => (field(&body, "email"), field(&body, "password")),
        "pharmacy" => (field(&body, "adminEmail"), field(&body, "adminPassword")),
        _ => return reply(StatusCode::NOT_FOUND, json!({"message": "Unknown role"})),
    };

    if lock(&state.accounts).contains_key(&email) {
        return reply(
            StatusCode::CONFLICT,
            json!({"success": false, "message": "Email already registered"}),
        );
    }

    if role == "pharmacy" {
        state.create_account(
            &email,
            &password,
            UserRole::PharmacyAdmin,
            json!({
                "firstName": field(&body, "adminFirstName"),
                "lastName": field(&body, "adminLastName"),
                "pharmacyName": field(&body, "name"),
            }),
        );
        return reply(
            StatusCode::CREATED,
            json!({
                "success": true,
                "message": "Registration submitted. Your pharmacy will be activated after approval.",
            }),
        );
    }

    let user = state.create_account(
        &email,
        &password,
        UserRole::Customer,
        json!({
            "firstName": field(&body, "firstName"),
            "lastName": field(&body, "lastName"),
        }),
    );
    reply(
        StatusCode::CREATED,
        json!({"success": true, "token": state.issue_token(&email), "user": user}),
    )
}

async fn social_login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    if field(&body, "provider") != "google" || field(&body, "idToken") != GOOGLE_ID_TOKEN {
        return reply(
            StatusCode::UNAUTHORIZED,
            json!({"success": false, "message": "Invalid Google token"}),
        );
    }

    let existing = lock(&state.accounts)
        .get(GOOGLE_EMAIL)
        .map(|a| a.profile.clone());
    let user = existing.unwrap_or_else(|| {
        state.create_account(
            GOOGLE_EMAIL,
            "",
            UserRole::Customer,
            json!({"fullName": "Google User"}),
        )
    });
    reply(
        StatusCode::OK,
        json!({"success": true, "token": state.issue_token(GOOGLE_EMAIL), "user": user}),
    )
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some(token) if lock(&state.tokens).remove(&token).is_some() => {
            reply(StatusCode::OK, json!({"success": true}))
        }
        _ => reply(StatusCode::UNAUTHORIZED, json!({"message": "Unauthorized"})),
    }
}

async fn profile(State(state): State<Shared>, headers: HeaderMap) -> Response {
    match state.profile_for_token(&headers) {
        Some(user) => reply(StatusCode::OK, json!({"success": true, "user": user})),
        None => reply(StatusCode::UNAUTHORIZED, json!({"message": "Unauthorized"})),
    }
}

async fn reset_request(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let email = field(&body, "email");
    if lock(&state.accounts).contains_key(&email) {
        lock(&state.reset_tokens).insert(RESET_TOKEN.to_string(), email);
    }
    reply(
        StatusCode::OK,
        json!({"success": true, "message": "If the account exists, a reset link has been sent"}),
    )
}

async fn reset_verify(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    if lock(&state.reset_tokens).contains_key(&field(&body, "token")) {
        reply(
            StatusCode::OK,
            json!({"success": true, "message": "Token is valid"}),
        )
    } else {
        reply(
            StatusCode::BAD_REQUEST,
            json!({"success": false, "message": "Invalid or expired reset token"}),
        )
    }
}

async fn reset_confirm(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let new_password = field(&body, "newPassword");
    if new_password != field(&body, "confirmPassword") {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({"success": false, "message": "Passwords do not match"}),
        );
    }

    let Some(email) = lock(&state.reset_tokens).remove(&field(&body, "token")) else {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({"success": false, "message": "Invalid or expired reset token"}),
        );
    };
    if let Some(account) = lock(&state.accounts).get_mut(&email) {
        account.password = new_password;
    }
    reply(
        StatusCode::OK,
        json!({"success": true, "message": "Password has been reset"}),
    )
}
