//! In-process auth server and client builders shared by the crate's tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use storage::{MemoryStorage, StorageAdapter, StorageFuture};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use session_auth::{CredentialStore, REFRESH_TOKEN_PATH};

use crate::pipeline::{ApiClient, PipelineConfig};

/// The only password the mock login endpoint accepts.
pub const PASSWORD: &str = "Sup3r$ecret";

#[derive(Debug, Clone, Copy)]
pub enum RefreshMode {
    /// 200 with `at_new` / `rt_new`.
    Rotate,
    /// 200 with only the access token header.
    OmitRefreshHeader,
    /// 401 failure envelope.
    Reject,
}

pub struct MockState {
    pub refresh_calls: AtomicUsize,
    pub always_401_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    refresh_mode: Mutex<RefreshMode>,
    refresh_delay: Mutex<Duration>,
    refresh_authorizations: Mutex<Vec<String>>,
    protected_authorizations: Mutex<Vec<String>>,
}

pub struct MockAuthServer {
    pub url: String,
    pub state: Arc<MockState>,
}

impl MockAuthServer {
    pub async fn start() -> Self {
        let state = Arc::new(MockState {
            refresh_calls: AtomicUsize::new(0),
            always_401_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            refresh_mode: Mutex::new(RefreshMode::Rotate),
            refresh_delay: Mutex::new(Duration::ZERO),
            refresh_authorizations: Mutex::new(Vec::new()),
            protected_authorizations: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/protected", get(protected))
            .route("/plain-401", get(plain_401))
            .route("/always-401", get(always_401))
            .route("/missing", get(missing))
            .route("/invalid", get(invalid))
            .route("/not-json", get(not_json))
            .route("/echo", post(echo))
            .route("/api/v1/auth/refresh-token", post(refresh))
            .route("/api/v1/auth/login", post(login))
            .route("/api/v1/auth/register", post(register))
            .route("/api/v1/auth/logout", post(logout))
            .route("/api/v1/otp", post(send_otp))
            .route("/api/v1/otp/verify", post(verify_otp))
            .route("/api/v1/users/check-username/{username}", get(check_username))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { url, state }
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.state.refresh_mode.lock().unwrap() = mode;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.state.refresh_delay.lock().unwrap() = delay;
    }

    pub fn refresh_authorizations(&self) -> Vec<String> {
        self.state.refresh_authorizations.lock().unwrap().clone()
    }

    pub fn protected_authorizations(&self) -> Vec<String> {
        self.state.protected_authorizations.lock().unwrap().clone()
    }
}

/// Base URL of a port nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub async fn client_with_tokens(
    base_url: &str,
    access: Option<&str>,
    refresh: Option<&str>,
) -> ApiClient {
    client_with_config(PipelineConfig::new(base_url), access, refresh).await
}

pub async fn client_with_config(
    config: PipelineConfig,
    access: Option<&str>,
    refresh: Option<&str>,
) -> ApiClient {
    client_on(config, Arc::new(MemoryStorage::new()), access, refresh).await
}

/// Client over `storage`, seeded before any of its knobs are turned.
pub async fn client_with_storage(
    base_url: &str,
    storage: Arc<TunableStorage>,
    access: Option<&str>,
    refresh: Option<&str>,
) -> ApiClient {
    client_on(PipelineConfig::new(base_url), storage, access, refresh).await
}

async fn client_on(
    config: PipelineConfig,
    adapter: Arc<dyn StorageAdapter>,
    access: Option<&str>,
    refresh: Option<&str>,
) -> ApiClient {
    let store = CredentialStore::with_default_keys(adapter);
    if let Some(token) = access {
        store.save_access_token(token).await;
    }
    if let Some(token) = refresh {
        store.save_refresh_token(token).await;
    }
    ApiClient::new(config, reqwest::Client::new(), Arc::new(store))
}

/// Memory storage that can slow its writes down, or keep values written from
/// now on out of later reads.
#[derive(Debug, Default)]
pub struct TunableStorage {
    inner: MemoryStorage,
    write_delay: Mutex<Duration>,
    hide_writes: AtomicBool,
    hidden: Mutex<HashSet<String>>,
}

impl TunableStorage {
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = delay;
    }

    /// Keys written after this call read as absent.
    pub fn hide_writes(&self) {
        self.hide_writes.store(true, Ordering::SeqCst);
    }
}

impl StorageAdapter for TunableStorage {
    fn id(&self) -> &str {
        "tunable"
    }

    fn get<'a>(&'a self, key: &'a str) -> StorageFuture<'a, Option<String>> {
        Box::pin(async move {
            let hidden = self.hidden.lock().unwrap().contains(key);
            if hidden {
                return Ok(None);
            }
            self.inner.get(key).await
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let delay = *self.write_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if self.hide_writes.load(Ordering::SeqCst) {
                self.hidden.lock().unwrap().insert(key.to_string());
            }
            self.inner.set(key, value).await
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()> {
        self.inner.remove(key)
    }
}

/// Bare HTTP/1.1 server whose refresh endpoint reads the request, waits, then
/// closes the connection without answering. Every other request gets a 401
/// `token_expired` envelope.
pub struct HangupServer {
    pub url: String,
    pub refresh_calls: Arc<AtomicUsize>,
}

impl HangupServer {
    pub async fn start(refresh_delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let refresh_calls = Arc::new(AtomicUsize::new(0));

        let calls = Arc::clone(&refresh_calls);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&chunk[..n]),
                        }
                    }

                    let refresh_line = format!("POST {REFRESH_TOKEN_PATH} ");
                    if head.starts_with(refresh_line.as_bytes()) {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(refresh_delay).await;
                        return;
                    }

                    let body = r#"{"status":"failed","message":"jwt expired","code":"token_expired"}"#;
                    let response = format!(
                        "HTTP/1.1 401 Unauthorized\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { url, refresh_calls }
    }
}

fn authorization(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

fn success(status: StatusCode, message: &str, data: Value) -> Response {
    (
        status,
        axum::Json(json!({"status": "success", "message": message, "data": data})),
    )
        .into_response()
}

fn failure(status: StatusCode, message: &str, code: &str) -> Response {
    (
        status,
        axum::Json(json!({"status": "failed", "message": message, "code": code})),
    )
        .into_response()
}

async fn protected(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let auth = authorization(&headers);
    state.protected_authorizations.lock().unwrap().push(auth.clone());
    if auth == "Bearer at_new" {
        success(StatusCode::OK, "ok", json!({"value": 42}))
    } else {
        failure(StatusCode::UNAUTHORIZED, "jwt expired", "token_expired")
    }
}

async fn plain_401(headers: HeaderMap) -> Response {
    if authorization(&headers) == "Bearer at_new" {
        success(StatusCode::OK, "ok", json!({"value": 7}))
    } else {
        (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
    }
}

async fn always_401(State(state): State<Arc<MockState>>) -> Response {
    state.always_401_calls.fetch_add(1, Ordering::SeqCst);
    failure(StatusCode::UNAUTHORIZED, "jwt expired", "token_expired")
}

async fn missing() -> Response {
    failure(StatusCode::NOT_FOUND, "profile not found", "resource_not_found")
}

async fn invalid() -> Response {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({
            "status": "failed",
            "message": "bad input",
            "code": "validation_error",
            "errors": [{"path": ["email"], "message": "Invalid email", "code": "invalid_string"}]
        })),
    )
        .into_response()
}

async fn not_json() -> Response {
    (StatusCode::OK, "hello").into_response()
}

/// Reflects what the pipeline sent, and pushes credential headers that must
/// be ignored on this path.
async fn echo(headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let mut response = success(
        StatusCode::OK,
        "echo",
        json!({"authorization": auth, "contentType": content_type, "body": body}),
    );
    let pushed = response.headers_mut();
    pushed.insert("authorization", "Bearer at_ignored".parse().unwrap());
    pushed.insert("refresh-token", "rt_ignored".parse().unwrap());
    response
}

async fn refresh(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    state
        .refresh_authorizations
        .lock()
        .unwrap()
        .push(authorization(&headers));

    let delay = *state.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mode = *state.refresh_mode.lock().unwrap();
    match mode {
        RefreshMode::Rotate => (
            StatusCode::OK,
            [("authorization", "Bearer at_new"), ("refresh-token", "rt_new")],
            axum::Json(json!({"status": "success", "message": "refreshed"})),
        )
            .into_response(),
        RefreshMode::OmitRefreshHeader => (
            StatusCode::OK,
            [("authorization", "Bearer at_new")],
            axum::Json(json!({"status": "success", "message": "refreshed"})),
        )
            .into_response(),
        RefreshMode::Reject => failure(
            StatusCode::UNAUTHORIZED,
            "invalid refresh token",
            "unauthorized",
        ),
    }
}

async fn login(axum::Json(body): axum::Json<Value>) -> Response {
    if body["password"] == PASSWORD {
        let mut response = success(StatusCode::OK, "logged in", json!({"userId": "u-1"}));
        let pushed = response.headers_mut();
        pushed.insert("authorization", "Bearer at_login".parse().unwrap());
        pushed.insert("refresh-token", "rt_login".parse().unwrap());
        response
    } else {
        failure(
            StatusCode::UNAUTHORIZED,
            "invalid credentials",
            "invalid_credentials",
        )
    }
}

async fn register(axum::Json(body): axum::Json<Value>) -> Response {
    if body["username"] == "taken" {
        return failure(StatusCode::CONFLICT, "username taken", "username_taken");
    }
    success(
        StatusCode::CREATED,
        "registered",
        json!({"userId": "u-2", "token": "verify-me"}),
    )
}

async fn logout(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    if authorization(&headers) == "Bearer at_revoked" {
        return failure(StatusCode::UNAUTHORIZED, "jwt revoked", "token_expired");
    }
    success(StatusCode::OK, "logged out", Value::Null)
}

async fn send_otp(axum::Json(body): axum::Json<Value>) -> Response {
    if body["otpType"] == "emailVerificationOtp" || body["otpType"] == "forgetPasswordOtp" {
        success(StatusCode::OK, "otp sent", json!({"token": "otp-token"}))
    } else {
        failure(StatusCode::BAD_REQUEST, "unknown otp type", "validation_error")
    }
}

async fn verify_otp(axum::Json(body): axum::Json<Value>) -> Response {
    if body["otp"] == "123456" && body["token"] == "otp-token" {
        let mut response = success(StatusCode::OK, "verified", json!({"actionToken": "act-1"}));
        let pushed = response.headers_mut();
        pushed.insert("authorization", "Bearer at_otp".parse().unwrap());
        pushed.insert("refresh-token", "rt_otp".parse().unwrap());
        response
    } else {
        failure(StatusCode::BAD_REQUEST, "invalid otp", "invalid_otp")
    }
}

async fn check_username(Path(username): Path<String>) -> Response {
    success(
        StatusCode::OK,
        "checked",
        json!({"isAvailable": username != "taken"}),
    )
}
