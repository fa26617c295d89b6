//! In-process mock of the RFP backend for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use parking_lot::Mutex;
use rfp_client::{AuthContext, ClientConfig, Gateway, MemoryStorage, Navigator};
use serde::Deserialize;
use serde_json::{Value, json};

pub const BUYER_EMAIL: &str = "buyer@example.com";
pub const BUYER_PASSWORD: &str = "password123";
pub const SUPPLIER_EMAIL: &str = "supplier@example.com";

const REFRESH_COOKIE: &str = "refresh_token";

struct Account {
    id: i64,
    password: String,
    role: String,
}

/// Mock backend state. Flags can be flipped mid-test.
pub struct Backend {
    accounts: Mutex<HashMap<String, Account>>,
    tokens: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
    last_query: Mutex<HashMap<String, String>>,
    uploads: Mutex<HashMap<String, (Option<String>, Vec<u8>)>>,
    base_url: Mutex<String>,
    next_token: AtomicU64,
    next_user_id: AtomicI64,
    pub refresh_ok: AtomicBool,
    pub refresh_requires_cookie: AtomicBool,
    pub refresh_delay_ms: AtomicU64,
    pub logout_fails: AtomicBool,
    pub rfps_always_unauthorized: AtomicBool,
}

impl Backend {
    pub fn new() -> Arc<Self> {
        let mut accounts = HashMap::new();
        accounts.insert(
            BUYER_EMAIL.to_owned(),
            Account {
                id: 1,
                password: BUYER_PASSWORD.to_owned(),
                role: "buyer".to_owned(),
            },
        );
        accounts.insert(
            SUPPLIER_EMAIL.to_owned(),
            Account {
                id: 2,
                password: BUYER_PASSWORD.to_owned(),
                role: "supplier".to_owned(),
            },
        );
        Arc::new(Self {
            accounts: Mutex::new(accounts),
            tokens: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            last_query: Mutex::new(HashMap::new()),
            uploads: Mutex::new(HashMap::new()),
            base_url: Mutex::new(String::new()),
            next_token: AtomicU64::new(0),
            next_user_id: AtomicI64::new(3),
            refresh_ok: AtomicBool::new(true),
            refresh_requires_cookie: AtomicBool::new(false),
            refresh_delay_ms: AtomicU64::new(0),
            logout_fails: AtomicBool::new(false),
            rfps_always_unauthorized: AtomicBool::new(false),
        })
    }

    /// Mint a token the backend accepts for `email`.
    pub fn issue_token(&self, email: &str) -> String {
        let n = self.next_token.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("tok-{n}");
        self.tokens.lock().insert(token.clone(), email.to_owned());
        token
    }

    /// Invalidate every access token, as if they had all expired.
    pub fn expire_all_tokens(&self) {
        self.tokens.lock().clear();
    }

    /// Number of calls to `path`.
    pub fn count(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|(p, _)| p == path).count()
    }

    /// `Authorization` headers sent to `path`, in call order.
    pub fn auth_headers(&self, path: &str) -> Vec<Option<String>> {
        self.calls
            .lock()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, h)| h.clone())
            .collect()
    }

    /// Content type and bytes received by the storage endpoint for `key`.
    pub fn uploaded(&self, key: &str) -> Option<(Option<String>, Vec<u8>)> {
        self.uploads.lock().get(key).cloned()
    }

    pub fn last_query(&self) -> HashMap<String, String> {
        self.last_query.lock().clone()
    }

    fn record(&self, path: &str, headers: &HeaderMap) {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        self.calls.lock().push((path.to_owned(), auth));
    }

    fn authorized_email(&self, headers: &HeaderMap) -> Option<String> {
        let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let token = header.strip_prefix("Bearer ")?;
        self.tokens.lock().get(token).cloned()
    }

    fn user_json(&self, email: &str) -> Option<Value> {
        self.accounts
            .lock()
            .get(email)
            .map(|a| json!({ "id": a.id, "email": email, "role": a.role }))
    }
}

type Shared = Arc<Backend>;

fn detail(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn unauthorized() -> Response {
    detail(StatusCode::UNAUTHORIZED, "Could not validate credentials")
}

fn rfp_json(id: i64, status: &str) -> Value {
    json!({
        "id": id,
        "title": "Test RFP",
        "description": "Test description",
        "status": status,
        "created_at": "2023-01-01T00:00:00Z",
        "owner_id": 1
    })
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    email: String,
    password: String,
    role: String,
}

async fn login(
    State(b): State<Shared>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<LoginBody>,
) -> Response {
    b.record("/auth/login", &headers);
    let valid = b
        .accounts
        .lock()
        .get(&body.email)
        .is_some_and(|a| a.password == body.password);
    if !valid {
        return detail(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }
    let token = b.issue_token(&body.email);
    let cookie = Cookie::build((REFRESH_COOKIE, format!("rt:{}", body.email)))
        .path("/")
        .http_only(true)
        .build();
    (
        jar.add(cookie),
        Json(json!({ "access_token": token, "token_type": "bearer" })),
    )
        .into_response()
}

async fn register(
    State(b): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<RegisterBody>,
) -> Response {
    b.record("/auth/register", &headers);
    if body.role != "buyer" && body.role != "supplier" {
        return detail(StatusCode::BAD_REQUEST, "Invalid role");
    }
    let mut accounts = b.accounts.lock();
    if accounts.contains_key(&body.email) {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    let id = b.next_user_id.fetch_add(1, Ordering::SeqCst);
    accounts.insert(
        body.email.clone(),
        Account {
            id,
            password: body.password,
            role: body.role.clone(),
        },
    );
    (
        StatusCode::CREATED,
        Json(json!({ "id": id, "email": body.email, "role": body.role })),
    )
        .into_response()
}

async fn refresh(State(b): State<Shared>, jar: CookieJar, headers: HeaderMap) -> Response {
    b.record("/auth/refresh", &headers);
    let delay = b.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if !b.refresh_ok.load(Ordering::SeqCst) {
        return detail(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }
    let email = match jar.get(REFRESH_COOKIE) {
        Some(cookie) => cookie.value().trim_start_matches("rt:").to_owned(),
        None if b.refresh_requires_cookie.load(Ordering::SeqCst) => {
            return detail(StatusCode::UNAUTHORIZED, "Refresh token required");
        }
        None => BUYER_EMAIL.to_owned(),
    };
    let token = b.issue_token(&email);
    Json(json!({ "access_token": token, "token_type": "bearer" })).into_response()
}

async fn logout(State(b): State<Shared>, jar: CookieJar, headers: HeaderMap) -> Response {
    b.record("/auth/logout", &headers);
    if b.logout_fails.load(Ordering::SeqCst) {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "Logout unavailable");
    }
    (jar.remove(Cookie::from(REFRESH_COOKIE)), StatusCode::NO_CONTENT).into_response()
}

async fn me(State(b): State<Shared>, headers: HeaderMap) -> Response {
    b.record("/auth/me", &headers);
    match b.authorized_email(&headers).and_then(|e| b.user_json(&e)) {
        Some(user) => Json(user).into_response(),
        None => unauthorized(),
    }
}

async fn list_rfps(
    State(b): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    b.record("/rfps", &headers);
    *b.last_query.lock() = query;
    if b.rfps_always_unauthorized.load(Ordering::SeqCst) || b.authorized_email(&headers).is_none()
    {
        return unauthorized();
    }
    Json(json!({
        "items": [rfp_json(1, "DRAFT")],
        "total": 1,
        "page": 1,
        "total_pages": 1
    }))
    .into_response()
}

async fn get_rfp(State(b): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    b.record("/rfps/{id}", &headers);
    if b.authorized_email(&headers).is_none() {
        return unauthorized();
    }
    if id == 404 {
        return detail(StatusCode::NOT_FOUND, "RFP not found");
    }
    Json(rfp_json(id, "DRAFT")).into_response()
}

async fn change_status(
    State(b): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    b.record("/rfps/{id}/status", &headers);
    if b.authorized_email(&headers).is_none() {
        return unauthorized();
    }
    let status = query.get("new_status").cloned().unwrap_or_default();
    *b.last_query.lock() = query;
    if status == "APPROVED" {
        return detail(StatusCode::BAD_REQUEST, "Invalid status transition");
    }
    Json(rfp_json(id, &status)).into_response()
}

async fn search(
    State(b): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    b.record("/rfps/search", &headers);
    *b.last_query.lock() = query;
    Json(json!({
        "items": [{
            "id": 9, "title": "Fleet maintenance", "description": null,
            "status": "PUBLISHED", "owner_id": 1
        }]
    }))
    .into_response()
}

async fn supplier_responses(State(b): State<Shared>, headers: HeaderMap) -> Response {
    b.record("/rfps/supplier/responses", &headers);
    if b.authorized_email(&headers).is_none() {
        return unauthorized();
    }
    Json(json!({
        "responses": [{
            "id": 5, "rfp_id": 1, "rfp_title": "Test RFP", "rfp_status": "RESPONSE_SUBMITTED",
            "owner_email": BUYER_EMAIL, "content": "Our offer",
            "submitted_at": "2025-09-18T10:30:00", "rfp_created_at": "2025-09-01T08:00:00"
        }]
    }))
    .into_response()
}

async fn document_versions(
    State(b): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    b.record("/documents/{id}/versions", &headers);
    if b.authorized_email(&headers).is_none() {
        return unauthorized();
    }
    Json(json!({
        "items": [
            { "id": id * 10 + 2, "version_number": 2, "s3_key": "v2.pdf", "notes": "fixed typo" },
            { "id": id * 10 + 1, "version_number": 1, "s3_key": "v1.pdf", "notes": null }
        ]
    }))
    .into_response()
}

#[derive(Deserialize)]
struct PresignBody {
    filename: String,
}

#[derive(Deserialize)]
struct CompleteBody {
    filename: String,
}

async fn presign(
    State(b): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<PresignBody>,
) -> Response {
    b.record("/uploads/presign", &headers);
    if b.authorized_email(&headers).is_none() {
        return unauthorized();
    }
    let base = b.base_url.lock().clone();
    Json(json!({
        "presigned_url": format!("{base}/storage/{}", body.filename),
        "filename": body.filename
    }))
    .into_response()
}

/// Stands in for the object store behind a presigned URL.
async fn storage_put(
    State(b): State<Shared>,
    headers: HeaderMap,
    Path(key): Path<String>,
    body: Bytes,
) -> Response {
    b.record("/storage/{key}", &headers);
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    b.uploads.lock().insert(key, (content_type, body.to_vec()));
    StatusCode::OK.into_response()
}

async fn complete(
    State(b): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<CompleteBody>,
) -> Response {
    b.record("/uploads/complete", &headers);
    if b.authorized_email(&headers).is_none() {
        return unauthorized();
    }
    if !b.uploads.lock().contains_key(&body.filename) {
        return detail(StatusCode::BAD_REQUEST, "File not uploaded");
    }
    Json(json!({ "document_id": 11, "version_id": 21, "version_number": 1 })).into_response()
}

/// Document 1 lives in S3 and previews as a link; others are served inline.
async fn preview(
    State(b): State<Shared>,
    headers: HeaderMap,
    Path((id, version)): Path<(i64, u32)>,
) -> Response {
    b.record("/documents/{id}/versions/{n}/preview", &headers);
    if b.authorized_email(&headers).is_none() {
        return unauthorized();
    }
    if id == 1 {
        return Json(json!({
            "url": format!("https://s3.example.com/doc-{id}-v{version}.pdf"),
            "key": format!("doc-{id}-v{version}.pdf")
        }))
        .into_response();
    }
    ([(CONTENT_TYPE, "application/pdf")], b"%PDF-1.4".to_vec()).into_response()
}

async fn boom(State(b): State<Shared>, headers: HeaderMap) -> Response {
    b.record("/boom", &headers);
    detail(StatusCode::INTERNAL_SERVER_ERROR, "Something broke")
}

/// Serve `backend` on an ephemeral local port; returns its base URL.
pub async fn spawn(backend: Shared) -> url::Url {
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/rfps", get(list_rfps))
        .route("/rfps/search", get(search))
        .route("/rfps/supplier/responses", get(supplier_responses))
        .route("/rfps/{id}", get(get_rfp))
        .route("/rfps/{id}/status", patch(change_status))
        .route("/documents/{id}/versions", get(document_versions))
        .route("/documents/{id}/versions/{n}/preview", get(preview))
        .route("/uploads/presign", post(presign))
        .route("/uploads/complete", post(complete))
        .route("/storage/{key}", put(storage_put))
        .route("/boom", get(boom))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    *backend.base_url.lock() = format!("http://{addr}");
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}").parse().unwrap()
}

/// Navigator that remembers where it was sent.
pub struct RecordingNavigator {
    current: Mutex<String>,
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn at(path: &str) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(path.to_owned()),
            visits: Mutex::new(Vec::new()),
        })
    }

    /// Move to `path` without recording a visit.
    pub fn set_current(&self, path: &str) {
        *self.current.lock() = path.to_owned();
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_path(&self) -> String {
        self.current.lock().clone()
    }

    fn navigate(&self, path: &str) {
        self.visits.lock().push(path.to_owned());
        *self.current.lock() = path.to_owned();
    }
}

pub struct TestEnv {
    pub backend: Shared,
    pub storage: Arc<MemoryStorage>,
    pub navigator: Arc<RecordingNavigator>,
    pub gateway: Gateway,
}

impl TestEnv {
    pub async fn start() -> Self {
        Self::with_storage(MemoryStorage::new()).await
    }

    pub async fn with_storage(storage: MemoryStorage) -> Self {
        init_tracing();
        let backend = Backend::new();
        let base_url = spawn(backend.clone()).await;
        let storage = Arc::new(storage);
        let navigator = RecordingNavigator::at("/");
        let gateway = Gateway::with_storage(ClientConfig::new(base_url), storage.clone())
            .unwrap()
            .with_navigator(navigator.clone());
        Self {
            backend,
            storage,
            navigator,
            gateway,
        }
    }

    pub fn auth(&self) -> AuthContext {
        AuthContext::new(self.gateway.clone())
    }

    /// Put a token the backend currently accepts into the session.
    pub fn sign_in_directly(&self) -> String {
        let token = self.backend.issue_token(BUYER_EMAIL);
        self.gateway.session().set_token(token.clone());
        token
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
