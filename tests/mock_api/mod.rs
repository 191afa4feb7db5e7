//! In-process stand-in for the energy REST API
//!
//! Serves the endpoints the client uses on an ephemeral port. Tests flip the
//! switches on [`MockState`] to simulate expiry, refresh failures and
//! rejected writes.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use energy_dash::{Config, Dashboard, MemoryStorage};

pub const EMAIL: &str = "a@x.com";
pub const PASSWORD: &str = "pw";
pub const USER_ID: &str = "user-1";

#[derive(Default)]
struct Inner {
    access: Option<String>,
    refresh: Option<String>,
    generation: u64,
    next_id: u64,
    favourites: Vec<Value>,
    alerts: Vec<Value>,
    energy: Vec<Value>,
}

pub struct MockState {
    inner: Mutex<Inner>,
    pub token_ttl_secs: AtomicI64,
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub unauthorized: AtomicUsize,
    pub energy_calls: AtomicUsize,
    pub favourite_lists: AtomicUsize,
    pub forecast_calls: AtomicUsize,
    pub fail_refresh: AtomicBool,
    pub reject_all_tokens: AtomicBool,
    pub fail_creates: AtomicBool,
    pub fail_deletes: AtomicBool,
    pub hold_creates: AtomicBool,
    pub release: Notify,
}

impl MockState {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            token_ttl_secs: AtomicI64::new(900),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            unauthorized: AtomicUsize::new(0),
            energy_calls: AtomicUsize::new(0),
            favourite_lists: AtomicUsize::new(0),
            forecast_calls: AtomicUsize::new(0),
            fail_refresh: AtomicBool::new(false),
            reject_all_tokens: AtomicBool::new(false),
            fail_creates: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            hold_creates: AtomicBool::new(false),
            release: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Invalidate the current access token; the refresh token stays valid
    pub fn revoke_access(&self) {
        self.lock().access = Some("revoked".to_string());
    }

    pub fn current_access(&self) -> Option<String> {
        self.lock().access.clone()
    }

    pub fn seed_energy(&self, rows: Vec<Value>) {
        self.lock().energy = rows;
    }

    pub fn favourites(&self) -> Vec<Value> {
        self.lock().favourites.clone()
    }

    pub fn alerts(&self) -> Vec<Value> {
        self.lock().alerts.clone()
    }

    fn issue(&self) -> Value {
        let ttl = self.token_ttl_secs.load(Ordering::SeqCst);
        let mut inner = self.lock();
        inner.generation += 1;
        let access = jwt(&json!({
            "sub": USER_ID,
            "exp": chrono::Utc::now().timestamp() + ttl,
            "gen": inner.generation,
        }));
        let refresh = format!("refresh-{}", inner.generation);
        inner.access = Some(access.clone());
        inner.refresh = Some(refresh.clone());
        json!({ "access_token": access, "refresh_token": refresh })
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut inner = self.lock();
        inner.next_id += 1;
        format!("{prefix}-{}", inner.next_id)
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let valid = !self.reject_all_tokens.load(Ordering::SeqCst)
            && bearer.is_some()
            && bearer == self.lock().access.as_deref();
        if valid {
            Ok(())
        } else {
            self.unauthorized.fetch_add(1, Ordering::SeqCst);
            Err(error(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
        }
    }
}

/// Unsigned compact JWT carrying `claims`
pub fn jwt(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2ln")
}

/// An energy row as the API encodes it, decimals as strings
pub fn energy_row(id: &str, timestamp: &str, consumption: f64) -> Value {
    json!({
        "id": id,
        "timestamp": timestamp,
        "consumption_kwh": format!("{consumption:.3}"),
        "production_kwh": "4100.000",
        "nuclear_kwh": "0.000",
        "wind_kwh": "1200.500",
        "hydroelectric_kwh": "300.000",
        "oil_and_gas_kwh": "0.000",
        "coal_kwh": "0.000",
        "solar_kwh": "2500.000",
        "biomass_kwh": "100.000",
        "user_id": USER_ID
    })
}

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

pub struct MockApi {
    pub state: Arc<MockState>,
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for MockApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MockApi {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::new());
        let router = Router::new()
            .route("/users/login", post(login))
            .route("/users/register", post(register))
            .route("/users/refresh", post(refresh))
            .route("/users/:id", get(get_user))
            .route("/energy/", get(list_energy))
            .route("/favourites/", get(list_favourites).post(create_favourite))
            .route("/favourites/:id", delete(delete_favourite))
            .route("/alerts/", get(list_alerts).post(create_alert))
            .route("/alerts/:id", delete(delete_alert))
            .route("/forecast/:metric", get(forecast))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            state,
            base_url: format!("http://{addr}"),
            handle,
        }
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.api.base_url = self.base_url.clone();
        config.api.request_timeout_secs = 5;
        config
    }

    /// Dashboard with in-memory session storage
    pub fn dashboard(&self) -> Dashboard {
        Dashboard::new(self.config(), Arc::new(MemoryStorage::new())).unwrap()
    }

    /// Dashboard that is already logged in
    pub async fn logged_in(&self) -> Dashboard {
        let dash = self.dashboard();
        dash.auth.login(EMAIL, PASSWORD).await.unwrap();
        dash
    }
}

type Shared = State<Arc<MockState>>;

async fn login(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        Json(state.issue()).into_response()
    } else {
        error(StatusCode::UNAUTHORIZED, "Incorrect email or password")
    }
}

async fn register(Json(body): Json<Value>) -> Response {
    if body["email"] == EMAIL {
        return error(StatusCode::BAD_REQUEST, "Email already registered");
    }
    Json(json!({
        "id": "user-2",
        "email": body["email"],
        "full_name": body["full_name"],
        "created_at": "2024-05-01T10:00:00"
    }))
    .into_response()
}

async fn refresh(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let current = state.lock().refresh.clone();
    if state.fail_refresh.load(Ordering::SeqCst) || body["refresh_token"].as_str() != current.as_deref() {
        return error(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }
    Json(state.issue()).into_response()
}

async fn get_user(State(state): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(rejected) = state.authorize(&headers) {
        return rejected;
    }
    if id != USER_ID {
        return error(StatusCode::NOT_FOUND, "User not found");
    }
    Json(json!({
        "id": USER_ID,
        "email": EMAIL,
        "full_name": "Ada Lovelace",
        "created_at": "2024-01-01T00:00:00"
    }))
    .into_response()
}

async fn list_energy(State(state): Shared, headers: HeaderMap) -> Response {
    if let Err(rejected) = state.authorize(&headers) {
        return rejected;
    }
    state.energy_calls.fetch_add(1, Ordering::SeqCst);
    Json(state.lock().energy.clone()).into_response()
}

async fn list_favourites(State(state): Shared, headers: HeaderMap) -> Response {
    if let Err(rejected) = state.authorize(&headers) {
        return rejected;
    }
    state.favourite_lists.fetch_add(1, Ordering::SeqCst);
    Json(state.lock().favourites.clone()).into_response()
}

async fn create_favourite(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejected) = state.authorize(&headers) {
        return rejected;
    }
    if state.hold_creates.load(Ordering::SeqCst) {
        state.release.notified().await;
    }
    if state.fail_creates.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }
    let saved = json!({
        "id": state.next_id("fav"),
        "name": body["name"],
        "config_json": body["config_json"],
        "created_at": "2024-05-02T12:00:00"
    });
    state.lock().favourites.push(saved.clone());
    (StatusCode::CREATED, Json(saved)).into_response()
}

async fn delete_favourite(State(state): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(rejected) = state.authorize(&headers) {
        return rejected;
    }
    if state.fail_deletes.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }
    let mut inner = state.lock();
    let before = inner.favourites.len();
    inner.favourites.retain(|f| f["id"] != id.as_str());
    if inner.favourites.len() == before {
        return error(StatusCode::NOT_FOUND, "Favourite not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_alerts(State(state): Shared, headers: HeaderMap) -> Response {
    if let Err(rejected) = state.authorize(&headers) {
        return rejected;
    }
    Json(state.lock().alerts.clone()).into_response()
}

async fn create_alert(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejected) = state.authorize(&headers) {
        return rejected;
    }
    if state.fail_creates.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }
    // Decimal columns come back as strings
    let threshold = body["threshold"].as_f64().unwrap_or_default();
    let saved = json!({
        "id": state.next_id("alert"),
        "metric": body["metric"],
        "threshold": format!("{threshold:.3}"),
        "direction": body["direction"],
        "created_at": "2024-05-02T12:00:00"
    });
    state.lock().alerts.push(saved.clone());
    (StatusCode::CREATED, Json(saved)).into_response()
}

async fn delete_alert(State(state): Shared, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(rejected) = state.authorize(&headers) {
        return rejected;
    }
    if state.fail_deletes.load(Ordering::SeqCst) {
        return error(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
    }
    state.lock().alerts.retain(|a| a["id"] != id.as_str());
    StatusCode::NO_CONTENT.into_response()
}

async fn forecast(
    State(state): Shared,
    headers: HeaderMap,
    Path(metric): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(rejected) = state.authorize(&headers) {
        return rejected;
    }
    state.forecast_calls.fetch_add(1, Ordering::SeqCst);
    if metric != "Demand" {
        return error(StatusCode::NOT_FOUND, "Unknown metric");
    }
    let horizon: u32 = params.get("horizon").and_then(|h| h.parse().ok()).unwrap_or(24);
    let points: Vec<Value> = (0..horizon)
        .map(|h| {
            let value = if h == 0 { -50.0 } else { 4000.0 + f64::from(h) };
            json!([format!("2024-05-03T{:02}:00:00", h % 24), value])
        })
        .collect();
    Json(points).into_response()
}
