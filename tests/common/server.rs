//! Fake media server lifecycle management
//!
//! Each test gets an isolated axum server on a random port that serves the
//! fixture data set. Tests can script failure statuses per path and read
//! how often each path was hit.

use super::constants::*;
use super::fixtures::*;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::DateTime;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

type Params = Query<HashMap<String, String>>;

/// Mutable data set and request bookkeeping shared with the handlers.
#[derive(Default)]
pub struct FakeState {
    pub users: Mutex<Vec<Value>>,
    pub libraries: Mutex<Vec<Value>>,
    pub items: Mutex<HashMap<String, Vec<Value>>>,
    pub activity: Mutex<Vec<Value>>,
    hits: Mutex<HashMap<String, usize>>,
    scripted: Mutex<HashMap<String, VecDeque<u16>>>,
    activity_queries: Mutex<Vec<HashMap<String, String>>>,
    /// Raw item pages per library, served by page number without a total.
    item_pages: Mutex<HashMap<String, Vec<Vec<Value>>>>,
    /// Libraries that answer every page with a full page of new items.
    endless_libraries: Mutex<Vec<String>>,
}

impl FakeState {
    fn with_fixtures() -> Self {
        Self {
            users: Mutex::new(user_fixtures()),
            libraries: Mutex::new(library_fixtures()),
            items: Mutex::new(item_fixtures()),
            activity: Mutex::new(activity_fixtures()),
            ..Default::default()
        }
    }

    /// Counts the hit, then answers with a scripted status or a 401 for a
    /// wrong token. `None` lets the handler serve data.
    fn intercept(&self, path: &str, headers: &HeaderMap) -> Option<Response> {
        *self.hits.lock().unwrap().entry(path.to_string()).or_default() += 1;

        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|queue| queue.pop_front());
        if let Some(status) = scripted {
            let status = StatusCode::from_u16(status).unwrap();
            return Some((status, "scripted failure").into_response());
        }

        let token = headers.get("X-Emby-Token").and_then(|v| v.to_str().ok());
        if token != Some(TEST_TOKEN) {
            return Some((StatusCode::UNAUTHORIZED, "bad token").into_response());
        }
        None
    }
}

fn param(params: &HashMap<String, String>, key: &str) -> Option<usize> {
    params.get(key).and_then(|v| v.parse().ok())
}

async fn system_info(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    if let Some(response) = state.intercept("/System/Info", &headers) {
        return response;
    }
    Json(json!({
        "Id": "fake-server",
        "ServerName": "Fake Jellyfin",
        "Version": "10.9.0",
        "OperatingSystem": "Linux"
    }))
    .into_response()
}

async fn users(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    if let Some(response) = state.intercept("/Users", &headers) {
        return response;
    }
    Json(Value::Array(state.users.lock().unwrap().clone())).into_response()
}

async fn media_folders(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    if let Some(response) = state.intercept("/Library/MediaFolders", &headers) {
        return response;
    }
    let libraries = state.libraries.lock().unwrap().clone();
    Json(json!({
        "TotalRecordCount": libraries.len(),
        "Items": libraries
    }))
    .into_response()
}

async fn items(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Query(params): Params,
) -> Response {
    if let Some(response) = state.intercept("/Items", &headers) {
        return response;
    }
    let parent_id = params.get("ParentId").cloned().unwrap_or_default();
    let start = param(&params, "StartIndex").unwrap_or(0);
    let limit = param(&params, "Limit").unwrap_or(100).max(1);

    if state.endless_libraries.lock().unwrap().contains(&parent_id) {
        let page: Vec<Value> = (start..start + limit)
            .map(|n| {
                json!({
                    "Id": format!("{}-{}", parent_id, n),
                    "Name": format!("Item {}", n),
                    "Type": "Movie"
                })
            })
            .collect();
        return Json(json!({ "Items": page, "StartIndex": start })).into_response();
    }
    if let Some(pages) = state.item_pages.lock().unwrap().get(&parent_id) {
        let page = pages.get(start / limit).cloned().unwrap_or_default();
        return Json(json!({ "Items": page, "StartIndex": start })).into_response();
    }

    let all = state
        .items
        .lock()
        .unwrap()
        .get(&parent_id)
        .cloned()
        .unwrap_or_default();
    let page: Vec<Value> = all.iter().skip(start).take(limit).cloned().collect();
    Json(json!({
        "Items": page,
        "TotalRecordCount": all.len(),
        "StartIndex": start
    }))
    .into_response()
}

async fn activity_log(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Query(params): Params,
) -> Response {
    state.activity_queries.lock().unwrap().push(params.clone());
    if let Some(response) = state.intercept("/System/ActivityLog/Entries", &headers) {
        return response;
    }
    let start = param(&params, "startIndex").unwrap_or(0);
    let limit = param(&params, "limit").unwrap_or(100);
    let min_date = params
        .get("minDate")
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok());

    let matching: Vec<Value> = state
        .activity
        .lock()
        .unwrap()
        .iter()
        .filter(|entry| {
            let Some(floor) = min_date else {
                return true;
            };
            entry["Date"]
                .as_str()
                .and_then(|date| DateTime::parse_from_rfc3339(date).ok())
                .is_some_and(|date| date >= floor)
        })
        .cloned()
        .collect();
    let page: Vec<Value> = matching.iter().skip(start).take(limit).cloned().collect();
    Json(json!({
        "Items": page,
        "TotalRecordCount": matching.len(),
        "StartIndex": start
    }))
    .into_response()
}

/// Fake media server instance.
///
/// When dropped, the server shuts down.
pub struct FakeMediaServer {
    /// Base URL, e.g. "http://127.0.0.1:12345"
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Data set and bookkeeping, for direct manipulation in tests
    pub state: Arc<FakeState>,

    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeMediaServer {
    /// Spawns a fake server with the fixture data set on a random port and
    /// waits until it answers.
    pub async fn spawn() -> Self {
        let state = Arc::new(FakeState::with_fixtures());

        let app = Router::new()
            .route("/System/Info", get(system_info))
            .route("/Users", get(users))
            .route("/Library/MediaFolders", get(media_folders))
            .route("/Items", get(items))
            .route("/System/ActivityLog/Entries", get(activity_log))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            state,
            _shutdown_tx: Some(shutdown_tx),
        };
        server.wait_for_ready().await;
        server.reset_hits();
        server
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Fake server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            let request = client
                .get(format!("{}/System/Info", self.base_url))
                .header("X-Emby-Token", TEST_TOKEN);
            match request.send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }

    /// Makes the next requests to `path` fail with `statuses`, in order.
    pub fn script_statuses(&self, path: &str, statuses: &[u16]) {
        self.state
            .scripted
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .extend(statuses.iter().copied());
    }

    pub fn hits(&self, path: &str) -> usize {
        self.state
            .hits
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.state.hits.lock().unwrap().values().sum()
    }

    pub fn reset_hits(&self) {
        self.state.hits.lock().unwrap().clear();
        self.state.activity_queries.lock().unwrap().clear();
    }

    /// Query parameters of every activity log request so far.
    pub fn activity_queries(&self) -> Vec<HashMap<String, String>> {
        self.state.activity_queries.lock().unwrap().clone()
    }

    pub fn remove_user(&self, user_id: &str) {
        self.state
            .users
            .lock()
            .unwrap()
            .retain(|user| user["Id"] != user_id);
    }

    /// Serves `pages` for `library_id` in order, one per request, and never
    /// reports a total record count.
    pub fn script_item_pages(&self, library_id: &str, pages: Vec<Vec<Value>>) {
        self.state
            .item_pages
            .lock()
            .unwrap()
            .insert(library_id.to_string(), pages);
    }

    /// Makes `library_id` return a full page of new items for every request.
    pub fn set_endless_library(&self, library_id: &str) {
        self.state
            .endless_libraries
            .lock()
            .unwrap()
            .push(library_id.to_string());
    }

    pub fn push_activity(&self, entry: Value) {
        self.state.activity.lock().unwrap().insert(0, entry);
    }
}

impl Drop for FakeMediaServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
