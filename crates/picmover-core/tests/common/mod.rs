// SPDX-License-Identifier: AGPL-3.0
// Scriptable in-process PicMover server for integration tests

#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Local};
use picmover_core::{AppError, ClientSettings, MediaAsset, PeerMeta, SharedAsset};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the fake server answers and what it has seen
pub struct PeerState {
    pub name: String,
    /// Status and body returned by POST /connect
    pub connect_reply: Mutex<(StatusCode, String)>,
    /// Bodies for successive GET /status?ConnectId= polls
    pub approvals: Mutex<VecDeque<Value>>,
    /// Answer once `approvals` runs out: approve or keep waiting
    pub approve_when_exhausted: AtomicBool,
    /// Status and body returned by POST /upload. None hands out task ids.
    pub upload_reply: Mutex<Option<(StatusCode, String)>>,
    /// Bodies for successive GET /status?TaskId= polls, per task id.
    /// Exhausted tasks report Finished with no failures.
    pub task_statuses: Mutex<HashMap<i64, VecDeque<Value>>>,

    pub connect_bodies: Mutex<Vec<Value>>,
    pub upload_bodies: Mutex<Vec<Value>>,
    pub approval_polls: AtomicUsize,
    pub task_polls: Mutex<HashMap<i64, usize>>,
    next_task: AtomicI64,
}

impl PeerState {
    fn new() -> Self {
        Self {
            name: "test-server".to_string(),
            connect_reply: Mutex::new((StatusCode::OK, json!({"ConnectId": 42}).to_string())),
            approvals: Mutex::new(VecDeque::new()),
            approve_when_exhausted: AtomicBool::new(true),
            upload_reply: Mutex::new(None),
            task_statuses: Mutex::new(HashMap::new()),
            connect_bodies: Mutex::new(Vec::new()),
            upload_bodies: Mutex::new(Vec::new()),
            approval_polls: AtomicUsize::new(0),
            task_polls: Mutex::new(HashMap::new()),
            next_task: AtomicI64::new(1),
        }
    }

    pub fn script_approvals(&self, answers: &[bool]) {
        *self.approvals.lock().unwrap() =
            answers.iter().map(|a| json!({ "Approved": a })).collect();
    }

    pub fn script_task(&self, task_id: i64, bodies: Vec<Value>) {
        self.task_statuses
            .lock()
            .unwrap()
            .insert(task_id, bodies.into());
    }

    pub fn set_connect_reply(&self, status: StatusCode, body: Value) {
        *self.connect_reply.lock().unwrap() = (status, body.to_string());
    }

    pub fn set_upload_reply(&self, status: StatusCode, body: &str) {
        *self.upload_reply.lock().unwrap() = Some((status, body.to_string()));
    }

    pub fn uploads(&self) -> Vec<Value> {
        self.upload_bodies.lock().unwrap().clone()
    }

    /// Number of records in each received /upload, in order
    pub fn upload_sizes(&self) -> Vec<usize> {
        self.uploads()
            .iter()
            .map(|body| body["Data"].as_array().map(Vec::len).unwrap_or(0))
            .collect()
    }

    pub fn polls_for_task(&self, task_id: i64) -> usize {
        self.task_polls
            .lock()
            .unwrap()
            .get(&task_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_task_polls(&self) -> usize {
        self.task_polls.lock().unwrap().values().sum()
    }
}

pub struct FakePeer {
    pub addr: SocketAddr,
    pub state: Arc<PeerState>,
}

impl FakePeer {
    pub async fn start() -> Self {
        let state = Arc::new(PeerState::new());
        let router = Router::new()
            .route("/ping", get(ping_handler))
            .route("/connect", post(connect_handler))
            .route("/status", get(status_handler))
            .route("/upload", post(upload_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn meta(&self) -> PeerMeta {
        PeerMeta::new(self.addr.ip().to_string(), self.state.name.clone())
    }

    pub fn settings(&self) -> ClientSettings {
        test_settings(self.addr.port())
    }
}

pub fn test_settings(port: u16) -> ClientSettings {
    ClientSettings {
        port,
        client_name: "test-client".to_string(),
        poll_interval_ms: 10,
        request_timeout_secs: 5,
        ping_timeout_ms: 500,
        ..Default::default()
    }
}

/// A port nothing listens on
pub async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn ping_handler(State(state): State<Arc<PeerState>>) -> impl IntoResponse {
    Json(json!({ "Name": state.name }))
}

async fn connect_handler(
    State(state): State<Arc<PeerState>>,
    Json(body): Json<Value>,
) -> Response {
    state.connect_bodies.lock().unwrap().push(body);
    let (status, body) = state.connect_reply.lock().unwrap().clone();
    (status, body).into_response()
}

async fn status_handler(
    State(state): State<Arc<PeerState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if params.contains_key("ConnectId") {
        state.approval_polls.fetch_add(1, Ordering::SeqCst);
        let scripted = state.approvals.lock().unwrap().pop_front();
        let body = scripted.unwrap_or_else(|| {
            json!({ "Approved": state.approve_when_exhausted.load(Ordering::SeqCst) })
        });
        return Json(body).into_response();
    }

    if let Some(task_id) = params.get("TaskId").and_then(|t| t.parse::<i64>().ok()) {
        *state.task_polls.lock().unwrap().entry(task_id).or_insert(0) += 1;
        let scripted = state
            .task_statuses
            .lock()
            .unwrap()
            .get_mut(&task_id)
            .and_then(VecDeque::pop_front);
        let body = scripted.unwrap_or_else(|| json!({ "Status": "Finished", "Result": [] }));
        return Json(body).into_response();
    }

    StatusCode::BAD_REQUEST.into_response()
}

async fn upload_handler(State(state): State<Arc<PeerState>>, Json(body): Json<Value>) -> Response {
    state.upload_bodies.lock().unwrap().push(body);
    if let Some((status, body)) = state.upload_reply.lock().unwrap().clone() {
        return (status, body).into_response();
    }
    let task_id = state.next_task.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "TaskId": task_id })).into_response()
}

/// In-memory media item
pub struct StubAsset {
    pub id: String,
    pub file_name: String,
    pub readable: bool,
}

impl StubAsset {
    pub fn shared(id: &str) -> SharedAsset {
        Arc::new(Self {
            id: id.to_string(),
            file_name: format!("{}.jpg", id),
            readable: true,
        })
    }

    pub fn broken(id: &str) -> SharedAsset {
        Arc::new(Self {
            id: id.to_string(),
            file_name: format!("{}.jpg", id),
            readable: false,
        })
    }
}

impl MediaAsset for StubAsset {
    fn id(&self) -> &str {
        &self.id
    }

    fn file_name(&self) -> &str {
        &self.file_name
    }

    fn media_type(&self) -> &str {
        "image"
    }

    fn creation_date(&self) -> Option<DateTime<Local>> {
        None
    }

    fn read_content(&self) -> Result<Vec<u8>, AppError> {
        if self.readable {
            Ok(self.id.as_bytes().to_vec())
        } else {
            Err(AppError::FileIo(format!("{} is gone", self.id)))
        }
    }
}

/// Library over a fixed list of stub assets
pub struct StubLibrary {
    pub assets: Vec<SharedAsset>,
}

impl StubLibrary {
    pub fn numbered(count: usize) -> Arc<Self> {
        Arc::new(Self {
            assets: (0..count).map(|i| StubAsset::shared(&item_id(i))).collect(),
        })
    }

    pub fn with(assets: Vec<SharedAsset>) -> Arc<Self> {
        Arc::new(Self { assets })
    }
}

impl picmover_core::AssetLibrary for StubLibrary {
    fn all_assets(&self) -> Result<Vec<SharedAsset>, AppError> {
        Ok(self.assets.clone())
    }
}

pub fn item_id(index: usize) -> String {
    format!("item-{:04}", index)
}
