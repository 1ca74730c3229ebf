//! Throwaway HTTP peer standing in for the camera, the model endpoint and
//! OctoPrint at once. Every request it receives is recorded.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use printmon_agent::{CommandHandler, HostConfig, SettingsStore};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const HOST_API_KEY: &str = "host-key";

#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub body: Value,
    pub authorization: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Clone, Default)]
pub struct FakePeer {
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl FakePeer {
    fn record(&self, path: &str, headers: &HeaderMap, body: Value) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.seen.lock().unwrap().push(Seen {
            path: path.to_string(),
            body,
            authorization: header("authorization"),
            api_key: header("x-api-key"),
        });
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.seen().into_iter().map(|s| s.path).collect()
    }
}

fn completion(content: &str) -> Value {
    json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
}

async fn chat_ok(
    State(peer): State<FakePeer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    peer.record("/ok/chat", &headers, body);
    Json(completion("{\"status\": \"ok\"}"))
}

async fn chat_fail(
    State(peer): State<FakePeer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    peer.record("/fail/chat", &headers, body);
    Json(completion(
        "Verdict: {\"status\": \"fail\", \"reason\": \"spaghetti\"}",
    ))
}

async fn chat_text(State(peer): State<FakePeer>, headers: HeaderMap, Json(body): Json<Value>) -> String {
    peer.record("/text/chat", &headers, body);
    "hello from a proxy".to_string()
}

async fn chat_broken(
    State(peer): State<FakePeer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    peer.record("/broken/chat", &headers, body);
    (StatusCode::INTERNAL_SERVER_ERROR, "model crashed".to_string())
}

async fn snapshot() -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xD9]
}

async fn job(State(peer): State<FakePeer>, headers: HeaderMap, Json(body): Json<Value>) -> StatusCode {
    peer.record("/api/job", &headers, body);
    StatusCode::NO_CONTENT
}

async fn queue(
    State(peer): State<FakePeer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    peer.record("/plugin/continuousprint/set_active", &headers, body);
    Json(json!({ "active": false }))
}

/// Serve the fake peer on an ephemeral port; returns its base URL.
pub async fn spawn_peer() -> (String, FakePeer) {
    let peer = FakePeer::default();
    let app = Router::new()
        .route("/ok/chat", post(chat_ok))
        .route("/fail/chat", post(chat_fail))
        .route("/text/chat", post(chat_text))
        .route("/broken/chat", post(chat_broken))
        .route("/snapshot", get(snapshot))
        .route("/api/job", post(job))
        .route("/plugin/continuousprint/set_active", post(queue))
        .with_state(peer.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), peer)
}

/// Handler backed by a settings file in `dir`, with `overrides` set before
/// assembly and OctoPrint pointed at `base`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

pub fn handler(dir: &TempDir, base: &str, overrides: Value) -> CommandHandler {
    init_tracing();
    let mut store = SettingsStore::load(dir.path().join("printmon.toml")).unwrap();
    if let Some(map) = overrides.as_object() {
        for (key, value) in map {
            store.set(key, value.clone()).unwrap();
        }
    }
    CommandHandler::assemble(
        store,
        HostConfig {
            octoprint_url: base.to_string(),
            api_key: Some(HOST_API_KEY.to_string()),
        },
    )
    .unwrap()
}
