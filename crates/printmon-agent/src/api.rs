//! HTTP API for the settings UI and the print host.
//!
//! | Method | Path                      | Body                                  |
//! |--------|---------------------------|---------------------------------------|
//! | POST   | `/api/plugin/ai_printmon` | `{"command": "...", ...params}`       |
//! | POST   | `/api/print-events`       | `{"event": "PrintStarted"}`           |
//! | GET    | `/api/status`             |                                       |

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use printmon_core::{MonitorStatus, PrintEvent};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::commands::CommandHandler;

pub type AppState = Arc<CommandHandler>;

pub fn router(handler: AppState) -> Router {
    Router::new()
        .route("/api/plugin/ai_printmon", post(command))
        .route("/api/print-events", post(print_event))
        .route("/api/status", get(status))
        .with_state(handler)
}

async fn command(
    State(handler): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let Some(name) = body.get("command").and_then(Value::as_str) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "missing command" })),
        );
    };
    (StatusCode::OK, Json(handler.handle(name, &body).await))
}

#[derive(Deserialize)]
struct PrintEventRequest {
    event: String,
}

async fn print_event(
    State(handler): State<AppState>,
    Json(request): Json<PrintEventRequest>,
) -> Result<Json<MonitorStatus>, (StatusCode, Json<Value>)> {
    let event: PrintEvent = request.event.parse().map_err(|e| {
        debug!(event = %request.event, "Ignoring unknown print event");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": format!("{e}") })),
        )
    })?;
    handler.on_print_event(event).await;
    Ok(Json(handler.status().await))
}

async fn status(State(handler): State<AppState>) -> Json<MonitorStatus> {
    Json(handler.status().await)
}
