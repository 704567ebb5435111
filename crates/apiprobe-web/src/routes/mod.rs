//! API routes for apiprobe-web

use crate::AppState;
use apiprobe_core::{RunRequest, RunnerError, TaskRecord};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Reply to a run or rerun submission.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAccepted {
    pub task_id: String,
    pub message: String,
}

/// Optional body of a rerun request.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerunRequest {
    #[serde(default)]
    pub base_url: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

/// Health check endpoint
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Submit a run
async fn start_run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<TaskAccepted>, ApiError> {
    if request.swagger_url.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "swaggerUrl is required"));
    }
    let task_id = state.runner.submit(request);
    Ok(Json(TaskAccepted {
        task_id,
        message: "Run started".to_string(),
    }))
}

/// Poll a task. Unknown ids answer with a `NOT_FOUND` record.
async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Json<TaskRecord> {
    Json(state.runner.status(&task_id))
}

/// Re-run a completed task, optionally against another base URL
async fn rerun_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    body: Bytes,
) -> Result<Json<TaskAccepted>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RerunRequest::default()
    } else {
        serde_json::from_slice::<RerunRequest>(&body)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid body: {e}")))?
    };

    match state.runner.rerun(&task_id, request.base_url) {
        Ok(new_id) => Ok(Json(TaskAccepted {
            task_id: new_id,
            message: format!("Rerun of {task_id} started"),
        })),
        Err(e) => {
            warn!(task_id = %task_id, error = %e, "Rerun rejected");
            let status = match e {
                RunnerError::NotFound(_) => StatusCode::NOT_FOUND,
                RunnerError::NotCompleted { .. } => StatusCode::CONFLICT,
            };
            Err(api_error(status, e.to_string()))
        }
    }
}

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/project/run", post(start_run))
        .route("/api/project/task/{task_id}", get(get_task))
        .route("/api/project/rerun/{task_id}", post(rerun_task))
        .with_state(state)
}
