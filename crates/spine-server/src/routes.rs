//! API route definitions (spec.md §6.1).

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Map, Value};

use spine_core::domain::{CreateJobInput, JobFilter, Status, Target};
use spine_core::error::SpineError;
use spine_core::storage::JobStore;
use spine_core::Role;

use crate::AppState;

/// Builds the full router: health, the static skill doc, and the job API.
pub fn create_router<S: JobStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health_check::<S>))
        .route("/skill", get(skill_doc))
        .route("/jobs", get(list_jobs::<S>).post(create_job::<S>))
        .route("/jobs/:id", get(get_job::<S>))
        .route("/jobs/:id/claim", post(claim_job::<S>))
        .route("/jobs/:id/heartbeat", post(heartbeat_job::<S>))
        .route("/jobs/:id/complete", post(complete_job::<S>))
        .route("/jobs/:id/fail", post(fail_job::<S>))
        .route("/jobs/:id/release", post(release_job::<S>))
        .route("/jobs/:id/comment", post(comment_job::<S>))
        .with_state(state)
}

async fn health_check<S: JobStore>() -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "time": spine_core::domain::now_millis(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// A short, static description of the HTTP surface, served for agents that
/// discover the API at runtime rather than from out-of-band docs.
async fn skill_doc() -> impl IntoResponse {
    const DOC: &str = include_str!("skill_doc.md");
    ([("content-type", "text/markdown; charset=utf-8")], DOC)
}

fn authenticate<S: JobStore>(state: &AppState<S>, headers: &HeaderMap) -> Result<Role, SpineError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(SpineError::Unauthorized)?;

    state
        .token_roles
        .resolve(token)
        .ok_or(SpineError::Unauthorized)
}

fn error_response(err: SpineError) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = Json(serde_json::json!({
        "error": err.error_code(),
        "message": err.to_string(),
    }));
    (status, body).into_response()
}

#[derive(Debug, Deserialize)]
struct CreateJobRequest {
    #[serde(default)]
    target: Target,
    // The HTTP body marks `spec` optional (spec.md §6.1's endpoint table);
    // the engine's `create` operation requires one, so an omitted body
    // field becomes an empty payload string rather than a validation error.
    #[serde(default)]
    spec: String,
    #[serde(default)]
    meta: Map<String, Value>,
    #[serde(rename = "maxAttempts")]
    max_attempts: Option<u32>,
}

async fn create_job<S: JobStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Json(req): Json<CreateJobRequest>,
) -> Response {
    let role = match authenticate(&state, &headers) {
        Ok(role) => role,
        Err(e) => return error_response(e),
    };
    if role != Role::Head {
        return error_response(SpineError::Forbidden);
    }

    match state.engine.create(CreateJobInput {
        target: req.target,
        spec: req.spec,
        meta: req.meta,
        max_attempts: req.max_attempts,
    }) {
        Ok(job) => (StatusCode::CREATED, Json(job)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize, Default)]
struct ListQuery {
    status: Option<Status>,
    target: Option<Target>,
}

async fn list_jobs<S: JobStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let role = match authenticate(&state, &headers) {
        Ok(role) => role,
        Err(e) => return error_response(e),
    };

    let filter = JobFilter {
        status: query.status,
        target: query.target,
    };
    match state.engine.list(role, &filter) {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_job<S: JobStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let role = match authenticate(&state, &headers) {
        Ok(role) => role,
        Err(e) => return error_response(e),
    };
    match state.engine.get(role, &id) {
        Ok(job) => Json(job).into_response(),
        Err(e) => error_response(e),
    }
}

async fn claim_job<S: JobStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    let role = match authenticate(&state, &headers) {
        Ok(role) => role,
        Err(e) => return error_response(e),
    };
    if !role.is_claw() {
        return error_response(SpineError::Forbidden);
    }
    match state.engine.claim(role, &id) {
        Ok(job) => Json(job).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize, Default)]
struct HeartbeatRequest {
    progress: Option<Value>,
}

async fn heartbeat_job<S: JobStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<HeartbeatRequest>,
) -> Response {
    let role = match authenticate(&state, &headers) {
        Ok(role) => role,
        Err(e) => return error_response(e),
    };
    match state.engine.heartbeat(role, &id, req.progress) {
        Ok(job) => Json(job).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize, Default)]
struct CompleteRequest {
    result: Option<Value>,
}

async fn complete_job<S: JobStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CompleteRequest>,
) -> Response {
    let role = match authenticate(&state, &headers) {
        Ok(role) => role,
        Err(e) => return error_response(e),
    };
    match state.engine.complete(role, &id, req.result) {
        Ok(job) => Json(job).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize, Default)]
struct FailRequest {
    error: Option<String>,
    requeue: Option<bool>,
}

async fn fail_job<S: JobStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<FailRequest>,
) -> Response {
    let role = match authenticate(&state, &headers) {
        Ok(role) => role,
        Err(e) => return error_response(e),
    };
    match state.engine.fail(role, &id, req.error, req.requeue) {
        Ok(job) => Json(job).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize, Default)]
struct ReleaseRequest {
    reason: Option<String>,
}

async fn release_job<S: JobStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<ReleaseRequest>,
) -> Response {
    let role = match authenticate(&state, &headers) {
        Ok(role) => role,
        Err(e) => return error_response(e),
    };
    match state.engine.release(role, &id, req.reason) {
        Ok(job) => Json(job).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct CommentRequest {
    text: String,
}

async fn comment_job<S: JobStore>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Response {
    let role = match authenticate(&state, &headers) {
        Ok(role) => role,
        Err(e) => return error_response(e),
    };
    match state.engine.comment(role, &id, req.text) {
        Ok(job) => Json(job).into_response(),
        Err(e) => error_response(e),
    }
}
