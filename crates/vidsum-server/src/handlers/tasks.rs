//! Task creation, inspection, and retry endpoints.

use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use vidsum_core::util::canonical_video_url;
use vidsum_core::{DbType, StatusUpdate, Task, TaskStatus};

use super::default_db_type;
use crate::error::ApiError;
use crate::schedule::{schedule_worker, Scheduled};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskCreateRequest {
    pub url: String,
    #[serde(default = "default_db_type")]
    pub db_type: DbType,
}

#[derive(Debug, Serialize)]
pub struct TaskCreateResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub db_type: DbType,
    pub message: String,
    pub processing_started: bool,
    pub processing_worker_id: Option<String>,
}

/// POST /tasks - validate the URL, queue a Pending task, then try to kick
/// off a worker in the same call. Scheduling trouble never fails the
/// request; it only changes the message.
pub async fn create_task(
    Extension(state): Extension<AppState>,
    Json(payload): Json<TaskCreateRequest>,
) -> Result<(StatusCode, Json<TaskCreateResponse>), ApiError> {
    let Some(url) = canonical_video_url(&payload.url) else {
        return Err(ApiError::InvalidInput("invalid video URL".to_string()));
    };

    let store = state.store(payload.db_type)?;
    let task = store.add_task(&url).await?;

    let scheduled = match schedule_worker(&state, payload.db_type, None).await {
        Ok(scheduled) => scheduled,
        Err(err) => {
            error!(%err, "failed to schedule processing worker after task creation");
            Scheduled::rejected("Task queued, but failed to schedule processing worker.")
        }
    };

    let mut message = String::from("Task queued successfully.");
    match (&scheduled.worker_id, scheduled.accepted) {
        (Some(worker_id), true) => {
            message.push_str(&format!(" Processing worker scheduled (worker: {worker_id})."));
        }
        _ => {
            message.push(' ');
            message.push_str(&scheduled.message);
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(TaskCreateResponse {
            task_id: task.id,
            status: task.status,
            db_type: payload.db_type,
            message,
            processing_started: scheduled.accepted,
            processing_worker_id: scheduled.worker_id,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    #[serde(default = "default_db_type")]
    pub db_type: DbType,
}

/// GET /tasks - every row, for the UI.
pub async fn list_tasks(
    Extension(state): Extension<AppState>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let store = state.store(query.db_type)?;
    Ok(Json(store.all_tasks().await?))
}

/// GET /tasks/{id}
pub async fn get_task(
    Extension(state): Extension<AppState>,
    Path(task_id): Path<String>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Task>, ApiError> {
    let store = state.store(query.db_type)?;
    store
        .task(&task_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("task not found".to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskRetryRequest {
    #[serde(default = "default_db_type")]
    pub db_type: DbType,
    #[serde(default)]
    pub retry_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskRetryResponse {
    pub task_id: String,
    pub source_task_id: String,
    pub status: TaskStatus,
    pub db_type: DbType,
    pub message: String,
}

/// POST /tasks/{id}/retry - clone a Failed task into a fresh Pending one.
///
/// Clone first, then mark the source, so a partial failure can never leave
/// a FailedRetryCreated source without its child.
pub async fn retry_task(
    Extension(state): Extension<AppState>,
    Path(task_id): Path<String>,
    Json(payload): Json<TaskRetryRequest>,
) -> Result<(StatusCode, Json<TaskRetryResponse>), ApiError> {
    let store = state.store(payload.db_type)?;

    let source = store
        .task(&task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("task not found".to_string()))?;
    if source.status != TaskStatus::Failed {
        return Err(ApiError::Conflict(
            "task status must be Failed to retry".to_string(),
        ));
    }

    let clone = store
        .create_retry(&source, payload.retry_reason.as_deref())
        .await?;
    store
        .update_status(
            &source.id,
            TaskStatus::FailedRetryCreated,
            StatusUpdate::default(),
        )
        .await?;

    if let Err(err) = schedule_worker(&state, payload.db_type, None).await {
        warn!(%err, "failed to schedule processing worker after retry creation");
    }

    Ok((
        StatusCode::CREATED,
        Json(TaskRetryResponse {
            task_id: clone.id,
            source_task_id: source.id,
            status: clone.status,
            db_type: payload.db_type,
            message: "Retry task created.".to_string(),
        }),
    ))
}
