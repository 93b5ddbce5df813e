//! Explicit "drain now" endpoint.

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use vidsum_core::DbType;

use super::default_db_type;
use crate::error::ApiError;
use crate::schedule::schedule_worker;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessingJobRequest {
    #[serde(default = "default_db_type")]
    pub db_type: DbType,
    #[serde(default)]
    pub worker_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessingJobResponse {
    pub worker_id: String,
    pub db_type: DbType,
    pub accepted: bool,
    pub message: String,
}

/// POST /processing-jobs - acquire the global lock synchronously, then
/// spawn the background worker. Contention is a 409.
pub async fn create_processing_job(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ProcessingJobRequest>,
) -> Result<(StatusCode, Json<ProcessingJobResponse>), ApiError> {
    let scheduled = schedule_worker(&state, payload.db_type, payload.worker_id).await?;
    if !scheduled.accepted {
        return Err(ApiError::Conflict(scheduled.message));
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessingJobResponse {
            worker_id: scheduled.worker_id.unwrap_or_default(),
            db_type: payload.db_type,
            accepted: true,
            message: scheduled.message,
        }),
    ))
}
