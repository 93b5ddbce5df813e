//! Maintainer-only inspection and recovery of the global processing lock.

use axum::extract::{Extension, Query};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use vidsum_core::{DbType, ProcessingLockInfo};

use super::default_db_type;
use crate::error::ApiError;
use crate::state::AppState;

const MAINTAINER_TOKEN_HEADER: &str = "x-maintainer-token";

#[derive(Debug, Clone, Serialize)]
pub struct LockSnapshot {
    pub worker_id: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub age_seconds: Option<f64>,
    pub stale: bool,
}

fn build_snapshot(info: &ProcessingLockInfo, timeout_secs: u64) -> LockSnapshot {
    let age_seconds = info.locked_at.map(|locked_at| {
        ((Utc::now() - locked_at).num_milliseconds() as f64 / 1000.0).max(0.0)
    });
    LockSnapshot {
        worker_id: info.worker_id.clone(),
        locked_at: info.locked_at,
        stale: age_seconds.is_some_and(|age| age >= timeout_secs as f64),
        age_seconds,
    }
}

fn ensure_maintainer(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(admin_token) = &state.settings.admin_token else {
        return Err(ApiError::AdminTokenUnconfigured);
    };
    let provided = headers
        .get(MAINTAINER_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or(ApiError::MissingToken)?;
    if provided != admin_token {
        return Err(ApiError::InvalidToken);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct LockStatusQuery {
    #[serde(default = "default_db_type")]
    pub db_type: DbType,
}

#[derive(Debug, Serialize)]
pub struct LockStatusResponse {
    pub db_type: DbType,
    pub snapshot: LockSnapshot,
}

/// GET /processing-lock
pub async fn lock_status(
    Extension(state): Extension<AppState>,
    Query(query): Query<LockStatusQuery>,
    headers: HeaderMap,
) -> Result<Json<LockStatusResponse>, ApiError> {
    ensure_maintainer(&state, &headers)?;
    let store = state.store(query.db_type)?;
    let snapshot = build_snapshot(&store.read_lock().await?, state.settings.global_lock_secs);
    info!(
        db_type = %query.db_type,
        worker_id = ?snapshot.worker_id,
        stale = snapshot.stale,
        "maintainer inspected processing lock"
    );
    Ok(Json(LockStatusResponse {
        db_type: query.db_type,
        snapshot,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockReleaseRequest {
    #[serde(default = "default_db_type")]
    pub db_type: DbType,
    #[serde(default)]
    pub expected_worker_id: Option<String>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub force_threshold_seconds: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct LockReleaseResponse {
    pub db_type: DbType,
    pub released: bool,
    pub reason: Option<String>,
    pub before: LockSnapshot,
    pub after: LockSnapshot,
}

/// DELETE /processing-lock - release the global lock, optionally forcing it.
///
/// Decision ladder: no lock → report; dry run → report; force → require the
/// configured age threshold, then clear unconditionally; otherwise the
/// caller must name the current holder exactly.
pub async fn release_lock(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LockReleaseRequest>,
) -> Result<Json<LockReleaseResponse>, ApiError> {
    ensure_maintainer(&state, &headers)?;
    if payload.force_threshold_seconds.is_some_and(|t| t < 0) {
        return Err(ApiError::InvalidInput(
            "force_threshold_seconds must be greater than or equal to 0".to_string(),
        ));
    }

    let store = state.store(payload.db_type)?;
    let timeout = state.settings.global_lock_secs;
    let before_info = store.read_lock().await?;
    let before = build_snapshot(&before_info, timeout);

    let Some(holder) = before_info.worker_id.clone() else {
        info!(db_type = %payload.db_type, "lock release requested but no lock was present");
        return Ok(Json(LockReleaseResponse {
            db_type: payload.db_type,
            released: false,
            reason: Some("lock_not_found".to_string()),
            after: before.clone(),
            before,
        }));
    };

    if payload.dry_run {
        info!(db_type = %payload.db_type, worker_id = %holder, "processing lock dry-run");
        return Ok(Json(LockReleaseResponse {
            db_type: payload.db_type,
            released: false,
            reason: payload.reason.or_else(|| Some("dry_run".to_string())),
            after: before.clone(),
            before,
        }));
    }

    if payload.force {
        let threshold = payload.force_threshold_seconds.unwrap_or(0);
        let age = before.age_seconds.unwrap_or(0.0);
        if threshold > 0 && age < threshold as f64 {
            return Err(ApiError::Conflict(
                "processing lock has not aged enough for a forced release".to_string(),
            ));
        }

        store.clear_lock().await?;
        let after = build_snapshot(&store.read_lock().await?, timeout);
        info!(
            db_type = %payload.db_type,
            worker_id = %holder,
            reason = ?payload.reason,
            "processing lock force-released"
        );
        return Ok(Json(LockReleaseResponse {
            db_type: payload.db_type,
            released: true,
            reason: payload.reason,
            before,
            after,
        }));
    }

    let Some(expected) = payload.expected_worker_id else {
        return Err(ApiError::Conflict(
            "expected_worker_id is required unless force=true".to_string(),
        ));
    };
    if holder != expected {
        return Err(ApiError::Conflict(format!("lock is held by {holder}")));
    }

    store.release_lock(&holder).await?;
    let after = build_snapshot(&store.read_lock().await?, timeout);
    info!(db_type = %payload.db_type, worker_id = %holder, "processing lock released");
    Ok(Json(LockReleaseResponse {
        db_type: payload.db_type,
        released: true,
        reason: payload.reason,
        before,
        after,
    }))
}
