//! Queue health surface.

use axum::extract::{Extension, Query};
use axum::Json;
use serde::{Deserialize, Serialize};
use vidsum_core::{DbType, QueueCounts};

use super::default_db_type;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueueStatsQuery {
    #[serde(default = "default_db_type")]
    pub db_type: DbType,
}

#[derive(Debug, Serialize)]
pub struct QueueStatsResponse {
    pub db_type: DbType,
    pub counts: QueueCounts,
}

/// GET /queue-stats - per-status totals.
pub async fn queue_stats(
    Extension(state): Extension<AppState>,
    Query(query): Query<QueueStatsQuery>,
) -> Result<Json<QueueStatsResponse>, ApiError> {
    let store = state.store(query.db_type)?;
    Ok(Json(QueueStatsResponse {
        db_type: query.db_type,
        counts: store.counts().await?,
    }))
}
