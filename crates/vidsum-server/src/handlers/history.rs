//! Recent-view breadcrumbs for the UI.

use axum::extract::{Extension, Query};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use vidsum_core::{DbType, RecentView};

use super::default_db_type;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecentViewsQuery {
    pub client_id: String,
}

/// GET /recent-views - pruned history for one client, most recent first.
pub async fn list_recent_views(
    Extension(state): Extension<AppState>,
    Query(query): Query<RecentViewsQuery>,
) -> Json<Vec<RecentView>> {
    Json(state.history.recent(&query.client_id).await)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecentViewRequest {
    pub client_id: String,
    pub task_id: String,
    #[serde(default = "default_db_type")]
    pub db_type: DbType,
}

/// POST /recent-views - record that a client viewed a task.
pub async fn record_recent_view(
    Extension(state): Extension<AppState>,
    Json(payload): Json<RecentViewRequest>,
) -> Result<(StatusCode, Json<RecentView>), ApiError> {
    let store = state.store(payload.db_type)?;
    let task = store
        .task(&payload.task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("task not found".to_string()))?;

    let page_url = match (&state.settings.page_base_url, &task.external_page_id) {
        (Some(base), Some(page_id)) => Some(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            page_id.replace('-', "")
        )),
        _ => None,
    };
    let view = RecentView {
        id: task.id.clone(),
        title: if task.title.is_empty() {
            task.url.clone()
        } else {
            task.title.clone()
        },
        url: task.url.clone(),
        page_url,
        viewed_at: Utc::now(),
    };

    state
        .history
        .record(&payload.client_id, view.clone())
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok((StatusCode::CREATED, Json(view)))
}
