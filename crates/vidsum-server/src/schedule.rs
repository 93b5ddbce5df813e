//! Background worker scheduling with locking semantics.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use vidsum_core::{DbType, ProcessingWorker, WorkerOptions};

use crate::error::ApiError;
use crate::state::AppState;

/// Outcome of a scheduling attempt.
#[derive(Debug, Clone)]
pub struct Scheduled {
    pub accepted: bool,
    pub worker_id: Option<String>,
    pub message: String,
}

impl Scheduled {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            worker_id: None,
            message: message.into(),
        }
    }
}

/// Acquire the global lock in the request path and, on success, spawn the
/// queue-draining worker as a background task that outlives the response.
///
/// The spawned task releases the lock again after the run as a guard on
/// top of the worker's own release, so a crashed run cannot strand it.
pub async fn schedule_worker(
    state: &AppState,
    db_type: DbType,
    worker_id: Option<String>,
) -> Result<Scheduled, ApiError> {
    let store = state.store(db_type)?;
    let assigned = worker_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("api-worker-{}", Uuid::new_v4().simple()));

    let acquired = store
        .acquire_lock(&assigned, state.settings.global_lock_secs)
        .await?;
    if !acquired {
        return Ok(Scheduled::rejected("Processing already running."));
    }

    let options = WorkerOptions {
        worker_id: Some(assigned.clone()),
        task_lease_secs: state.settings.task_lease_secs,
        global_lock_secs: state.settings.global_lock_secs,
        refresh_interval_secs: state.settings.refresh_interval_secs,
        summaries_dir: state.settings.summaries_dir.clone(),
        page_base_url: state.settings.page_base_url.clone(),
    };
    let worker = ProcessingWorker::new(
        Arc::clone(&store),
        state.pipeline.clone(),
        Arc::clone(&state.notifier),
        options,
    );

    let guard_store = store;
    let guard_id = assigned.clone();
    tokio::spawn(async move {
        let summary = worker.run().await;
        info!(
            worker_id = %summary.worker_id,
            processed = summary.processed,
            failed = summary.failed,
            "processing worker finished"
        );
        if let Err(err) = guard_store.release_lock(&guard_id).await {
            warn!(worker_id = %guard_id, %err, "failed to release processing lock after run");
        }
    });

    info!(worker_id = %assigned, %db_type, "scheduled processing worker");
    Ok(Scheduled {
        accepted: true,
        worker_id: Some(assigned),
        message: "Processing worker scheduled.".to_string(),
    })
}
