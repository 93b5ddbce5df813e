//! The queue-draining worker: global lock, claim loop, staged pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::notify::CompletionNotifier;
use crate::stage::Pipeline;
use crate::store::{StatusUpdate, TaskStore};
use crate::task::{Task, TaskStatus};
use crate::util::build_summary_output_path;

pub const DEFAULT_TASK_LEASE_SECS: u64 = 900;
pub const DEFAULT_GLOBAL_LOCK_SECS: u64 = 1800;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

/// Tuning knobs for one worker run.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Explicit worker id; a random `worker-<uuid>` token otherwise.
    pub worker_id: Option<String>,
    pub task_lease_secs: u64,
    pub global_lock_secs: u64,
    pub refresh_interval_secs: u64,
    /// When set, finished summaries are also written here as markdown.
    pub summaries_dir: Option<PathBuf>,
    /// Base URL for linking persisted summary pages in notifications.
    pub page_base_url: Option<String>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            worker_id: None,
            task_lease_secs: DEFAULT_TASK_LEASE_SECS,
            global_lock_secs: DEFAULT_GLOBAL_LOCK_SECS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            summaries_dir: None,
            page_base_url: None,
        }
    }
}

/// Aggregated result of a worker run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub worker_id: String,
    pub processed: u32,
    pub failed: u32,
    pub acquired_lock: bool,
}

/// Cooperative task keeping the global lease alive while stages run.
///
/// Refresh errors are logged and retried on the next tick; the stop signal
/// is observed within one interval and triggers a final refresh-on-shutdown
/// so the lease reflects the worker's last sign of life.
struct LockRefresher {
    store: Arc<dyn TaskStore>,
    worker_id: String,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl LockRefresher {
    fn spawn(store: Arc<dyn TaskStore>, worker_id: String, interval: Duration) -> Self {
        let (stop, mut stopped) = watch::channel(false);
        let tick_store = Arc::clone(&store);
        let tick_worker = worker_id.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        refresh_once(tick_store.as_ref(), &tick_worker).await;
                    }
                    _ = stopped.changed() => {
                        refresh_once(tick_store.as_ref(), &tick_worker).await;
                        break;
                    }
                }
            }
        });
        Self {
            store,
            worker_id,
            stop,
            handle,
        }
    }

    /// Force an immediate refresh so a long stage cannot outlive the lease.
    async fn ping(&self) {
        refresh_once(self.store.as_ref(), &self.worker_id).await;
    }

    async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.handle.await;
    }
}

async fn refresh_once(store: &dyn TaskStore, worker_id: &str) {
    if let Err(err) = store.refresh_lock(worker_id).await {
        warn!(worker_id, %err, "failed to refresh processing lock");
    }
}

struct PipelineOutcome {
    summary: String,
    page_id: Option<String>,
}

/// Background worker that drains the pending task queue.
pub struct ProcessingWorker {
    store: Arc<dyn TaskStore>,
    pipeline: Pipeline,
    notifier: Arc<dyn CompletionNotifier>,
    options: WorkerOptions,
    worker_id: String,
}

impl ProcessingWorker {
    pub fn new(
        store: Arc<dyn TaskStore>,
        pipeline: Pipeline,
        notifier: Arc<dyn CompletionNotifier>,
        options: WorkerOptions,
    ) -> Self {
        let worker_id = options
            .worker_id
            .clone()
            .unwrap_or_else(|| format!("worker-{}", Uuid::new_v4().simple()));
        Self {
            store,
            pipeline,
            notifier,
            options,
            worker_id,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run the claim loop until no executable tasks remain.
    ///
    /// Exit paths all release the global lock; a store failure while
    /// claiming ends the run cleanly rather than wedging the queue.
    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary {
            worker_id: self.worker_id.clone(),
            processed: 0,
            failed: 0,
            acquired_lock: false,
        };

        info!(worker_id = %self.worker_id, "requesting processing lock");
        match self
            .store
            .acquire_lock(&self.worker_id, self.options.global_lock_secs)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!(
                    worker_id = %self.worker_id,
                    "could not acquire processing lock; another worker is active"
                );
                return summary;
            }
            Err(err) => {
                error!(worker_id = %self.worker_id, %err, "failed to acquire processing lock");
                return summary;
            }
        }
        summary.acquired_lock = true;

        let refresher = LockRefresher::spawn(
            Arc::clone(&self.store),
            self.worker_id.clone(),
            Duration::from_secs(self.options.refresh_interval_secs.max(1)),
        );

        loop {
            let task = match self
                .store
                .acquire_next(&self.worker_id, self.options.task_lease_secs)
                .await
            {
                Ok(Some(task)) => task,
                Ok(None) => {
                    info!(worker_id = %self.worker_id, "no pending tasks; exiting");
                    break;
                }
                Err(err) => {
                    error!(worker_id = %self.worker_id, %err, "error while acquiring tasks");
                    break;
                }
            };

            refresher.ping().await;
            if self.process_task(task).await {
                summary.processed += 1;
            } else {
                summary.failed += 1;
            }
            refresher.ping().await;
        }

        refresher.stop().await;
        if let Err(err) = self.store.release_lock(&self.worker_id).await {
            warn!(worker_id = %self.worker_id, %err, "failed to release processing lock");
        }
        info!(
            worker_id = %self.worker_id,
            processed = summary.processed,
            failed = summary.failed,
            "released processing lock"
        );
        summary
    }

    /// Execute the full pipeline for one claimed task.
    ///
    /// Stage failures are recorded on the row as Failed and swallowed here
    /// so the loop keeps its forward progress.
    async fn process_task(&self, mut task: Task) -> bool {
        info!(
            worker_id = %self.worker_id,
            task_id = %task.id,
            url = %task.url,
            "processing task"
        );
        let started = Instant::now();

        match self.run_pipeline(&mut task).await {
            Ok(outcome) => {
                let duration = started.elapsed().as_secs_f64();
                let update = StatusUpdate {
                    title: Some(task.title.clone()),
                    summary: Some(outcome.summary),
                    processing_duration: Some(duration),
                    external_page_id: outcome.page_id.clone(),
                    ..Default::default()
                };
                if let Err(err) = self
                    .store
                    .update_status(&task.id, TaskStatus::Completed, update)
                    .await
                {
                    error!(task_id = %task.id, %err, "failed to record task completion");
                    return false;
                }

                // Terminal state is committed; the webhook is best effort.
                let mut links = Vec::new();
                if let (Some(base), Some(page_id)) =
                    (&self.options.page_base_url, &outcome.page_id)
                {
                    links.push(format!(
                        "{}/{}",
                        base.trim_end_matches('/'),
                        page_id.replace('-', "")
                    ));
                }
                let title = if task.title.is_empty() {
                    "untitled"
                } else {
                    task.title.as_str()
                };
                self.notifier.notify(title, &task.url, &links).await;

                info!(
                    worker_id = %self.worker_id,
                    task_id = %task.id,
                    duration,
                    "completed task"
                );
                true
            }
            Err(err) => {
                let duration = started.elapsed().as_secs_f64();
                error!(
                    worker_id = %self.worker_id,
                    task_id = %task.id,
                    error = format!("{err:#}"),
                    "failed to process task"
                );
                let update = StatusUpdate {
                    error_message: Some(format!("{err:#}")),
                    processing_duration: Some(duration),
                    ..Default::default()
                };
                if let Err(update_err) = self
                    .store
                    .update_status(&task.id, TaskStatus::Failed, update)
                    .await
                {
                    error!(task_id = %task.id, %update_err, "failed to record task failure");
                }
                false
            }
        }
    }

    async fn run_pipeline(&self, task: &mut Task) -> anyhow::Result<PipelineOutcome> {
        let media = self.pipeline.downloader.download(&task.url).await?;
        if let Some(title) = media.title.filter(|title| !title.is_empty()) {
            task.title = title;
        }
        if task.title.is_empty() {
            task.title = task.url.clone();
        }

        // Persist the resolved title right away so crash recovery and
        // observers see it while the row stays Processing.
        self.store
            .update_status(
                &task.id,
                TaskStatus::Processing,
                StatusUpdate {
                    title: Some(task.title.clone()),
                    ..Default::default()
                },
            )
            .await?;

        let transcript = self.pipeline.transcriber.transcribe(&media.path).await?;
        let summary = self
            .pipeline
            .summarizer
            .summarize(&task.title, &transcript)
            .await?;

        if let Some(dir) = &self.options.summaries_dir {
            let path = build_summary_output_path(&task.title, &task.url, Utc::now(), dir);
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, &summary).await?;
        }

        let model = self.pipeline.model_label();
        let page_id = self
            .pipeline
            .sink
            .persist(&task.title, &summary, &model, &task.url)
            .await?;

        Ok(PipelineOutcome { summary, page_id })
    }
}
