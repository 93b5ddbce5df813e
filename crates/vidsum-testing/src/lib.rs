//! Test doubles for the vidsum engine.
//!
//! [`MemoryTaskStore`] implements the full `TaskStore` contract, including
//! the claim ordering and both lease layers, so worker behavior can be
//! exercised without a database. The stage stubs and the recording notifier
//! mirror how the pipeline is mocked in the engine's own tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use vidsum_core::{
    DownloadedMedia, Downloader, ProcessingLockInfo, QueueCounts, StatusUpdate, StoreError,
    Summarizer, SummarySink, Task, TaskStatus, TaskStore, Transcriber,
};

/// Default title resolved by [`StubDownloader`].
pub const STUB_TITLE: &str = "Stub Title";
/// Default summary produced by [`StubSummarizer`].
pub const STUB_SUMMARY: &str = "Stub Summary";

#[derive(Default)]
struct MemoryState {
    tasks: Vec<Task>,
    next_id: i64,
    lock: Option<(String, DateTime<Utc>)>,
}

/// In-memory `TaskStore` with faithful claim and lock semantics.
#[derive(Default)]
pub struct MemoryTaskStore {
    state: Mutex<MemoryState>,
    fail_claims: AtomicBool,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `acquire_next` fail with a transport error.
    pub fn fail_claims(&self, fail: bool) {
        self.fail_claims.store(fail, Ordering::SeqCst);
    }

    /// Seed a task in an arbitrary state, bypassing the insert path.
    pub fn seed_task(&self, mut build: impl FnMut(&mut Task)) -> Task {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let mut task = blank_task(state.next_id);
        build(&mut task);
        state.tasks.push(task.clone());
        task
    }

    /// Age a claimed row's lease by `secs`, as if its worker stalled.
    pub fn rewind_task_lease(&self, id: &str, secs: i64) {
        let mut state = self.state.lock().unwrap();
        if let Some(task) = state.tasks.iter_mut().find(|task| task.id == id) {
            if let Some(locked_at) = task.locked_at {
                task.locked_at = Some(locked_at - Duration::seconds(secs));
            }
        }
    }

    /// Age the global lease by `secs`.
    pub fn rewind_global_lock(&self, secs: i64) {
        let mut state = self.state.lock().unwrap();
        if let Some((_, locked_at)) = state.lock.as_mut() {
            *locked_at -= Duration::seconds(secs);
        }
    }
}

fn blank_task(id: i64) -> Task {
    Task {
        id: id.to_string(),
        url: String::new(),
        status: TaskStatus::Pending,
        title: String::new(),
        summary: String::new(),
        error_message: String::new(),
        created_at: Some(Utc::now()),
        updated_at: Some(Utc::now()),
        processing_duration: None,
        locked_at: None,
        worker_id: None,
        retry_of_task_id: None,
        retry_reason: String::new(),
        external_page_id: None,
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn add_task(&self, url: &str) -> Result<Task, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let mut task = blank_task(state.next_id);
        task.url = url.to_string();
        task.title = url.to_string();
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn pending_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Pending)
            .cloned()
            .collect())
    }

    async fn all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.state.lock().unwrap().tasks.clone())
    }

    async fn task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.tasks.iter().find(|task| task.id == id).cloned())
    }

    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        update: StatusUpdate,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let Some(task) = state.tasks.iter_mut().find(|task| task.id == id) else {
            return Ok(());
        };
        task.status = status;
        task.updated_at = Some(Utc::now());
        if let Some(title) = update.title {
            task.title = title;
        }
        if let Some(summary) = update.summary {
            task.summary = summary;
        }
        if let Some(error_message) = update.error_message {
            task.error_message = error_message;
        }
        if let Some(duration) = update.processing_duration {
            task.processing_duration = Some(duration);
        }
        if let Some(page_id) = update.external_page_id {
            task.external_page_id = Some(page_id);
        }
        if status != TaskStatus::Processing {
            task.locked_at = None;
            task.worker_id = None;
        }
        Ok(())
    }

    async fn create_retry(
        &self,
        source: &Task,
        reason: Option<&str>,
    ) -> Result<Task, StoreError> {
        let reason = reason
            .map(str::to_string)
            .or_else(|| {
                (!source.error_message.is_empty()).then(|| source.error_message.clone())
            })
            .unwrap_or_else(|| "Manual retry".to_string());

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let mut task = blank_task(state.next_id);
        task.url = source.url.clone();
        task.title = if source.title.is_empty() {
            source.url.clone()
        } else {
            source.title.clone()
        };
        task.retry_of_task_id = Some(source.id.clone());
        task.retry_reason = reason;
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn acquire_next(
        &self,
        worker_id: &str,
        lease_secs: u64,
    ) -> Result<Option<Task>, StoreError> {
        if self.fail_claims.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected claim failure".into()));
        }

        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let cutoff = now - Duration::seconds(lease_secs as i64);

        let candidate = state
            .tasks
            .iter_mut()
            .filter(|task| match task.status {
                TaskStatus::Pending => true,
                TaskStatus::Processing => {
                    task.locked_at.map_or(true, |locked_at| locked_at <= cutoff)
                }
                _ => false,
            })
            .min_by_key(|task| {
                (
                    task.created_at,
                    task.id.parse::<i64>().unwrap_or(i64::MAX),
                )
            });

        let Some(task) = candidate else {
            return Ok(None);
        };
        task.status = TaskStatus::Processing;
        task.worker_id = Some(worker_id.to_string());
        task.locked_at = Some(now);
        task.updated_at = Some(now);
        Ok(Some(task.clone()))
    }

    async fn acquire_lock(&self, worker_id: &str, timeout_secs: u64) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let cutoff = now - Duration::seconds(timeout_secs as i64);

        if let Some((holder, locked_at)) = &state.lock {
            if holder != worker_id && *locked_at > cutoff {
                return Ok(false);
            }
        }
        state.lock = Some((worker_id.to_string(), now));
        Ok(true)
    }

    async fn refresh_lock(&self, worker_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some((holder, locked_at)) = state.lock.as_mut() {
            if holder == worker_id {
                *locked_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn release_lock(&self, worker_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if matches!(&state.lock, Some((holder, _)) if holder == worker_id) {
            state.lock = None;
        }
        Ok(())
    }

    async fn read_lock(&self) -> Result<ProcessingLockInfo, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(match &state.lock {
            Some((worker_id, locked_at)) => ProcessingLockInfo {
                worker_id: Some(worker_id.clone()),
                locked_at: Some(*locked_at),
            },
            None => ProcessingLockInfo::default(),
        })
    }

    async fn clear_lock(&self) -> Result<(), StoreError> {
        self.state.lock().unwrap().lock = None;
        Ok(())
    }

    async fn counts(&self) -> Result<QueueCounts, StoreError> {
        let state = self.state.lock().unwrap();
        let mut counts = QueueCounts::default();
        for task in &state.tasks {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Processing => counts.processing += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::FailedRetryCreated => counts.failed_retry_created += 1,
            }
        }
        Ok(counts)
    }
}

/// Downloader stub: derives a deterministic fake path from the URL and
/// resolves the configured title.
pub struct StubDownloader {
    title: String,
    delay: Option<std::time::Duration>,
}

impl Default for StubDownloader {
    fn default() -> Self {
        Self {
            title: STUB_TITLE.to_string(),
            delay: None,
        }
    }
}

impl StubDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            delay: None,
        }
    }

    /// Sleep before resolving, to hold a worker inside a stage.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Downloader for StubDownloader {
    async fn download(&self, url: &str) -> anyhow::Result<DownloadedMedia> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let slug = vidsum_core::util::sanitize_filename(url);
        Ok(DownloadedMedia {
            path: PathBuf::from(format!("/tmp/{slug}.mp3")),
            title: Some(self.title.clone()),
        })
    }
}

/// Transcriber stub returning fixed text, optionally failing for audio
/// paths that contain a marker substring.
#[derive(Default)]
pub struct StubTranscriber {
    fail_markers: HashSet<String>,
}

impl StubTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any transcription whose audio path contains `marker`.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_markers.insert(marker.into());
        self
    }
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, audio: &Path) -> anyhow::Result<String> {
        let path = audio.to_string_lossy();
        for marker in &self.fail_markers {
            if path.contains(marker.as_str()) {
                bail!("transcription failed for {path}");
            }
        }
        Ok("stub transcript".to_string())
    }

    fn label(&self) -> String {
        "stub-transcriber".to_string()
    }
}

/// Summarizer stub returning a fixed summary.
#[derive(Default)]
pub struct StubSummarizer;

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(&self, _title: &str, _transcript: &str) -> anyhow::Result<String> {
        Ok(STUB_SUMMARY.to_string())
    }

    fn label(&self) -> String {
        "stub-summarizer".to_string()
    }
}

/// Sink stub recording every persisted summary.
#[derive(Default)]
pub struct RecordingSink {
    page_id: Option<String>,
    saved: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_id(page_id: impl Into<String>) -> Self {
        Self {
            page_id: Some(page_id.into()),
            saved: Mutex::new(Vec::new()),
        }
    }

    /// `(title, source_url)` pairs persisted so far.
    pub fn saved(&self) -> Vec<(String, String)> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl SummarySink for RecordingSink {
    async fn persist(
        &self,
        title: &str,
        _text: &str,
        _model: &str,
        source_url: &str,
    ) -> anyhow::Result<Option<String>> {
        self.saved
            .lock()
            .unwrap()
            .push((title.to_string(), source_url.to_string()));
        Ok(self.page_id.clone())
    }
}

/// Notifier stub recording every call.
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(String, String, Vec<String>)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl vidsum_core::CompletionNotifier for RecordingNotifier {
    async fn notify(&self, title: &str, source_url: &str, extra_links: &[String]) -> bool {
        self.calls.lock().unwrap().push((
            title.to_string(),
            source_url.to_string(),
            extra_links.to_vec(),
        ));
        true
    }
}
