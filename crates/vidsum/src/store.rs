//! Store trait for durable task persistence and both locking layers.

use async_trait::async_trait;

use crate::task::{ProcessingLockInfo, QueueCounts, Task, TaskStatus};

/// Failure surface of every store operation.
///
/// `Unavailable` covers transport-level trouble (connection, IO, remote
/// API); `InvariantViolation` covers constraint breaches and rows that no
/// longer parse. Callers treat both as fatal for the call, never for the
/// worker loop as a whole.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store invariant violated: {0}")]
    InvariantViolation(String),
}

/// Partial field update applied alongside a status change.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub error_message: Option<String>,
    pub processing_duration: Option<f64>,
    pub external_page_id: Option<String>,
}

/// Transactional task storage.
///
/// Every operation is atomic against the backend. Implementations must
/// guarantee that two concurrent `acquire_next` calls serialize on the
/// candidate row, and that any `update_status` to a non-Processing status
/// clears `worker_id` and `locked_at` in the same write.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new Pending task and return the persisted row.
    async fn add_task(&self, url: &str) -> Result<Task, StoreError>;

    /// All tasks currently Pending.
    async fn pending_tasks(&self) -> Result<Vec<Task>, StoreError>;

    /// Every task, for the UI surface.
    async fn all_tasks(&self) -> Result<Vec<Task>, StoreError>;

    /// Look up a single task by id.
    async fn task(&self, id: &str) -> Result<Option<Task>, StoreError>;

    /// Apply a status change plus any partial field updates.
    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        update: StatusUpdate,
    ) -> Result<(), StoreError>;

    /// Clone a failed task into a fresh Pending row.
    ///
    /// The clone copies `url` and the best-known `title`, points
    /// `retry_of_task_id` at the source, and records
    /// `reason ?? source.error_message ?? "Manual retry"`.
    async fn create_retry(
        &self,
        source: &Task,
        reason: Option<&str>,
    ) -> Result<Task, StoreError>;

    /// Atomically claim the next executable task for `worker_id`.
    ///
    /// A task is executable when Pending, or when Processing with a lease
    /// older than `lease_secs` (a stalled worker). Candidates are taken in
    /// `(created_at ASC, id ASC)` order. Returns the refreshed row, or
    /// `None` when nothing is claimable.
    async fn acquire_next(
        &self,
        worker_id: &str,
        lease_secs: u64,
    ) -> Result<Option<Task>, StoreError>;

    /// Try to take the global processing lock.
    ///
    /// Succeeds when the lock is free, already held by `worker_id`, or
    /// held by a lease older than `timeout_secs`.
    async fn acquire_lock(&self, worker_id: &str, timeout_secs: u64) -> Result<bool, StoreError>;

    /// Extend the global lease if `worker_id` still holds it; no-op otherwise.
    async fn refresh_lock(&self, worker_id: &str) -> Result<(), StoreError>;

    /// Release the global lock iff `worker_id` holds it.
    async fn release_lock(&self, worker_id: &str) -> Result<(), StoreError>;

    /// Current global lock holder, for inspection.
    async fn read_lock(&self) -> Result<ProcessingLockInfo, StoreError>;

    /// Unconditionally clear the global lock. Maintainer recovery path only.
    async fn clear_lock(&self) -> Result<(), StoreError>;

    /// Per-status totals for the health/UI surface.
    async fn counts(&self) -> Result<QueueCounts, StoreError>;
}
