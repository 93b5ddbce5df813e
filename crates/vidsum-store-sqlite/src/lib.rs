//! SQLite implementation of the vidsum task store.
//!
//! This is the reference backend: it provides the atomic row claim, both
//! lease layers, and the partial status update the engine relies on.
//!
//! # Database Schema
//!
//! ```sql
//! CREATE TABLE tasks (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     url TEXT NOT NULL,
//!     status TEXT NOT NULL,
//!     title TEXT,
//!     summary TEXT,
//!     error_message TEXT,
//!     created_at TEXT NOT NULL,
//!     updated_at TEXT NOT NULL,
//!     processing_duration REAL,
//!     locked_at TEXT,
//!     worker_id TEXT,
//!     retry_of_task_id INTEGER,
//!     retry_reason TEXT,
//!     external_page_id TEXT
//! );
//!
//! CREATE TABLE processing_lock (
//!     id INTEGER PRIMARY KEY CHECK (id = 1),
//!     worker_id TEXT,
//!     locked_at TEXT
//! );
//! ```
//!
//! # Concurrency
//!
//! The claim and the global-lock acquire are each a single guarded write
//! statement. SQLite serializes writers, so two claimers racing for the
//! same candidate row resolve to exactly one winner; the loser's statement
//! re-evaluates the candidate subquery and either picks a later row or
//! affects nothing.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use vidsum_core::{
    ProcessingLockInfo, QueueCounts, StatusUpdate, StoreError, Task, TaskStatus, TaskStore,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(3);

/// SQLite task store over a connection pool.
#[derive(Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    /// Wrap an existing pool. The schema must already exist
    /// (see [`SqliteTaskStore::connect`]).
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database at `path` and ensure the schema.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(store_err)?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                status TEXT NOT NULL,
                title TEXT,
                summary TEXT,
                error_message TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                processing_duration REAL,
                locked_at TEXT,
                worker_id TEXT,
                retry_of_task_id INTEGER,
                retry_reason TEXT,
                external_page_id TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processing_lock (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                worker_id TEXT,
                locked_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_tasks_claimable
                ON tasks (created_at, id)
                WHERE status IN ('Pending', 'Processing')
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn add_task(&self, url: &str) -> Result<Task, StoreError> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO tasks (url, status, title, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            RETURNING *
            "#,
        )
        .bind(url)
        .bind(TaskStatus::Pending.as_str())
        .bind(url)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        task_from_row(&row)
    }

    async fn pending_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE status = ?1 ORDER BY created_at, id")
            .bind(TaskStatus::Pending.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.iter().map(task_from_row).collect()
    }

    async fn all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query("SELECT * FROM tasks ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        rows.iter().map(task_from_row).collect()
    }

    async fn task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let Ok(rowid) = id.parse::<i64>() else {
            return Ok(None);
        };
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?1")
            .bind(rowid)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        update: StatusUpdate,
    ) -> Result<(), StoreError> {
        let Ok(rowid) = id.parse::<i64>() else {
            return Ok(());
        };

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE tasks SET status = ");
        builder.push_bind(status.as_str());
        builder.push(", updated_at = ").push_bind(Utc::now());
        if let Some(title) = update.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(summary) = update.summary {
            builder.push(", summary = ").push_bind(summary);
        }
        if let Some(error_message) = update.error_message {
            builder.push(", error_message = ").push_bind(error_message);
        }
        if let Some(duration) = update.processing_duration {
            builder.push(", processing_duration = ").push_bind(duration);
        }
        if let Some(page_id) = update.external_page_id {
            builder.push(", external_page_id = ").push_bind(page_id);
        }
        if status != TaskStatus::Processing {
            builder.push(", locked_at = NULL, worker_id = NULL");
        }
        builder.push(" WHERE id = ").push_bind(rowid);

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
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
        let title = if source.title.is_empty() {
            source.url.as_str()
        } else {
            source.title.as_str()
        };
        let parent_id = source.id.parse::<i64>().ok();
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO tasks (url, status, title, retry_of_task_id, retry_reason,
                               created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            RETURNING *
            "#,
        )
        .bind(&source.url)
        .bind(TaskStatus::Pending.as_str())
        .bind(title)
        .bind(parent_id)
        .bind(&reason)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        task_from_row(&row)
    }

    async fn acquire_next(
        &self,
        worker_id: &str,
        lease_secs: u64,
    ) -> Result<Option<Task>, StoreError> {
        let now = Utc::now();
        let stale_cutoff = now - chrono::Duration::seconds(lease_secs as i64);

        let row = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'Processing',
                worker_id = ?1,
                locked_at = ?2,
                updated_at = ?2
            WHERE id = (
                SELECT id
                FROM tasks
                WHERE status = 'Pending'
                   OR (
                        status = 'Processing'
                        AND (locked_at IS NULL OR locked_at <= ?3)
                   )
                ORDER BY created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(worker_id)
        .bind(now)
        .bind(stale_cutoff)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.as_ref().map(task_from_row).transpose()
    }

    async fn acquire_lock(&self, worker_id: &str, timeout_secs: u64) -> Result<bool, StoreError> {
        let now = Utc::now();
        let stale_cutoff = now - chrono::Duration::seconds(timeout_secs as i64);

        let result = sqlx::query(
            r#"
            INSERT INTO processing_lock (id, worker_id, locked_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT (id) DO UPDATE
                SET worker_id = excluded.worker_id,
                    locked_at = excluded.locked_at
                WHERE processing_lock.worker_id IS NULL
                   OR processing_lock.worker_id = excluded.worker_id
                   OR processing_lock.locked_at IS NULL
                   OR processing_lock.locked_at <= ?3
            "#,
        )
        .bind(worker_id)
        .bind(now)
        .bind(stale_cutoff)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn refresh_lock(&self, worker_id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE processing_lock SET locked_at = ?1 WHERE id = 1 AND worker_id = ?2")
            .bind(Utc::now())
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn release_lock(&self, worker_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE processing_lock
            SET worker_id = NULL, locked_at = NULL
            WHERE id = 1 AND worker_id = ?1
            "#,
        )
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn read_lock(&self) -> Result<ProcessingLockInfo, StoreError> {
        let row = sqlx::query("SELECT worker_id, locked_at FROM processing_lock WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        let Some(row) = row else {
            return Ok(ProcessingLockInfo::default());
        };
        Ok(ProcessingLockInfo {
            worker_id: row.try_get("worker_id").map_err(store_err)?,
            locked_at: row.try_get("locked_at").map_err(store_err)?,
        })
    }

    async fn clear_lock(&self) -> Result<(), StoreError> {
        sqlx::query("UPDATE processing_lock SET worker_id = NULL, locked_at = NULL WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn counts(&self) -> Result<QueueCounts, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'Pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'Processing') AS processing,
                COUNT(*) FILTER (WHERE status = 'Completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'Failed') AS failed,
                COUNT(*) FILTER (WHERE status = 'Failed Retry Created') AS failed_retry_created
            FROM tasks
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(QueueCounts {
            pending: row.try_get("pending").map_err(store_err)?,
            processing: row.try_get("processing").map_err(store_err)?,
            completed: row.try_get("completed").map_err(store_err)?,
            failed: row.try_get("failed").map_err(store_err)?,
            failed_retry_created: row.try_get("failed_retry_created").map_err(store_err)?,
        })
    }
}

fn task_from_row(row: &SqliteRow) -> Result<Task, StoreError> {
    let id: i64 = row.try_get("id").map_err(store_err)?;
    let status_raw: String = row.try_get("status").map_err(store_err)?;
    let status: TaskStatus = status_raw
        .parse()
        .map_err(|_| StoreError::InvariantViolation(format!("unknown task status {status_raw:?}")))?;

    Ok(Task {
        id: id.to_string(),
        url: row.try_get("url").map_err(store_err)?,
        status,
        title: row
            .try_get::<Option<String>, _>("title")
            .map_err(store_err)?
            .unwrap_or_default(),
        summary: row
            .try_get::<Option<String>, _>("summary")
            .map_err(store_err)?
            .unwrap_or_default(),
        error_message: row
            .try_get::<Option<String>, _>("error_message")
            .map_err(store_err)?
            .unwrap_or_default(),
        created_at: row.try_get("created_at").map_err(store_err)?,
        updated_at: row.try_get("updated_at").map_err(store_err)?,
        processing_duration: row.try_get("processing_duration").map_err(store_err)?,
        locked_at: row.try_get("locked_at").map_err(store_err)?,
        worker_id: row.try_get("worker_id").map_err(store_err)?,
        retry_of_task_id: row
            .try_get::<Option<i64>, _>("retry_of_task_id")
            .map_err(store_err)?
            .map(|parent| parent.to_string()),
        retry_reason: row
            .try_get::<Option<String>, _>("retry_reason")
            .map_err(store_err)?
            .unwrap_or_default(),
        external_page_id: row.try_get("external_page_id").map_err(store_err)?,
    })
}

fn store_err(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db)
            if db.is_unique_violation()
                || db.is_check_violation()
                || db.is_foreign_key_violation() =>
        {
            StoreError::InvariantViolation(err.to_string())
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_) => StoreError::InvariantViolation(err.to_string()),
        _ => StoreError::Unavailable(err.to_string()),
    }
}

/// Test hooks: direct lease manipulation used by liveness tests.
impl SqliteTaskStore {
    /// Age a claimed row's lease by `secs`.
    pub async fn rewind_task_lease(&self, id: &str, secs: i64) -> Result<(), StoreError> {
        let Ok(rowid) = id.parse::<i64>() else {
            return Ok(());
        };
        let row = sqlx::query("SELECT locked_at FROM tasks WHERE id = ?1")
            .bind(rowid)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        let Some(row) = row else { return Ok(()) };
        let locked_at: Option<DateTime<Utc>> = row.try_get("locked_at").map_err(store_err)?;
        let Some(locked_at) = locked_at else {
            return Ok(());
        };

        sqlx::query("UPDATE tasks SET locked_at = ?1 WHERE id = ?2")
            .bind(locked_at - chrono::Duration::seconds(secs))
            .bind(rowid)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    /// Age the global lease by `secs`.
    pub async fn rewind_global_lock(&self, secs: i64) -> Result<(), StoreError> {
        let info = self.read_lock().await?;
        let Some(locked_at) = info.locked_at else {
            return Ok(());
        };
        sqlx::query("UPDATE processing_lock SET locked_at = ?1 WHERE id = 1")
            .bind(locked_at - chrono::Duration::seconds(secs))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_store() -> (SqliteTaskStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTaskStore::connect(&dir.path().join("tasks.db"))
            .await
            .unwrap();
        (store, dir)
    }

    const URL_A: &str = "https://www.youtube.com/watch?v=stubvideo01";
    const URL_B: &str = "https://www.youtube.com/watch?v=stubvideo02";

    #[tokio::test]
    async fn add_task_round_trips() {
        let (store, _dir) = open_store().await;
        let task = store.add_task(URL_A).await.unwrap();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.url, URL_A);
        assert_eq!(task.title, URL_A);
        assert!(task.created_at.is_some());
        assert!(task.worker_id.is_none());

        let fetched = store.task(&task.id).await.unwrap().unwrap();
        assert_eq!(fetched.url, task.url);
        assert_eq!(fetched.id, task.id);
    }

    #[tokio::test]
    async fn missing_and_malformed_ids_resolve_to_none() {
        let (store, _dir) = open_store().await;
        assert!(store.task("9999").await.unwrap().is_none());
        assert!(store.task("not-a-rowid").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_sets_the_lease_and_respects_creation_order() {
        let (store, _dir) = open_store().await;
        let first = store.add_task(URL_A).await.unwrap();
        store.add_task(URL_B).await.unwrap();

        let claimed = store.acquire_next("worker-1", 900).await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.status, TaskStatus::Processing);
        assert_eq!(claimed.worker_id.as_deref(), Some("worker-1"));
        assert!(claimed.locked_at.is_some());
    }

    #[tokio::test]
    async fn claim_on_empty_queue_returns_none() {
        let (store, _dir) = open_store().await;
        assert!(store.acquire_next("worker-1", 900).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fresh_claims_are_not_stealable() {
        let (store, _dir) = open_store().await;
        store.add_task(URL_A).await.unwrap();

        assert!(store.acquire_next("worker-1", 900).await.unwrap().is_some());
        assert!(store.acquire_next("worker-2", 900).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_claims_are_reclaimed_by_another_worker() {
        let (store, _dir) = open_store().await;
        let task = store.add_task(URL_A).await.unwrap();

        let claimed = store.acquire_next("worker-a", 60).await.unwrap().unwrap();
        assert_eq!(claimed.worker_id.as_deref(), Some("worker-a"));
        store.rewind_task_lease(&task.id, 600).await.unwrap();

        let reclaimed = store.acquire_next("worker-b", 60).await.unwrap().unwrap();
        assert_eq!(reclaimed.id, task.id);
        assert_eq!(reclaimed.status, TaskStatus::Processing);
        assert_eq!(reclaimed.worker_id.as_deref(), Some("worker-b"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_claims_on_one_row_have_a_single_winner() {
        let (store, _dir) = open_store().await;
        store.add_task(URL_A).await.unwrap();

        let mut handles = Vec::new();
        for n in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.acquire_next(&format!("worker-{n}"), 900).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn non_processing_updates_clear_the_lease() {
        let (store, _dir) = open_store().await;
        let task = store.add_task(URL_A).await.unwrap();
        store.acquire_next("worker-1", 900).await.unwrap().unwrap();

        store
            .update_status(
                &task.id,
                TaskStatus::Completed,
                StatusUpdate {
                    title: Some("A Title".into()),
                    summary: Some("A summary".into()),
                    processing_duration: Some(1.5),
                    external_page_id: Some("page-9".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = store.task(&task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.title, "A Title");
        assert_eq!(updated.summary, "A summary");
        assert_eq!(updated.processing_duration, Some(1.5));
        assert_eq!(updated.external_page_id.as_deref(), Some("page-9"));
        assert!(updated.worker_id.is_none());
        assert!(updated.locked_at.is_none());
    }

    #[tokio::test]
    async fn processing_updates_keep_the_lease() {
        let (store, _dir) = open_store().await;
        let task = store.add_task(URL_A).await.unwrap();
        store.acquire_next("worker-1", 900).await.unwrap().unwrap();

        store
            .update_status(
                &task.id,
                TaskStatus::Processing,
                StatusUpdate {
                    title: Some("Resolved Title".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = store.task(&task.id).await.unwrap().unwrap();
        assert_eq!(updated.status, TaskStatus::Processing);
        assert_eq!(updated.title, "Resolved Title");
        assert_eq!(updated.worker_id.as_deref(), Some("worker-1"));
        assert!(updated.locked_at.is_some());
    }

    #[tokio::test]
    async fn retry_clone_copies_url_and_links_to_source() {
        let (store, _dir) = open_store().await;
        let task = store.add_task(URL_A).await.unwrap();
        store
            .update_status(
                &task.id,
                TaskStatus::Failed,
                StatusUpdate {
                    error_message: Some("boom".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let source = store.task(&task.id).await.unwrap().unwrap();
        let clone = store.create_retry(&source, None).await.unwrap();

        assert_eq!(clone.url, source.url);
        assert_eq!(clone.status, TaskStatus::Pending);
        assert_eq!(clone.retry_of_task_id.as_deref(), Some(source.id.as_str()));
        assert_eq!(clone.retry_reason, "boom");

        let explicit = store.create_retry(&source, Some("operator request")).await.unwrap();
        assert_eq!(explicit.retry_reason, "operator request");
    }

    #[tokio::test]
    async fn global_lock_is_exclusive_until_it_expires() {
        let (store, _dir) = open_store().await;

        assert!(store.acquire_lock("worker-a", 60).await.unwrap());
        // Re-entrant for the same holder, exclusive for everyone else.
        assert!(store.acquire_lock("worker-a", 60).await.unwrap());
        assert!(!store.acquire_lock("worker-b", 60).await.unwrap());

        store.rewind_global_lock(120).await.unwrap();
        assert!(store.acquire_lock("worker-b", 60).await.unwrap());
        assert_eq!(
            store.read_lock().await.unwrap().worker_id.as_deref(),
            Some("worker-b")
        );
    }

    #[tokio::test]
    async fn refresh_extends_only_the_holders_lease() {
        let (store, _dir) = open_store().await;
        assert!(store.acquire_lock("worker-a", 60).await.unwrap());
        let before = store.read_lock().await.unwrap().locked_at.unwrap();

        store.rewind_global_lock(30).await.unwrap();
        store.refresh_lock("worker-b").await.unwrap();
        let untouched = store.read_lock().await.unwrap().locked_at.unwrap();
        assert!(untouched < before);

        store.refresh_lock("worker-a").await.unwrap();
        let refreshed = store.read_lock().await.unwrap().locked_at.unwrap();
        assert!(refreshed >= before);
    }

    #[tokio::test]
    async fn release_is_scoped_to_the_holder_and_clear_is_not() {
        let (store, _dir) = open_store().await;
        assert!(store.acquire_lock("worker-a", 60).await.unwrap());

        store.release_lock("worker-b").await.unwrap();
        assert!(store.read_lock().await.unwrap().worker_id.is_some());

        store.release_lock("worker-a").await.unwrap();
        assert!(store.read_lock().await.unwrap().worker_id.is_none());

        assert!(store.acquire_lock("worker-c", 60).await.unwrap());
        store.clear_lock().await.unwrap();
        assert_eq!(store.read_lock().await.unwrap(), ProcessingLockInfo::default());
    }

    #[tokio::test]
    async fn counts_group_by_status() {
        let (store, _dir) = open_store().await;
        let a = store.add_task(URL_A).await.unwrap();
        store.add_task(URL_B).await.unwrap();
        store
            .update_status(&a.id, TaskStatus::Failed, StatusUpdate::default())
            .await
            .unwrap();

        let counts = store.counts().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.completed, 0);
    }
}
