//! # Vidsum
//!
//! Task lifecycle and dispatch engine for a video summarization queue:
//! user-submitted video URLs are persisted as tasks, and a lock-guarded
//! worker drains the queue through a staged pipeline
//! (download → transcribe → summarize → persist).
//!
//! ## Architecture
//!
//! ```text
//! HTTP control plane
//!     │
//!     ▼ add_task()
//! TaskStore ◄──────────────────────────────┐
//!     │                                    │
//!     ▼ acquire_lock() / acquire_next()    │ update_status()
//! ProcessingWorker loop                    │
//!     │                                    │
//!     ├─► Downloader ──► Transcriber ──► Summarizer ──► SummarySink
//!     │                                    │
//!     └─► lease refresher (cooperative)    ▼
//!                                   CompletionNotifier (best effort)
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Claims are atomic** - a row moves Pending → Processing under exactly
//!    one worker; contenders observe nothing or a later-ordered task
//! 2. **Processing implies a lease** - `worker_id` and `locked_at` are set
//!    iff the row is Processing; every other status clears both
//! 3. **One drainer at a time** - the singleton processing lock admits a
//!    single worker loop per store; stalled holders expire by lease age
//! 4. **Stage failures stay on the row** - a failed stage marks the task
//!    Failed and the loop moves on; nothing wedges the queue
//! 5. **Terminal state before side effects** - Completed/Failed is committed
//!    before the completion webhook fires
//!
//! Coordination lives entirely in the store; workers share no in-process
//! state. Backends without row locking degrade to optimistic claims under a
//! single-worker assumption.

mod config;
mod history;
mod notify;
mod stage;
mod store;
mod task;
mod worker;

pub mod util;

// Re-export configuration types
pub use config::{Config, DbType};

// Re-export recent-view history store
pub use history::{RecentView, RecentViewStore, RECENT_VIEW_TTL_DAYS};

// Re-export notifier types
pub use notify::{CompletionNotifier, WebhookNotifier, DEFAULT_NOTIFY_TIMEOUT};

// Re-export stage seams
pub use stage::{DownloadedMedia, Downloader, Pipeline, Summarizer, SummarySink, Transcriber};

// Re-export store trait and errors
pub use store::{StatusUpdate, StoreError, TaskStore};

// Re-export task model
pub use task::{ProcessingLockInfo, QueueCounts, Task, TaskStatus, UnknownStatus};

// Re-export worker types
pub use worker::{
    ProcessingWorker, RunSummary, WorkerOptions, DEFAULT_GLOBAL_LOCK_SECS,
    DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_TASK_LEASE_SECS,
};

// Re-export commonly used external types
pub use async_trait::async_trait;
