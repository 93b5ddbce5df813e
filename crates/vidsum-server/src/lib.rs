//! HTTP control plane for the vidsum task queue.
//!
//! Endpoints schedule and observe the task lifecycle engine: task creation
//! and retry, explicit drain requests, maintainer lock recovery, and the
//! small UI surfaces (task listing, queue stats, recent views). Workers are
//! spawned as background tasks that outlive the HTTP response; all
//! coordination happens through the store's locks.

pub mod error;
pub mod handlers;
pub mod router;
pub mod schedule;
pub mod state;
