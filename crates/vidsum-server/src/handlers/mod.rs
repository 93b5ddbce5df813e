//! HTTP handlers, one module per resource.

pub mod history;
pub mod processing_jobs;
pub mod processing_lock;
pub mod stats;
pub mod tasks;

use vidsum_core::DbType;

pub(crate) fn default_db_type() -> DbType {
    DbType::Sqlite
}
