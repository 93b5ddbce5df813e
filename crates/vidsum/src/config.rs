//! Environment-driven configuration.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Store backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    Sqlite,
    Notion,
}

impl DbType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DbType::Sqlite => "sqlite",
            DbType::Notion => "notion",
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DbType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DbType::Sqlite),
            "notion" => Ok(DbType::Notion),
            other => Err(format!("db_type must be either 'sqlite' or 'notion', got {other:?}")),
        }
    }
}

/// Runtime configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default backend for the worker CLI (`DB_TYPE`).
    pub db_type: DbType,
    /// SQLite database file (`TASKS_DB_PATH`).
    pub database_path: PathBuf,
    /// Per-row claim lease in seconds (`TASK_LOCK_TIMEOUT_SECONDS`).
    pub task_lease_secs: u64,
    /// Global processing lease in seconds (`PROCESSING_LOCK_TIMEOUT_SECONDS`).
    pub global_lock_secs: u64,
    /// Lease refresh cadence in seconds (`PROCESSING_LOCK_REFRESH_INTERVAL`).
    pub refresh_interval_secs: u64,
    /// Token gating the /processing-lock endpoints (`PROCESSING_LOCK_ADMIN_TOKEN`).
    pub admin_token: Option<String>,
    /// Completion webhook target (`COMPLETION_WEBHOOK_URL`).
    pub webhook_url: Option<String>,
    /// Base URL for links to persisted summary pages (`PAGE_BASE_URL`).
    pub page_base_url: Option<String>,
    /// Directory for downloaded media (`DATA_DIR`).
    pub data_dir: PathBuf,
    /// Directory for summary markdown output (`SUMMARIES_DIR`).
    pub summaries_dir: PathBuf,
    /// Recent-view history document (`RECENT_VIEWS_PATH`).
    pub recent_views_path: PathBuf,
    /// HTTP bind address (`BIND_ADDR`).
    pub bind_addr: String,
    /// Notion credentials (`NOTION_API_KEY` / `NOTION_DATABASE_ID`).
    pub notion_api_key: Option<String>,
    pub notion_database_id: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(env_or("DATA_DIR", "data"));
        Self {
            db_type: env::var("DB_TYPE")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DbType::Sqlite),
            database_path: env::var("TASKS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("tasks.db")),
            task_lease_secs: env_u64("TASK_LOCK_TIMEOUT_SECONDS", 900),
            global_lock_secs: env_u64("PROCESSING_LOCK_TIMEOUT_SECONDS", 1800),
            refresh_interval_secs: env_u64("PROCESSING_LOCK_REFRESH_INTERVAL", 30),
            admin_token: env_nonempty("PROCESSING_LOCK_ADMIN_TOKEN"),
            webhook_url: env_nonempty("COMPLETION_WEBHOOK_URL"),
            page_base_url: env_nonempty("PAGE_BASE_URL"),
            summaries_dir: env::var("SUMMARIES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("summaries")),
            recent_views_path: env::var("RECENT_VIEWS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("recent_views.json")),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            notion_api_key: env_nonempty("NOTION_API_KEY"),
            notion_database_id: env_nonempty("NOTION_DATABASE_ID"),
            data_dir,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_type_parses_case_insensitively() {
        assert_eq!("SQLite".parse::<DbType>().unwrap(), DbType::Sqlite);
        assert_eq!("notion".parse::<DbType>().unwrap(), DbType::Notion);
        assert!("postgres".parse::<DbType>().is_err());
    }

    #[test]
    fn db_type_wire_form_is_lowercase() {
        assert_eq!(serde_json::to_string(&DbType::Sqlite).unwrap(), "\"sqlite\"");
        let parsed: DbType = serde_json::from_str("\"notion\"").unwrap();
        assert_eq!(parsed, DbType::Notion);
    }
}
