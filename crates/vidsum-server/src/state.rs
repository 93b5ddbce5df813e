//! Shared server state: store provider, pipeline, notifier, settings.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use vidsum_core::{
    CompletionNotifier, Config, DbType, Pipeline, RecentViewStore, TaskStore,
};
use vidsum_store_notion::{NotionApi, NotionTaskStore};

use crate::error::ApiError;

/// Failure to hand out a store for the requested backend.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{0}")]
    ConfigMissing(String),
    #[error("{0}")]
    Unavailable(String),
}

/// Pure mapping from a backend selector to a store instance.
///
/// Passed explicitly to every handler and worker; there is no global
/// factory.
pub trait StoreProvider: Send + Sync {
    fn store(&self, db_type: DbType) -> Result<Arc<dyn TaskStore>, ProviderError>;
}

/// Provider wired from environment configuration: SQLite is always
/// available, Notion only when its credentials are present.
pub struct EnvStoreProvider {
    sqlite: Arc<dyn TaskStore>,
    notion: OnceLock<Arc<dyn TaskStore>>,
    notion_api_key: Option<String>,
    notion_database_id: Option<String>,
}

impl EnvStoreProvider {
    pub fn new(sqlite: Arc<dyn TaskStore>, config: &Config) -> Self {
        Self {
            sqlite,
            notion: OnceLock::new(),
            notion_api_key: config.notion_api_key.clone(),
            notion_database_id: config.notion_database_id.clone(),
        }
    }
}

impl StoreProvider for EnvStoreProvider {
    fn store(&self, db_type: DbType) -> Result<Arc<dyn TaskStore>, ProviderError> {
        match db_type {
            DbType::Sqlite => Ok(Arc::clone(&self.sqlite)),
            DbType::Notion => {
                let mut missing = Vec::new();
                if self.notion_api_key.is_none() {
                    missing.push("NOTION_API_KEY");
                }
                if self.notion_database_id.is_none() {
                    missing.push("NOTION_DATABASE_ID");
                }
                if !missing.is_empty() {
                    return Err(ProviderError::ConfigMissing(missing.join(", ")));
                }

                let store = self.notion.get_or_init(|| {
                    let api = NotionApi::new(self.notion_api_key.clone().unwrap_or_default());
                    let database_id = self.notion_database_id.clone().unwrap_or_default();
                    let store: Arc<dyn TaskStore> =
                        Arc::new(NotionTaskStore::new(api, database_id));
                    store
                });
                Ok(Arc::clone(store))
            }
        }
    }
}

/// Server-wide knobs shared with scheduled workers.
#[derive(Debug, Clone)]
pub struct Settings {
    pub task_lease_secs: u64,
    pub global_lock_secs: u64,
    pub refresh_interval_secs: u64,
    pub admin_token: Option<String>,
    pub summaries_dir: Option<PathBuf>,
    pub page_base_url: Option<String>,
}

impl Settings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            task_lease_secs: config.task_lease_secs,
            global_lock_secs: config.global_lock_secs,
            refresh_interval_secs: config.refresh_interval_secs,
            admin_token: config.admin_token.clone(),
            summaries_dir: Some(config.summaries_dir.clone()),
            page_base_url: config.page_base_url.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub stores: Arc<dyn StoreProvider>,
    pub pipeline: Pipeline,
    pub notifier: Arc<dyn CompletionNotifier>,
    pub history: Arc<RecentViewStore>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn store(&self, db_type: DbType) -> Result<Arc<dyn TaskStore>, ApiError> {
        self.stores.store(db_type).map_err(Into::into)
    }
}
