//! Run the background processing worker once and print its summary.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use vidsum_core::{
    Config, DbType, ProcessingWorker, TaskStore, WebhookNotifier, WorkerOptions,
};
use vidsum_store_notion::{NotionApi, NotionTaskStore};
use vidsum_store_sqlite::SqliteTaskStore;

#[derive(Debug, Parser)]
#[command(name = "worker", about = "Run the background processing worker once.")]
struct Args {
    /// Database backend to drain tasks from (defaults to DB_TYPE).
    #[arg(long, value_enum)]
    db_type: Option<Backend>,

    /// Optional worker identifier for easier lock inspection.
    #[arg(long)]
    worker_id: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Sqlite,
    Notion,
}

impl From<Backend> for DbType {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Sqlite => DbType::Sqlite,
            Backend::Notion => DbType::Notion,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env();
    let db_type = args.db_type.map(DbType::from).unwrap_or(config.db_type);

    let store: Arc<dyn TaskStore> = match db_type {
        DbType::Sqlite => Arc::new(
            SqliteTaskStore::connect(&config.database_path)
                .await
                .context("failed to open task database")?,
        ),
        DbType::Notion => {
            let api_key = config
                .notion_api_key
                .clone()
                .context("NOTION_API_KEY is not configured")?;
            let database_id = config
                .notion_database_id
                .clone()
                .context("NOTION_DATABASE_ID is not configured")?;
            Arc::new(NotionTaskStore::new(NotionApi::new(api_key), database_id))
        }
    };

    let pipeline = vidsum_stages::pipeline_from_env(&config)?;
    let notifier = Arc::new(WebhookNotifier::new(config.webhook_url.clone()));
    let options = WorkerOptions {
        worker_id: args.worker_id,
        task_lease_secs: config.task_lease_secs,
        global_lock_secs: config.global_lock_secs,
        refresh_interval_secs: config.refresh_interval_secs,
        summaries_dir: Some(config.summaries_dir.clone()),
        page_base_url: config.page_base_url.clone(),
    };

    let worker = ProcessingWorker::new(store, pipeline, notifier, options);
    let summary = worker.run().await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
