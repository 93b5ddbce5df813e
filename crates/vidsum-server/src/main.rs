//! vidsum-server - standalone control plane for the task queue.
//!
//! Reads config from env vars (see `vidsum_core::Config`):
//!   TASKS_DB_PATH                    - SQLite database file (default: data/tasks.db)
//!   BIND_ADDR                        - listen address (default: 0.0.0.0:8080)
//!   PROCESSING_LOCK_ADMIN_TOKEN      - required for the /processing-lock endpoints
//!   TASK_LOCK_TIMEOUT_SECONDS        - per-row lease (default: 900)
//!   PROCESSING_LOCK_TIMEOUT_SECONDS  - global lease (default: 1800)
//!   PROCESSING_LOCK_REFRESH_INTERVAL - lease refresh cadence (default: 30)

use std::sync::Arc;

use tokio::net::TcpListener;
use vidsum_core::{Config, RecentViewStore, WebhookNotifier};
use vidsum_server::router::build_router;
use vidsum_server::state::{AppState, EnvStoreProvider, Settings};
use vidsum_store_sqlite::SqliteTaskStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vidsum_server=debug".into()),
        )
        .init();

    let config = Config::from_env();

    let sqlite = SqliteTaskStore::connect(&config.database_path)
        .await
        .expect("failed to open task database");
    tracing::info!(path = %config.database_path.display(), "opened task database");

    let pipeline = vidsum_stages::pipeline_from_env(&config)
        .expect("failed to assemble the processing pipeline");
    let notifier = Arc::new(WebhookNotifier::new(config.webhook_url.clone()));
    let history = Arc::new(RecentViewStore::new(config.recent_views_path.clone()));

    let state = AppState {
        stores: Arc::new(EnvStoreProvider::new(Arc::new(sqlite), &config)),
        pipeline,
        notifier,
        history,
        settings: Arc::new(Settings::from_config(&config)),
    };

    let app = build_router(state);
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind listen address");
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await.expect("server error");
}
