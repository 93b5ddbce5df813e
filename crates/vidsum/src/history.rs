//! Recent-view history: small per-client breadcrumb store for the UI.
//!
//! Entries are unique by task id (most-recent-wins) and pruned once older
//! than the TTL. Persisted as a single JSON document keyed by client id.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

pub const RECENT_VIEW_TTL_DAYS: i64 = 30;

/// One breadcrumb: a task the client recently looked at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentView {
    pub id: String,
    pub title: String,
    pub url: String,
    pub page_url: Option<String>,
    pub viewed_at: DateTime<Utc>,
}

pub struct RecentViewStore {
    path: PathBuf,
    ttl: Duration,
    // serializes read-modify-write cycles on the backing file
    guard: Mutex<()>,
}

impl RecentViewStore {
    pub fn new(path: PathBuf) -> Self {
        Self::with_ttl_days(path, RECENT_VIEW_TTL_DAYS)
    }

    pub fn with_ttl_days(path: PathBuf, ttl_days: i64) -> Self {
        Self {
            path,
            ttl: Duration::days(ttl_days),
            guard: Mutex::new(()),
        }
    }

    /// Pruned history for one client, most recent first.
    pub async fn recent(&self, client_id: &str) -> Vec<RecentView> {
        let _guard = self.guard.lock().await;
        let store = self.load().await;
        let cutoff = Utc::now() - self.ttl;
        store
            .get(client_id)
            .map(|entries| prune(entries.clone(), cutoff))
            .unwrap_or_default()
    }

    /// Record a view, replacing any earlier entry for the same task.
    pub async fn record(&self, client_id: &str, view: RecentView) -> io::Result<()> {
        let _guard = self.guard.lock().await;
        let mut store = self.load().await;
        let cutoff = Utc::now() - self.ttl;
        let entries = store.entry(client_id.to_string()).or_default();
        entries.retain(|entry| entry.id != view.id);
        entries.insert(0, view);
        *entries = prune(std::mem::take(entries), cutoff);
        self.save(&store).await
    }

    async fn load(&self) -> BTreeMap<String, Vec<RecentView>> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|err| {
                warn!(path = %self.path.display(), %err, "recent-view store unreadable; starting fresh");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        }
    }

    async fn save(&self, store: &BTreeMap<String, Vec<RecentView>>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec_pretty(store).map_err(io::Error::other)?;
        tokio::fs::write(&self.path, raw).await
    }
}

fn prune(entries: Vec<RecentView>, cutoff: DateTime<Utc>) -> Vec<RecentView> {
    entries
        .into_iter()
        .filter(|entry| entry.viewed_at >= cutoff)
        .collect()
}
