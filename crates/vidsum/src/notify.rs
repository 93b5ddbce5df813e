//! Best-effort completion webhook.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Completion notification sink. Failures never propagate to the caller;
/// the return value only reports whether delivery was confirmed.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn notify(&self, title: &str, source_url: &str, extra_links: &[String]) -> bool;
}

/// One-shot JSON webhook POST (Discord-compatible `content` payload).
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
    timeout: Duration,
}

impl WebhookNotifier {
    /// A notifier posting to `webhook_url`; `None` makes every call a no-op.
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.filter(|url| !url.is_empty()),
            timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn build_content(title: &str, source_url: &str, extra_links: &[String]) -> String {
    let mut content = format!("Task completed: {title}\n{source_url}");
    for link in extra_links {
        content.push('\n');
        content.push_str(link);
    }
    content
}

#[async_trait]
impl CompletionNotifier for WebhookNotifier {
    async fn notify(&self, title: &str, source_url: &str, extra_links: &[String]) -> bool {
        let Some(webhook_url) = &self.webhook_url else {
            info!("completion webhook not configured; skipping notification");
            return false;
        };

        let payload = json!({ "content": build_content(title, source_url, extra_links) });
        let response = self
            .client
            .post(webhook_url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                info!("completion notification delivered");
                true
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                warn!(%status, body, "completion webhook rejected notification");
                false
            }
            Err(err) => {
                warn!(%err, "failed to send completion notification");
                false
            }
        }
    }
}
