//! Persist stage: summary pages in a Notion database.

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use vidsum_core::SummarySink;
use vidsum_store_notion::{rich_text_chunks, NotionApi};

/// Creates one Notion page per finished summary and returns its id.
pub struct NotionSummarySink {
    api: NotionApi,
    database_id: String,
}

impl NotionSummarySink {
    pub fn new(api: NotionApi, database_id: impl Into<String>) -> Self {
        Self {
            api,
            database_id: database_id.into(),
        }
    }
}

#[async_trait]
impl SummarySink for NotionSummarySink {
    async fn persist(
        &self,
        title: &str,
        text: &str,
        model: &str,
        source_url: &str,
    ) -> anyhow::Result<Option<String>> {
        let children: Vec<_> = rich_text_chunks(text)
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|fragment| {
                json!({
                    "object": "block",
                    "type": "paragraph",
                    "paragraph": { "rich_text": [fragment] },
                })
            })
            .collect();

        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": {
                "Name": { "title": rich_text_chunks(title) },
                "URL": { "url": source_url },
                "Model": { "rich_text": rich_text_chunks(model) },
            },
            "children": children,
        });

        let page = self.api.create_page(&body).await?;
        let page_id = page["id"]
            .as_str()
            .context("notion page response without id")?
            .to_string();
        info!(title, page_id, "persisted summary page");
        Ok(Some(page_id))
    }
}
