//! Notion-backed task store.
//!
//! Tasks live as pages in a Notion database with the properties
//! `URL` (url), `Name` (title), `Status` (select), `Summary`,
//! `Error Message`, `Retry Reason`, `Summary Page` (rich text),
//! `Processing Duration` (number) and `Retry Of` (relation).
//!
//! # Degraded guarantees
//!
//! The Notion API has no row-level locking, so [`acquire_next`] degrades to
//! an optimistic select-then-update, and the global processing lock is
//! advisory (every acquire succeeds). This backend therefore assumes a
//! single worker; the HTTP scheduler's in-request lock acquire is the only
//! concurrency guard.
//!
//! [`acquire_next`]: vidsum_core::TaskStore::acquire_next

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::debug;
use vidsum_core::{
    ProcessingLockInfo, QueueCounts, StatusUpdate, StoreError, Task, TaskStatus, TaskStore,
};

const NOTION_API_BASE: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

// Notion caps a single rich_text fragment at 2000 characters.
const RICH_TEXT_CHUNK: usize = 2000;

/// Thin Notion REST client shared by the task store and the summary sink.
#[derive(Clone)]
pub struct NotionApi {
    client: reqwest::Client,
    token: String,
}

impl NotionApi {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
        }
    }

    pub async fn create_page(&self, body: &Value) -> Result<Value, StoreError> {
        self.call(reqwest::Method::POST, "pages", Some(body)).await
    }

    pub async fn retrieve_page(&self, page_id: &str) -> Result<Value, StoreError> {
        self.call(reqwest::Method::GET, &format!("pages/{page_id}"), None)
            .await
    }

    pub async fn update_page(&self, page_id: &str, properties: Value) -> Result<Value, StoreError> {
        self.call(
            reqwest::Method::PATCH,
            &format!("pages/{page_id}"),
            Some(&json!({ "properties": properties })),
        )
        .await
    }

    pub async fn query_database(
        &self,
        database_id: &str,
        filter: Option<&Value>,
        start_cursor: Option<&str>,
    ) -> Result<Value, StoreError> {
        let mut body = json!({});
        if let Some(filter) = filter {
            body["filter"] = filter.clone();
        }
        if let Some(cursor) = start_cursor {
            body["start_cursor"] = json!(cursor);
        }
        self.call(
            reqwest::Method::POST,
            &format!("databases/{database_id}/query"),
            Some(&body),
        )
        .await
    }

    async fn call(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, StoreError> {
        let url = format!("{NOTION_API_BASE}/{path}");
        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(StoreError::Unavailable(format!(
                "notion API returned {status}: {detail}"
            )));
        }
        response
            .json()
            .await
            .map_err(|err| StoreError::InvariantViolation(err.to_string()))
    }
}

/// Task store over a Notion database.
pub struct NotionTaskStore {
    api: NotionApi,
    database_id: String,
}

impl NotionTaskStore {
    pub fn new(api: NotionApi, database_id: impl Into<String>) -> Self {
        Self {
            api,
            database_id: database_id.into(),
        }
    }

    async fn query_all(&self, filter: Option<&Value>) -> Result<Vec<Task>, StoreError> {
        let mut tasks = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .api
                .query_database(&self.database_id, filter, cursor.as_deref())
                .await?;
            for item in page["results"].as_array().into_iter().flatten() {
                tasks.push(page_to_task(item)?);
            }
            if page["has_more"].as_bool() != Some(true) {
                break;
            }
            cursor = page["next_cursor"].as_str().map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }
        Ok(tasks)
    }
}

#[async_trait]
impl TaskStore for NotionTaskStore {
    async fn add_task(&self, url: &str) -> Result<Task, StoreError> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": {
                "URL": { "url": url },
                "Name": { "title": rich_text_chunks(url) },
                "Status": { "select": { "name": TaskStatus::Pending.as_str() } },
            },
        });
        let page = self.api.create_page(&body).await?;
        page_to_task(&page)
    }

    async fn pending_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let filter = json!({
            "property": "Status",
            "select": { "equals": TaskStatus::Pending.as_str() },
        });
        self.query_all(Some(&filter)).await
    }

    async fn all_tasks(&self) -> Result<Vec<Task>, StoreError> {
        self.query_all(None).await
    }

    async fn task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        match self.api.retrieve_page(id).await {
            Ok(page) => Ok(Some(page_to_task(&page)?)),
            Err(StoreError::Unavailable(detail)) if detail.contains("404") => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn update_status(
        &self,
        id: &str,
        status: TaskStatus,
        update: StatusUpdate,
    ) -> Result<(), StoreError> {
        let mut properties = json!({
            "Status": { "select": { "name": status.as_str() } },
        });
        if let Some(title) = update.title.filter(|t| !t.is_empty()) {
            properties["Name"] = json!({ "title": rich_text_chunks(&title) });
        }
        if let Some(summary) = update.summary.filter(|s| !s.is_empty()) {
            properties["Summary"] = json!({ "rich_text": rich_text_chunks(&summary) });
        }
        if let Some(error_message) = update.error_message.filter(|e| !e.is_empty()) {
            properties["Error Message"] = json!({ "rich_text": rich_text_chunks(&error_message) });
        }
        if let Some(duration) = update.processing_duration {
            properties["Processing Duration"] = json!({ "number": duration });
        }
        if let Some(page_id) = update.external_page_id {
            properties["Summary Page"] = json!({ "rich_text": rich_text_chunks(&page_id) });
        }

        self.api.update_page(id, properties).await?;
        Ok(())
    }

    async fn create_retry(
        &self,
        source: &Task,
        reason: Option<&str>,
    ) -> Result<Task, StoreError> {
        let reason = reason
            .map(str::to_string)
            .or_else(|| {
                (!source.error_message.is_empty()).then(|| source.error_message.clone())
            })
            .unwrap_or_else(|| "Manual retry".to_string());
        let name = if source.title.is_empty() {
            source.url.as_str()
        } else {
            source.title.as_str()
        };

        let mut properties = json!({
            "URL": { "url": source.url },
            "Name": { "title": rich_text_chunks(name) },
            "Status": { "select": { "name": TaskStatus::Pending.as_str() } },
            "Retry Reason": { "rich_text": rich_text_chunks(&reason) },
        });
        if !source.id.is_empty() {
            properties["Retry Of"] = json!({ "relation": [{ "id": source.id }] });
        }

        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": properties,
        });
        let page = self.api.create_page(&body).await?;
        page_to_task(&page)
    }

    /// Optimistic claim: pick the first pending page and mark it Processing.
    /// Without compare-and-set on the Notion side this assumes one worker.
    async fn acquire_next(
        &self,
        worker_id: &str,
        _lease_secs: u64,
    ) -> Result<Option<Task>, StoreError> {
        let pending = self.pending_tasks().await?;
        let Some(mut task) = pending.into_iter().next() else {
            return Ok(None);
        };
        debug!(worker_id, task_id = %task.id, "optimistically claiming notion task");
        self.update_status(&task.id, TaskStatus::Processing, StatusUpdate::default())
            .await?;
        task.status = TaskStatus::Processing;
        Ok(Some(task))
    }

    // The global lock is advisory on this backend: acquisition always
    // succeeds and the remaining operations are no-ops.

    async fn acquire_lock(&self, _worker_id: &str, _timeout_secs: u64) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn refresh_lock(&self, _worker_id: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn release_lock(&self, _worker_id: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn read_lock(&self) -> Result<ProcessingLockInfo, StoreError> {
        Ok(ProcessingLockInfo::default())
    }

    async fn clear_lock(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn counts(&self) -> Result<QueueCounts, StoreError> {
        let mut counts = QueueCounts::default();
        for task in self.all_tasks().await? {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Processing => counts.processing += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::FailedRetryCreated => counts.failed_retry_created += 1,
            }
        }
        Ok(counts)
    }
}

/// Split text into rich-text fragments within Notion's per-fragment cap.
pub fn rich_text_chunks(text: &str) -> Value {
    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let mut end = rest.len().min(RICH_TEXT_CHUNK);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        let (head, tail) = rest.split_at(end);
        chunks.push(json!({ "type": "text", "text": { "content": head } }));
        rest = tail;
    }
    if chunks.is_empty() {
        chunks.push(json!({ "type": "text", "text": { "content": "" } }));
    }
    Value::Array(chunks)
}

fn page_to_task(page: &Value) -> Result<Task, StoreError> {
    let id = page["id"]
        .as_str()
        .ok_or_else(|| StoreError::InvariantViolation("notion page without id".into()))?
        .to_string();
    let props = &page["properties"];

    let status_raw = props["Status"]["select"]["name"]
        .as_str()
        .unwrap_or(TaskStatus::Pending.as_str());
    let status: TaskStatus = status_raw.parse().map_err(|_| {
        StoreError::InvariantViolation(format!("unknown task status {status_raw:?}"))
    })?;

    Ok(Task {
        id,
        url: props["URL"]["url"].as_str().unwrap_or_default().to_string(),
        status,
        title: plain_text(&props["Name"]["title"]),
        summary: plain_text(&props["Summary"]["rich_text"]),
        error_message: plain_text(&props["Error Message"]["rich_text"]),
        created_at: parse_time(&page["created_time"]),
        updated_at: parse_time(&page["last_edited_time"]),
        processing_duration: props["Processing Duration"]["number"].as_f64(),
        locked_at: None,
        worker_id: None,
        retry_of_task_id: props["Retry Of"]["relation"][0]["id"]
            .as_str()
            .map(str::to_string),
        retry_reason: plain_text(&props["Retry Reason"]["rich_text"]),
        external_page_id: {
            let raw = plain_text(&props["Summary Page"]["rich_text"]);
            (!raw.is_empty()).then_some(raw)
        },
    })
}

fn plain_text(fragments: &Value) -> String {
    fragments
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    item["plain_text"]
                        .as_str()
                        .or_else(|| item["text"]["content"].as_str())
                        .unwrap_or_default()
                })
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
