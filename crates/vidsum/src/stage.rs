//! Seams for the four opaque pipeline stages.
//!
//! The engine invokes these behind trait objects and never looks inside;
//! adapters do IO and may fail with any `anyhow` error, which the worker
//! records on the task row as a stage failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

/// Result of the download stage.
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    /// Local path of the fetched audio/video file.
    pub path: PathBuf,
    /// Title resolved from the source, when the backend provides one.
    pub title: Option<String>,
}

#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str) -> anyhow::Result<DownloadedMedia>;
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> anyhow::Result<String>;

    /// Short model tag used in the composed model label.
    fn label(&self) -> String;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, title: &str, transcript: &str) -> anyhow::Result<String>;

    /// Short model tag used in the composed model label.
    fn label(&self) -> String;
}

/// Terminal stage: persist the finished summary to an external page/record
/// store, returning its identifier when one is created.
#[async_trait]
pub trait SummarySink: Send + Sync {
    async fn persist(
        &self,
        title: &str,
        text: &str,
        model: &str,
        source_url: &str,
    ) -> anyhow::Result<Option<String>>;
}

/// The four stages bundled for a worker run.
#[derive(Clone)]
pub struct Pipeline {
    pub downloader: Arc<dyn Downloader>,
    pub transcriber: Arc<dyn Transcriber>,
    pub summarizer: Arc<dyn Summarizer>,
    pub sink: Arc<dyn SummarySink>,
}

impl Pipeline {
    /// Combined model tag recorded with each persisted summary,
    /// e.g. `whisper-1+claude-3-5-sonnet`.
    pub fn model_label(&self) -> String {
        format!("{}+{}", self.transcriber.label(), self.summarizer.label())
    }
}
