//! Concrete pipeline stage adapters.
//!
//! The engine treats stages as opaque; everything in this crate is
//! replaceable per deployment. Each adapter is configured explicitly and
//! can also be assembled from the environment via [`pipeline_from_env`].

mod download;
mod persist;
mod summarize;
mod transcribe;

use std::sync::Arc;

use anyhow::Context;
use vidsum_core::{Config, Pipeline};
use vidsum_store_notion::NotionApi;

pub use download::YtDlpDownloader;
pub use persist::NotionSummarySink;
pub use summarize::LlmSummarizer;
pub use transcribe::HttpTranscriber;

/// Assemble the production pipeline from environment configuration.
///
/// Required: `TRANSCRIBE_API_URL`, `ANTHROPIC_API_KEY`, and the Notion
/// credentials carried by `config`. Optional: `YTDLP_BIN` (default
/// `yt-dlp`), `TRANSCRIBE_API_KEY`, `TRANSCRIBE_MODEL` (default
/// `whisper-1`), `SUMMARY_MODEL` (default `claude-3-5-sonnet-20241022`).
pub fn pipeline_from_env(config: &Config) -> anyhow::Result<Pipeline> {
    let ytdlp_bin =
        std::env::var("YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_string());
    let transcribe_url = std::env::var("TRANSCRIBE_API_URL")
        .context("TRANSCRIBE_API_URL is not configured")?;
    let transcribe_key = std::env::var("TRANSCRIBE_API_KEY").ok();
    let transcribe_model =
        std::env::var("TRANSCRIBE_MODEL").unwrap_or_else(|_| "whisper-1".to_string());
    let anthropic_key =
        std::env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY is not configured")?;
    let summary_model = std::env::var("SUMMARY_MODEL")
        .unwrap_or_else(|_| "claude-3-5-sonnet-20241022".to_string());

    let notion_api_key = config
        .notion_api_key
        .clone()
        .context("NOTION_API_KEY is not configured")?;
    let notion_database_id = config
        .notion_database_id
        .clone()
        .context("NOTION_DATABASE_ID is not configured")?;

    Ok(Pipeline {
        downloader: Arc::new(YtDlpDownloader::new(
            ytdlp_bin,
            config.data_dir.join("videos"),
        )),
        transcriber: Arc::new(HttpTranscriber::new(
            transcribe_url,
            transcribe_key,
            transcribe_model,
        )),
        summarizer: Arc::new(LlmSummarizer::new(anthropic_key, summary_model)),
        sink: Arc::new(NotionSummarySink::new(
            NotionApi::new(notion_api_key),
            notion_database_id,
        )),
    })
}
