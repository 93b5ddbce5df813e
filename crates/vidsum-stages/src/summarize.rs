//! Summarization stage: Anthropic messages API.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vidsum_core::Summarizer;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

pub struct LlmSummarizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl LlmSummarizer {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, title: &str, transcript: &str) -> Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user".to_string(),
                content: format!(
                    "Summarize this video transcript in a few short paragraphs.\n\
                     Title: {title}\n\nTranscript:\n{transcript}"
                ),
            }],
        };

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            bail!("summarization API error {status}: {body}");
        }

        let parsed: MessagesResponse = response.json().await?;
        let summary = parsed
            .content
            .first()
            .and_then(|block| block.text.clone())
            .unwrap_or_default();
        if summary.is_empty() {
            bail!("summarization API returned no text content");
        }
        Ok(summary)
    }

    fn label(&self) -> String {
        self.model.clone()
    }
}
