//! Transcription stage: OpenAI-compatible audio transcription endpoint.

use std::path::Path;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use vidsum_core::Transcriber;

pub struct HttpTranscriber {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpTranscriber {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key,
            model: model.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &Path) -> anyhow::Result<String> {
        let bytes = tokio::fs::read(audio)
            .await
            .with_context(|| format!("failed to read audio file {}", audio.display()))?;
        let file_name = audio
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", Part::bytes(bytes).file_name(file_name));

        let mut request = self.client.post(&self.api_url).multipart(form);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("transcription API returned {status}: {body}");
        }

        Ok(response.json::<TranscriptionResponse>().await?.text)
    }

    fn label(&self) -> String {
        self.model.clone()
    }
}
