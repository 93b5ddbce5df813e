//! Download stage: audio extraction via the yt-dlp binary.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::info;
use vidsum_core::{DownloadedMedia, Downloader};

/// Runs `yt-dlp` as a subprocess and extracts an mp3 audio track.
pub struct YtDlpDownloader {
    bin: String,
    output_dir: PathBuf,
}

impl YtDlpDownloader {
    pub fn new(bin: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn download(&self, url: &str) -> anyhow::Result<DownloadedMedia> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let template = self.output_dir.join("%(id)s.%(ext)s");

        let output = Command::new(&self.bin)
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("-x")
            .arg("--audio-format")
            .arg("mp3")
            .arg("--print-json")
            .arg("-o")
            .arg(&template)
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.bin))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with {}: {}",
                self.bin,
                output.status,
                stderr.trim()
            );
        }

        // yt-dlp prints one metadata document per line; the last one wins.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let meta_line = stdout
            .lines()
            .rev()
            .find(|line| line.trim_start().starts_with('{'))
            .context("yt-dlp produced no metadata")?;
        let meta: Value = serde_json::from_str(meta_line).context("unparsable yt-dlp metadata")?;

        let title = meta["title"].as_str().map(str::to_string);
        let path = meta["requested_downloads"][0]["filepath"]
            .as_str()
            .map(PathBuf::from)
            .or_else(|| {
                meta["id"]
                    .as_str()
                    .map(|id| self.output_dir.join(format!("{id}.mp3")))
            })
            .context("yt-dlp metadata carries no output path")?;

        info!(url, path = %path.display(), "downloaded media");
        Ok(DownloadedMedia { path, title })
    }
}
