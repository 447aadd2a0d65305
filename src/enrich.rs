//! Best-effort metadata enrichment for staged audio files
//!
//! Embeds title, artist, album, year, and cover artwork into a staged track
//! via an external ffmpeg binary. Enrichment never fails a retrieval: every
//! error is logged and swallowed, and the staged file is left as-is.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ToolsConfig;
use crate::error::{Error, Result, truncate_detail};
use crate::utils;

/// Tag values to embed into an audio file
#[derive(Debug, Clone, Default)]
pub struct TrackTags {
    /// Track title
    pub title: String,
    /// Artist name
    pub artist: String,
    /// Album title
    pub album: Option<String>,
    /// Release year
    pub year: Option<u16>,
    /// Cover artwork URL to fetch and embed
    pub artwork_url: Option<String>,
}

/// Tag writer backed by an external ffmpeg binary
#[derive(Debug, Clone)]
pub struct Enricher {
    client: reqwest::Client,
    tools: ToolsConfig,
    request_timeout: Duration,
    max_artwork_bytes: u64,
}

impl Enricher {
    /// Create an enricher sharing the library's HTTP client.
    pub fn new(
        client: reqwest::Client,
        tools: ToolsConfig,
        request_timeout: Duration,
        max_artwork_bytes: u64,
    ) -> Enricher {
        Enricher {
            client,
            tools,
            request_timeout,
            max_artwork_bytes,
        }
    }

    /// Embed tags into `file`, best-effort.
    ///
    /// A missing ffmpeg binary, an unreachable artwork URL, or an ffmpeg
    /// failure leaves the file untouched and only produces a warning.
    pub async fn enrich(&self, file: &Path, tags: &TrackTags) {
        if let Err(e) = self.try_enrich(file, tags).await {
            warn!(file = %file.display(), error = %e, "metadata enrichment skipped");
        }
    }

    fn locate_ffmpeg(&self) -> Result<PathBuf> {
        if let Some(path) = &self.tools.ffmpeg_path {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(Error::ToolMissing(format!(
                "ffmpeg not found at configured path {}",
                path.display()
            )));
        }
        if self.tools.search_path {
            return which::which("ffmpeg")
                .map_err(|_| Error::ToolMissing("ffmpeg not found in PATH".to_string()));
        }
        Err(Error::ToolMissing(
            "ffmpeg has no configured path and PATH search is disabled".to_string(),
        ))
    }

    async fn try_enrich(&self, file: &Path, tags: &TrackTags) -> Result<()> {
        let ffmpeg = self.locate_ffmpeg()?;
        let parent = file
            .parent()
            .ok_or_else(|| Error::Internal("staged file has no parent directory".to_string()))?;

        let artwork = match &tags.artwork_url {
            Some(url) => {
                let dest = parent.join("cover.jpg");
                match utils::fetch_to_file(
                    &self.client,
                    url,
                    &dest,
                    self.request_timeout,
                    self.max_artwork_bytes,
                )
                .await
                {
                    Ok(_) => Some(dest),
                    Err(e) => {
                        warn!(url = %url, error = %e, "artwork fetch failed, tagging without cover");
                        None
                    }
                }
            }
            None => None,
        };

        let tagged = parent.join("tagged.mp3");
        let result = self
            .run_ffmpeg(&ffmpeg, file, artwork.as_deref(), &tagged, tags)
            .await;

        if let Some(art) = &artwork {
            let _ = std::fs::remove_file(art);
        }

        match result {
            Ok(()) => {
                std::fs::rename(&tagged, file)?;
                debug!(file = %file.display(), "metadata embedded");
                Ok(())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&tagged);
                Err(e)
            }
        }
    }

    async fn run_ffmpeg(
        &self,
        ffmpeg: &Path,
        input: &Path,
        artwork: Option<&Path>,
        output: &Path,
        tags: &TrackTags,
    ) -> Result<()> {
        let mut command = Command::new(ffmpeg);
        command.arg("-y").arg("-i").arg(input);
        if let Some(art) = artwork {
            command
                .arg("-i")
                .arg(art)
                .arg("-map")
                .arg("0:a")
                .arg("-map")
                .arg("1")
                .arg("-disposition:v")
                .arg("attached_pic");
        }
        command
            .arg("-c")
            .arg("copy")
            .arg("-metadata")
            .arg(format!("title={}", tags.title))
            .arg("-metadata")
            .arg(format!("artist={}", tags.artist));
        if let Some(album) = &tags.album {
            command.arg("-metadata").arg(format!("album={album}"));
        }
        if let Some(year) = tags.year {
            command.arg("-metadata").arg(format!("date={year}"));
        }
        command
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.tools.tool_timeout, command.output())
            .await
            .map_err(|_| Error::RateLimitedOrTimeout("ffmpeg exceeded its deadline".to_string()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Internal(format!(
                "ffmpeg failed: {}",
                truncate_detail(&stderr)
            )));
        }
        Ok(())
    }
}
