//! Small shared helpers: filename handling and bounded HTTP fetches

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::{Error, Result};
use crate::types::LocalFile;

/// Maximum length of a sanitized filename stem
const MAX_FILENAME_LEN: usize = 120;

/// Sanitize a string for use as a filename stem.
///
/// Keeps alphanumerics, spaces, hyphens, underscores, and dots; everything
/// else is dropped. The result is trimmed and length-bounded, with a
/// fallback for inputs that sanitize to nothing.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        return "media".to_string();
    }
    trimmed.chars().take(MAX_FILENAME_LEN).collect()
}

/// Derive a filename from the last path segment of a URL.
///
/// Query strings and fragments are ignored; percent-encoding is decoded.
/// Falls back to `fallback` when the URL has no usable segment.
pub fn filename_from_url(url: &str, fallback: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|s| s.filter(|p| !p.is_empty()).last().map(str::to_string))
        })
        .and_then(|s| urlencoding::decode(&s).ok().map(|d| d.into_owned()));
    match segment {
        Some(name) => {
            let cleaned = sanitize_filename(&name);
            // A segment that sanitized away entirely is no better than the
            // caller's fallback.
            if cleaned == "media" && name != "media" {
                fallback.to_string()
            } else {
                cleaned
            }
        }
        None => fallback.to_string(),
    }
}

/// Fetch a URL to a local file, bounded by `timeout` and `max_bytes`.
///
/// Streams the body to disk chunk by chunk and aborts as soon as the byte
/// count crosses `max_bytes`, so an oversized response never costs its full
/// bandwidth or buffers in memory. On any failure the partial file is
/// removed. Non-success statuses surface as HTTP errors so [`Error::kind`]
/// can classify them.
pub async fn fetch_to_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    timeout: Duration,
    max_bytes: u64,
) -> Result<LocalFile> {
    let fetch = async {
        let mut response = client.get(url).send().await?.error_for_status()?;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            written += chunk.len() as u64;
            if written > max_bytes {
                return Err(Error::TooLarge {
                    size: None,
                    limit: max_bytes,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    };

    let result = tokio::time::timeout(timeout, fetch)
        .await
        .map_err(|_| Error::RateLimitedOrTimeout(format!("fetch of {url} timed out")))
        .and_then(|r| r);
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(dest).await;
        return Err(e);
    }

    LocalFile::from_path(dest.to_path_buf())
}
