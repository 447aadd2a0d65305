//! Reddit post strategy
//!
//! Retrieves media by reading a post's public JSON document. Handles
//! reddit-hosted video, galleries, and direct images; posts linking
//! externally are declined so the chain can fall through to yt-dlp.
//! Short links (`redd.it`) and share links (`/r/<sub>/s/<token>`) are
//! expanded with a single bounded redirect hop before the JSON fetch.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classify::PlatformTag;
use crate::error::{Error, Result};
use crate::staging::ArtifactStore;
use crate::strategy::Strategy;
use crate::types::{LocalFile, MediaReference, Retrieved};
use crate::utils;

/// Reddit post-JSON strategy
pub struct RedditStrategy {
    client: reqwest::Client,
    /// Redirect-free client used only to expand short and share links
    probe: reqwest::Client,
    api_base: Option<String>,
    request_timeout: Duration,
    store: ArtifactStore,
    max_file_size: u64,
}

/// Rewrite mirror hosts onto the canonical `www.reddit.com` host and strip
/// query and fragment, which carry tracking parameters that break the
/// `.json` fetch.
fn normalize_post_url(raw: &str) -> Result<url::Url> {
    let mut parsed = url::Url::parse(raw)
        .map_err(|e| Error::InvalidReference(format!("bad reddit URL {raw}: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::InvalidReference(format!("reddit URL {raw} has no host")))?
        .to_ascii_lowercase();
    if !host.ends_with("reddit.com") && host != "redd.it" {
        return Err(Error::InvalidReference(format!("not a reddit host: {host}")));
    }
    if host.ends_with("reddit.com") && host != "www.reddit.com" {
        parsed
            .set_host(Some("www.reddit.com"))
            .map_err(|e| Error::InvalidReference(format!("cannot rewrite host: {e}")))?;
    }
    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed)
}

/// True for URLs that are one redirect away from the canonical post URL.
fn needs_expansion(url: &url::Url) -> bool {
    match url.host_str() {
        Some("redd.it") => true,
        _ => url.path().contains("/s/"),
    }
}

fn unescape_html(url: &str) -> String {
    url.replace("&amp;", "&")
}

/// Pick the highest-resolution rendition of one gallery item, comparing
/// width by height across the source (`s`) and preview (`p`) entries.
/// The source is considered first, so it wins ties.
fn best_rendition(meta: &Value) -> Option<String> {
    let mut candidates: Vec<&Value> = Vec::new();
    if let Some(source) = meta.get("s") {
        candidates.push(source);
    }
    if let Some(previews) = meta.get("p").and_then(|v| v.as_array()) {
        candidates.extend(previews.iter());
    }

    let mut best: Option<(u64, &str)> = None;
    for entry in candidates {
        let Some(rendition_url) = entry
            .get("u")
            .or_else(|| entry.get("gif"))
            .and_then(|v| v.as_str())
        else {
            continue;
        };
        let width = entry.get("x").and_then(|v| v.as_u64()).unwrap_or(0);
        let height = entry.get("y").and_then(|v| v.as_u64()).unwrap_or(0);
        let area = width.saturating_mul(height);
        if best.as_ref().is_none_or(|(best_area, _)| area > *best_area) {
            best = Some((area, rendition_url));
        }
    }
    best.map(|(_, rendition_url)| unescape_html(rendition_url))
}

impl RedditStrategy {
    /// Create the strategy.
    ///
    /// `probe` must be built with redirects disabled; `api_base` rebases all
    /// reddit requests onto an alternate host.
    pub fn new(
        client: reqwest::Client,
        probe: reqwest::Client,
        api_base: Option<String>,
        request_timeout: Duration,
        store: ArtifactStore,
        max_file_size: u64,
    ) -> RedditStrategy {
        RedditStrategy {
            client,
            probe,
            api_base,
            request_timeout,
            store,
            max_file_size,
        }
    }

    /// Rebase a reddit URL onto the configured API host, when one is set.
    fn rebase(&self, url: &url::Url) -> String {
        match &self.api_base {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), url.path()),
            None => {
                let mut s = url.to_string();
                while s.ends_with('/') {
                    s.pop();
                }
                s
            }
        }
    }

    /// Expand a short or share link by following one redirect hop.
    async fn expand(&self, url: &url::Url) -> Result<url::Url> {
        let target = self.rebase(url);
        let response = tokio::time::timeout(self.request_timeout, self.probe.get(&target).send())
            .await
            .map_err(|_| Error::RateLimitedOrTimeout(format!("expansion of {target} timed out")))??;
        if !response.status().is_redirection() {
            return Err(Error::ContentUnavailable(format!(
                "short link {url} did not redirect (status {})",
                response.status()
            )));
        }
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                Error::ContentUnavailable(format!("short link {url} redirect lacks a location"))
            })?;
        debug!(from = %url, to = location, "expanded reddit link");
        normalize_post_url(location)
    }

    async fn fetch_post(&self, url: &url::Url) -> Result<Value> {
        let json_url = format!("{}.json", self.rebase(url).trim_end_matches('/'));
        let response = tokio::time::timeout(self.request_timeout, self.client.get(&json_url).send())
            .await
            .map_err(|_| Error::RateLimitedOrTimeout(format!("fetch of {json_url} timed out")))??
            .error_for_status()?;
        let listing: Value = response.json().await?;
        listing
            .pointer("/0/data/children/0/data")
            .cloned()
            .ok_or_else(|| {
                Error::ContentUnavailable(format!("post document at {json_url} has no post data"))
            })
    }

    async fn stage_video(&self, post: &Value, video_url: &str, dir: &Path) -> Result<Vec<LocalFile>> {
        // DASH fallback URLs carry a query the CDN rejects on plain GETs.
        let clean = video_url.split('?').next().unwrap_or(video_url);
        let name = utils::filename_from_url(clean, "video.mp4");
        let file = utils::fetch_to_file(
            &self.client,
            clean,
            &dir.join(name),
            self.request_timeout,
            self.max_file_size,
        )
        .await?;
        debug!(post = %post_id(post), size = file.size_bytes, "staged reddit video");
        Ok(vec![file])
    }

    async fn stage_gallery(&self, post: &Value, dir: &Path) -> Result<Vec<LocalFile>> {
        let items = post
            .pointer("/gallery_data/items")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                Error::ContentUnavailable("gallery post has no gallery_data".to_string())
            })?;
        let metadata = post
            .get("media_metadata")
            .and_then(|v| v.as_object())
            .ok_or_else(|| {
                Error::ContentUnavailable("gallery post has no media_metadata".to_string())
            })?;

        let mut files = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let Some(media_id) = item.get("media_id").and_then(|v| v.as_str()) else {
                warn!(index, "gallery item lacks a media id, skipping");
                continue;
            };
            let source = metadata.get(media_id).and_then(best_rendition);
            let Some(source) = source else {
                warn!(media_id, "gallery item has no usable rendition, skipping");
                continue;
            };
            let ext = Path::new(url::Url::parse(&source).map(|u| u.path().to_string()).unwrap_or_default().as_str())
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("jpg")
                .to_string();
            let dest = dir.join(format!("gallery_{index}.{ext}"));
            match utils::fetch_to_file(
                &self.client,
                &source,
                &dest,
                self.request_timeout,
                self.max_file_size,
            )
            .await
            {
                Ok(file) => files.push(file),
                Err(e) => warn!(media_id, error = %e, "gallery item fetch failed, skipping"),
            }
        }

        if files.is_empty() {
            return Err(Error::ContentUnavailable(format!(
                "gallery post {} has no retrievable items",
                post_id(post)
            )));
        }
        Ok(files)
    }

    async fn stage_post(&self, post: &Value, dir: &Path) -> Result<Vec<LocalFile>> {
        if post
            .get("removed_by_category")
            .map(|v| !v.is_null())
            .unwrap_or(false)
        {
            return Err(Error::ContentUnavailable(format!(
                "post {} was removed",
                post_id(post)
            )));
        }

        let video_url = post
            .pointer("/secure_media/reddit_video/fallback_url")
            .or_else(|| post.pointer("/media/reddit_video/fallback_url"))
            .and_then(|v| v.as_str());
        if let Some(video_url) = video_url {
            return self.stage_video(post, video_url, dir).await;
        }

        if post.get("is_gallery").and_then(|v| v.as_bool()).unwrap_or(false) {
            return self.stage_gallery(post, dir).await;
        }

        let link = post
            .get("url_overridden_by_dest")
            .or_else(|| post.get("url"))
            .and_then(|v| v.as_str())
            .map(unescape_html);
        if let Some(link) = link {
            let is_direct_image = link.contains("i.redd.it")
                || crate::types::is_media_extension(Path::new(
                    url::Url::parse(&link)
                        .map(|u| u.path().to_string())
                        .unwrap_or_default()
                        .as_str(),
                ));
            if is_direct_image {
                let name = utils::filename_from_url(&link, "image.jpg");
                let file = utils::fetch_to_file(
                    &self.client,
                    &link,
                    &dir.join(name),
                    self.request_timeout,
                    self.max_file_size,
                )
                .await?;
                return Ok(vec![file]);
            }
        }

        // Text posts and external embeds are out of reach here; declining
        // lets the chain hand the URL to yt-dlp.
        Err(Error::ContentUnavailable(format!(
            "post {} hosts no reddit-native media",
            post_id(post)
        )))
    }
}

fn post_id(post: &Value) -> &str {
    post.get("id").and_then(|v| v.as_str()).unwrap_or("unknown")
}

#[async_trait]
impl Strategy for RedditStrategy {
    fn name(&self) -> &'static str {
        "reddit-json"
    }

    async fn attempt(
        &self,
        reference: &MediaReference,
        _cancel: &CancellationToken,
    ) -> Result<Retrieved> {
        let mut url = normalize_post_url(&reference.raw)?;
        if needs_expansion(&url) {
            url = self.expand(&url).await?;
        }
        let post = self.fetch_post(&url).await?;
        let title = post
            .get("title")
            .and_then(|v| v.as_str())
            .map(utils::sanitize_filename)
            .unwrap_or_else(|| "reddit post".to_string());

        let dir = self.store.attempt_dir(PlatformTag::Reddit)?;
        match self.stage_post(&post, &dir).await {
            Ok(files) => Ok(Retrieved { files, title }),
            Err(e) => {
                self.store.release(&dir);
                Err(e)
            }
        }
    }
}
