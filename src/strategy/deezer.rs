//! Deezer catalog strategy
//!
//! Resolves track, album, and playlist URLs through the public catalog API.
//! With an ARL session token configured, tracks are downloaded at full
//! quality via deemix; otherwise the strategy falls back to the catalog's
//! 30-second preview clip, tagged via the enricher so players show proper
//! metadata.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classify::{self, DeezerEntity, PlatformTag};
use crate::enrich::{Enricher, TrackTags};
use crate::error::{Error, Result};
use crate::staging::ArtifactStore;
use crate::strategy::Strategy;
use crate::tool::{ToolKind, ToolRunner};
use crate::types::{LocalFile, MediaReference, Retrieved, TrackCandidate};
use crate::utils;

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiAlbum {
    title: String,
    cover_big: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: u64,
    title: String,
    #[serde(default)]
    duration: u32,
    #[serde(default)]
    preview: Option<String>,
    artist: ApiArtist,
    #[serde(default)]
    album: Option<ApiAlbum>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<ApiTrack>,
}

/// Catalog-backed Deezer strategy
pub struct DeezerStrategy {
    client: reqwest::Client,
    api_base: String,
    request_timeout: Duration,
    store: ArtifactStore,
    runner: ToolRunner,
    enricher: Enricher,
    has_arl: bool,
    max_file_size: u64,
}

impl DeezerStrategy {
    /// Create the strategy.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: reqwest::Client,
        api_base: String,
        request_timeout: Duration,
        store: ArtifactStore,
        runner: ToolRunner,
        enricher: Enricher,
        has_arl: bool,
        max_file_size: u64,
    ) -> DeezerStrategy {
        DeezerStrategy {
            client,
            api_base,
            request_timeout,
            store,
            runner,
            enricher,
            has_arl,
            max_file_size,
        }
    }

    async fn get_json(&self, path_and_query: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.api_base, path_and_query);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Search the catalog for tracks matching a free-text query.
    pub async fn search(&self, query: &str) -> Result<Vec<TrackCandidate>> {
        let encoded = urlencoding::encode(query);
        let value = self.get_json(&format!("/search?q={encoded}&limit=10")).await?;
        let response: SearchResponse = serde_json::from_value(value)?;
        Ok(response
            .data
            .into_iter()
            .map(|track| TrackCandidate {
                id: track.id,
                title: track.title,
                artist: track.artist.name,
                duration_secs: track.duration,
                artwork_url: track.album.as_ref().and_then(|a| a.cover_big.clone()),
                preview_url: track.preview.filter(|p| !p.is_empty()),
            })
            .collect())
    }

    async fn fetch_track(&self, id: u64) -> Result<ApiTrack> {
        let value = self.get_json(&format!("/track/{id}")).await?;
        // The catalog answers 200 with an error object for unknown ids.
        if value.get("error").is_some() {
            return Err(Error::NotFound(format!("deezer track {id}")));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// First track id of an album or playlist.
    async fn first_track_id(&self, kind: &str, id: u64) -> Result<u64> {
        let value = self.get_json(&format!("/{kind}/{id}")).await?;
        if value.get("error").is_some() {
            return Err(Error::NotFound(format!("deezer {kind} {id}")));
        }
        value
            .pointer("/tracks/data/0/id")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| Error::ContentUnavailable(format!("deezer {kind} {id} has no tracks")))
    }

    /// Retrieve a track by catalog id.
    pub async fn download_track(&self, id: u64, cancel: &CancellationToken) -> Result<Retrieved> {
        let track = self.fetch_track(id).await?;
        let dir = self.store.attempt_dir(PlatformTag::Deezer)?;
        match self.download_into(&track, &dir, cancel).await {
            Ok(retrieved) => Ok(retrieved),
            Err(e) => {
                self.store.release(&dir);
                Err(e)
            }
        }
    }

    async fn download_into(
        &self,
        track: &ApiTrack,
        dir: &std::path::Path,
        cancel: &CancellationToken,
    ) -> Result<Retrieved> {
        let title = format!("{} - {}", track.artist.name, track.title);

        if self.has_arl {
            // The tool gets its own subdirectory so partial output from a
            // failed run can be purged before the preview path writes here.
            let full_dir = dir.join("full");
            std::fs::create_dir_all(&full_dir)?;
            let track_url = format!("https://www.deezer.com/track/{}", track.id);
            match self.runner.run(ToolKind::Deemix, &track_url, &full_dir, cancel).await {
                Ok(files) => {
                    debug!(track = track.id, "full-quality download succeeded");
                    return Ok(Retrieved { files, title });
                }
                // A size refusal will not improve by switching to a preview
                // the caller did not ask for.
                Err(e @ Error::TooLarge { .. }) => return Err(e),
                Err(e) => {
                    warn!(track = track.id, error = %e, "full-quality download failed, falling back to preview");
                    self.store.release(&full_dir);
                }
            }
        }

        let preview = track
            .preview
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                Error::AuthenticationRequired(format!(
                    "track {} has no preview and full quality requires an ARL token",
                    track.id
                ))
            })?;

        let dest = dir.join(format!("{}.mp3", utils::sanitize_filename(&title)));
        let file = utils::fetch_to_file(
            &self.client,
            preview,
            &dest,
            self.request_timeout,
            self.max_file_size,
        )
        .await?;

        let tags = TrackTags {
            title: track.title.clone(),
            artist: track.artist.name.clone(),
            album: track.album.as_ref().map(|a| a.title.clone()),
            year: None,
            artwork_url: track.album.as_ref().and_then(|a| a.cover_big.clone()),
        };
        self.enricher.enrich(&file.path, &tags).await;

        // Enrichment may have rewritten the file; refresh its metadata.
        let file = LocalFile::from_path(file.path)?;
        Ok(Retrieved {
            files: vec![file],
            title,
        })
    }
}

#[async_trait]
impl Strategy for DeezerStrategy {
    fn name(&self) -> &'static str {
        "deezer-native"
    }

    async fn attempt(
        &self,
        reference: &MediaReference,
        cancel: &CancellationToken,
    ) -> Result<Retrieved> {
        let (entity, id) = classify::deezer_entity(&reference.raw).ok_or_else(|| {
            Error::InvalidReference(format!("not a deezer entity URL: {}", reference.raw))
        })?;
        let track_id = match entity {
            DeezerEntity::Track => id,
            DeezerEntity::Album => self.first_track_id("album", id).await?,
            DeezerEntity::Playlist => self.first_track_id("playlist", id).await?,
        };
        self.download_track(track_id, cancel).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolsConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn strategy_for(server: &MockServer, store: ArtifactStore, has_arl: bool) -> DeezerStrategy {
        // ffmpeg pinned to a dangling path so enrichment is a no-op in tests
        let tools = ToolsConfig {
            ffmpeg_path: Some("/nonexistent/ffmpeg".into()),
            deemix_path: Some("/nonexistent/deemix".into()),
            ..ToolsConfig::default()
        };
        strategy_with_tools(server, store, has_arl, tools)
    }

    fn strategy_with_tools(
        server: &MockServer,
        store: ArtifactStore,
        has_arl: bool,
        tools: ToolsConfig,
    ) -> DeezerStrategy {
        let client = reqwest::Client::new();
        DeezerStrategy::new(
            client.clone(),
            server.uri(),
            Duration::from_secs(5),
            store,
            ToolRunner::new(tools.clone(), None, 1024 * 1024),
            Enricher::new(client, tools, Duration::from_secs(5), 1024 * 1024),
            has_arl,
            1024 * 1024,
        )
    }

    fn track_body(id: u64, preview: Option<&str>) -> serde_json::Value {
        json!({
            "id": id,
            "title": "One More Time",
            "duration": 320,
            "preview": preview,
            "artist": {"name": "Daft Punk"},
            "album": {"title": "Discovery", "cover_big": null}
        })
    }

    #[tokio::test]
    async fn search_maps_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "daft punk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [track_body(3135556, Some("https://cdn.example/preview.mp3"))]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf()).unwrap();
        let candidates = strategy_for(&server, store, false)
            .search("daft punk")
            .await
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, 3135556);
        assert_eq!(candidates[0].artist, "Daft Punk");
        assert_eq!(candidates[0].duration_secs, 320);
        assert!(candidates[0].preview_url.is_some());
    }

    #[tokio::test]
    async fn unknown_track_id_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/track/999"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": {"type": "DataException", "message": "no data"}
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf()).unwrap();
        let err = strategy_for(&server, store, false)
            .download_track(999, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn preview_flow_stages_tagged_mp3() {
        let server = MockServer::start().await;
        let preview_url = format!("{}/preview/3135556.mp3", server.uri());
        Mock::given(method("GET"))
            .and(path("/track/3135556"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(track_body(3135556, Some(&preview_url))),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/preview/3135556.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf()).unwrap();
        let retrieved = strategy_for(&server, store, false)
            .download_track(3135556, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(retrieved.title, "Daft Punk - One More Time");
        assert_eq!(retrieved.files.len(), 1);
        assert!(
            retrieved.files[0]
                .path
                .ends_with("Daft Punk - One More Time.mp3")
        );
        assert_eq!(std::fs::read(&retrieved.files[0].path).unwrap(), b"mp3-bytes");
    }

    #[tokio::test]
    async fn missing_preview_without_arl_requires_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/track/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(track_body(42, None)))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("staging")).unwrap();
        let err = strategy_for(&server, store.clone(), false)
            .download_track(42, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::error::ErrorKind::AuthenticationRequired);
        // The failed attempt must not leave a directory behind.
        let deezer_dir = store.root().join("deezer");
        let leftovers: Vec<_> = std::fs::read_dir(&deezer_dir).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn album_url_resolves_first_track() {
        let server = MockServer::start().await;
        let preview_url = format!("{}/preview/1.mp3", server.uri());
        Mock::given(method("GET"))
            .and(path("/album/302127"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 302127,
                "tracks": {"data": [{"id": 3135556}, {"id": 3135557}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/track/3135556"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(track_body(3135556, Some(&preview_url))),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/preview/1.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf()).unwrap();
        let strategy = strategy_for(&server, store, false);
        let reference = MediaReference {
            raw: "https://www.deezer.com/album/302127".to_string(),
            platform: PlatformTag::Deezer,
        };
        let retrieved = strategy
            .attempt(&reference, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(retrieved.title, "Daft Punk - One More Time");
    }

    #[tokio::test]
    async fn empty_album_is_content_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/album/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 7,
                "tracks": {"data": []}
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf()).unwrap();
        let strategy = strategy_for(&server, store, false);
        let reference = MediaReference {
            raw: "https://www.deezer.com/album/7".to_string(),
            platform: PlatformTag::Deezer,
        };
        let err = strategy
            .attempt(&reference, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ContentUnavailable);
    }

    #[tokio::test]
    async fn arl_with_broken_deemix_falls_back_to_preview() {
        let server = MockServer::start().await;
        let preview_url = format!("{}/preview/9.mp3", server.uri());
        Mock::given(method("GET"))
            .and(path("/track/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(track_body(9, Some(&preview_url))))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/preview/9.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"preview".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf()).unwrap();
        // deemix is pinned to a dangling path, so the full-quality attempt
        // fails with ToolMissing and the preview path takes over.
        let retrieved = strategy_for(&server, store, true)
            .download_track(9, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&retrieved.files[0].path).unwrap(), b"preview");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_full_quality_output_is_purged_before_preview() {
        use std::os::unix::fs::PermissionsExt;

        let server = MockServer::start().await;
        let preview_url = format!("{}/preview/11.mp3", server.uri());
        Mock::given(method("GET"))
            .and(path("/track/11"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(track_body(11, Some(&preview_url))),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/preview/11.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"preview".to_vec()))
            .mount(&server)
            .await;

        // Fake deemix that leaves half a track behind before failing. The
        // destination dir is argument 2.
        let bins = tempfile::tempdir().unwrap();
        let deemix = bins.path().join("deemix");
        std::fs::write(
            &deemix,
            "#!/bin/sh\nprintf half > \"$2/partial.mp3\"\necho broken >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&deemix, std::fs::Permissions::from_mode(0o755)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().to_path_buf()).unwrap();
        let tools = ToolsConfig {
            ffmpeg_path: Some("/nonexistent/ffmpeg".into()),
            deemix_path: Some(deemix),
            ..ToolsConfig::default()
        };
        let retrieved = strategy_with_tools(&server, store.clone(), true, tools)
            .download_track(11, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&retrieved.files[0].path).unwrap(), b"preview");

        // The tool's partial output must not survive the fallback.
        let mut stack = vec![store.root().to_path_buf()];
        while let Some(d) = stack.pop() {
            for entry in std::fs::read_dir(&d).unwrap() {
                let p = entry.unwrap().path();
                if p.is_dir() {
                    stack.push(p);
                } else {
                    assert_ne!(p.file_name().unwrap(), "partial.mp3", "orphaned at {p:?}");
                }
            }
        }

        // And releasing the payload leaves the platform dir empty.
        store.release_all(&retrieved.files);
        let leftovers: Vec<_> = std::fs::read_dir(store.root().join("deezer"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty(), "staging leaked: {leftovers:?}");
    }
}
