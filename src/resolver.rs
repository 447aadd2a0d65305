//! The resolver: classification, fallback chains, size policy, aggregation
//!
//! [`MediaResolver`] is the library's front door. It classifies an input,
//! drives the platform's strategy chain in order until one succeeds,
//! enforces the size limit on whatever was staged, and folds the collected
//! failures into a single aggregate error when nothing worked.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::classify::PlatformTag;
use crate::config::Config;
use crate::enrich::Enricher;
use crate::error::{Error, Result};
use crate::staging::ArtifactStore;
use crate::strategy::{
    DeezerStrategy, ExternalToolStrategy, RedditStrategy, Strategy, StrategyId, fallback_chain,
};
use crate::tool::{ToolKind, ToolRunner};
use crate::types::{LocalFile, MediaReference, Resolution, Retrieved, TrackCandidate};

/// Resolves references to staged media
pub struct MediaResolver {
    config: Config,
    store: ArtifactStore,
    runner: ToolRunner,
    deezer: Arc<DeezerStrategy>,
    reddit: Arc<RedditStrategy>,
}

impl MediaResolver {
    /// Build a resolver from a validated configuration.
    ///
    /// Creates the staging root and the shared HTTP clients.
    pub fn new(config: Config) -> Result<MediaResolver> {
        config.validate()?;
        let store = ArtifactStore::new(config.staging_dir.clone())?;

        let client = reqwest::Client::builder()
            .timeout(config.http.request_timeout)
            .user_agent(config.http.user_agent.clone())
            .build()?;
        let probe = reqwest::Client::builder()
            .timeout(config.http.request_timeout)
            .user_agent(config.http.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let runner = ToolRunner::new(
            config.tools.clone(),
            config.deezer_arl.clone(),
            config.max_file_size,
        );
        let enricher = Enricher::new(
            client.clone(),
            config.tools.clone(),
            config.http.request_timeout,
            config.max_file_size,
        );

        let deezer = Arc::new(DeezerStrategy::new(
            client.clone(),
            config.http.deezer_api_base.clone(),
            config.http.request_timeout,
            store.clone(),
            runner.clone(),
            enricher,
            config.deezer_arl.is_some(),
            config.max_file_size,
        ));
        let reddit = Arc::new(RedditStrategy::new(
            client,
            probe,
            config.http.reddit_api_base.clone(),
            config.http.request_timeout,
            store.clone(),
            config.max_file_size,
        ));

        Ok(MediaResolver {
            config,
            store,
            runner,
            deezer,
            reddit,
        })
    }

    /// Resolve an input string to staged media or search candidates.
    pub async fn resolve(&self, input: &str) -> Result<Resolution> {
        self.resolve_with_cancel(input, &CancellationToken::new())
            .await
    }

    /// Like [`resolve`](Self::resolve), aborting early when `cancel` fires.
    pub async fn resolve_with_cancel(
        &self,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        let reference = MediaReference::classify(input);
        if reference.raw.is_empty() {
            return Err(Error::InvalidReference("empty input".to_string()));
        }
        info!(platform = %reference.platform, "resolving reference");

        match reference.platform {
            PlatformTag::Unknown => Err(Error::InvalidReference(format!(
                "no platform handles this URL: {}",
                reference.raw
            ))),
            PlatformTag::FreeTextQuery => {
                let candidates = self.search(&reference.raw).await?;
                Ok(Resolution::Candidates(candidates))
            }
            platform => {
                let retrieved = self.drive_chain(&reference, platform, cancel).await?;
                Ok(Resolution::Media(retrieved))
            }
        }
    }

    /// Search the catalog for tracks matching a free-text query.
    pub async fn search(&self, query: &str) -> Result<Vec<TrackCandidate>> {
        let candidates = self.deezer.search(query).await?;
        if candidates.is_empty() {
            return Err(Error::NotFound(format!("no tracks match \"{query}\"")));
        }
        Ok(candidates)
    }

    /// Retrieve one track by catalog id, typically after a candidate choice.
    pub async fn resolve_track(&self, id: u64) -> Result<Retrieved> {
        self.resolve_track_with_cancel(id, &CancellationToken::new())
            .await
    }

    /// Like [`resolve_track`](Self::resolve_track) with cancellation.
    pub async fn resolve_track_with_cancel(
        &self,
        id: u64,
        cancel: &CancellationToken,
    ) -> Result<Retrieved> {
        let retrieved = self.deezer.download_track(id, cancel).await?;
        self.enforce_size_limit(retrieved)
    }

    async fn drive_chain(
        &self,
        reference: &MediaReference,
        platform: PlatformTag,
        cancel: &CancellationToken,
    ) -> Result<Retrieved> {
        let chain = fallback_chain(platform);
        let mut failures = Vec::new();

        for id in chain {
            if cancel.is_cancelled() {
                return Err(Error::Internal("cancelled".to_string()));
            }
            let strategy = self.instantiate(*id, platform);
            match strategy.attempt(reference, cancel).await {
                Ok(retrieved) => {
                    info!(strategy = strategy.name(), files = retrieved.files.len(), "strategy succeeded");
                    return self.enforce_size_limit(retrieved);
                }
                // The next strategy would refetch the same oversized content.
                Err(e @ Error::TooLarge { .. }) => return Err(e),
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "strategy failed, trying next");
                    failures.push(e);
                }
            }
        }

        Err(Error::aggregate(failures))
    }

    fn instantiate(&self, id: StrategyId, platform: PlatformTag) -> Arc<dyn Strategy> {
        match id {
            StrategyId::DeezerNative => self.deezer.clone(),
            StrategyId::RedditJson => self.reddit.clone(),
            StrategyId::YtDlp => Arc::new(ExternalToolStrategy::new(
                ToolKind::YtDlp,
                platform,
                self.runner.clone(),
                self.store.clone(),
            )),
            StrategyId::GalleryDl => Arc::new(ExternalToolStrategy::new(
                ToolKind::GalleryDl,
                platform,
                self.runner.clone(),
                self.store.clone(),
            )),
        }
    }

    /// Delete staged files that exceed the size limit and report the excess.
    fn enforce_size_limit(&self, retrieved: Retrieved) -> Result<Retrieved> {
        let limit = self.config.max_file_size;
        if let Some(big) = retrieved.files.iter().find(|f| f.size_bytes > limit) {
            let size = big.size_bytes;
            warn!(size, limit, "staged media exceeds size limit, discarding");
            self.store.release_all(&retrieved.files);
            return Err(Error::TooLarge {
                size: Some(size),
                limit,
            });
        }
        Ok(retrieved)
    }

    /// Release one staged path once the caller has consumed it.
    pub fn release(&self, path: &std::path::Path) {
        self.store.release(path);
    }

    /// Release every file of a retrieved set.
    pub fn release_all(&self, files: &[LocalFile]) {
        self.store.release_all(files);
    }

    /// The resolver's staging store.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }
}
