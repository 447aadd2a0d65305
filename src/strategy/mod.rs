//! Retrieval strategies and the per-platform fallback chains
//!
//! Every way of turning a reference into staged media implements
//! [`Strategy`]. The resolver drives the strategies for a platform in the
//! fixed order given by [`fallback_chain`], stopping at the first success.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::classify::PlatformTag;
use crate::error::Result;
use crate::types::{MediaReference, Retrieved};

pub mod deezer;
pub mod external;
pub mod reddit;

pub use deezer::DeezerStrategy;
pub use external::ExternalToolStrategy;
pub use reddit::RedditStrategy;

/// One way of retrieving media for a reference
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Short stable name used in logs and failure details.
    fn name(&self) -> &'static str;

    /// Try to retrieve the referenced media into the staging area.
    ///
    /// A failed attempt must not leave files behind; the strategy releases
    /// its own attempt directory before returning an error.
    async fn attempt(
        &self,
        reference: &MediaReference,
        cancel: &CancellationToken,
    ) -> Result<Retrieved>;
}

/// Identifier of a concrete strategy in the fallback tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyId {
    /// Deezer catalog API plus deemix/preview download
    DeezerNative,
    /// Reddit post-JSON parser with direct media fetches
    RedditJson,
    /// yt-dlp invocation
    YtDlp,
    /// gallery-dl invocation
    GalleryDl,
}

/// The ordered fallback chain for a platform.
///
/// Returns an empty slice for platforms no strategy handles.
pub fn fallback_chain(platform: PlatformTag) -> &'static [StrategyId] {
    match platform {
        PlatformTag::Deezer => &[StrategyId::DeezerNative],
        PlatformTag::Reddit => &[StrategyId::RedditJson, StrategyId::YtDlp],
        PlatformTag::Instagram => &[StrategyId::GalleryDl],
        PlatformTag::TikTok => &[StrategyId::YtDlp],
        PlatformTag::FreeTextQuery | PlatformTag::Unknown => &[],
    }
}
