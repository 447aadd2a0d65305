//! # media-dl
//!
//! Multi-platform media retrieval library. Give it a URL or a free-text
//! query and it stages the referenced media on local disk: Deezer tracks
//! (full quality via deemix with an ARL token, 30-second previews without),
//! Reddit videos, galleries, and images, Instagram posts via gallery-dl,
//! and TikTok videos via yt-dlp.
//!
//! Each platform has an ordered chain of retrieval strategies; the resolver
//! runs them in order and returns the first success. When every strategy
//! fails, the most actionable failure wins, so callers can tell a missing
//! credential from a deleted post.
//!
//! ## Quick start
//!
//! ```no_run
//! use media_dl::{Config, MediaResolver, Resolution};
//!
//! # async fn example() -> media_dl::Result<()> {
//! let resolver = MediaResolver::new(Config::default())?;
//!
//! match resolver.resolve("https://www.reddit.com/r/aww/comments/abc123/cute/").await? {
//!     Resolution::Media(retrieved) => {
//!         for file in &retrieved.files {
//!             println!("staged {} ({} bytes)", file.path.display(), file.size_bytes);
//!         }
//!         resolver.release_all(&retrieved.files);
//!     }
//!     Resolution::Candidates(tracks) => {
//!         // Free-text queries return track candidates to choose from.
//!         let retrieved = resolver.resolve_track(tracks[0].id).await?;
//!         resolver.release_all(&retrieved.files);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Platform classification
pub mod classify;
/// Configuration types
pub mod config;
/// Metadata enrichment
pub mod enrich;
/// Error types
pub mod error;
/// The resolver front door
pub mod resolver;
/// Caller-side retry helpers
pub mod retry;
/// Artifact staging
pub mod staging;
/// Retrieval strategies
pub mod strategy;
/// External tool adapter
pub mod tool;
/// Core data types
pub mod types;
/// Shared helpers
pub mod utils;

pub use classify::{DeezerEntity, PlatformTag, classify as classify_reference, deezer_entity};
pub use config::{Config, HttpConfig, RetryConfig, ToolsConfig};
pub use enrich::{Enricher, TrackTags};
pub use error::{Error, ErrorKind, Result};
pub use resolver::MediaResolver;
pub use retry::{IsRetryable, with_backoff};
pub use staging::ArtifactStore;
pub use strategy::{Strategy, StrategyId, fallback_chain};
pub use tool::{ToolKind, ToolRunner};
pub use types::{
    LocalFile, MediaKind, MediaReference, Resolution, Retrieved, TrackCandidate,
};
