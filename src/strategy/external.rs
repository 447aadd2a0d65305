//! Strategies backed entirely by an external extractor tool

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::classify::PlatformTag;
use crate::error::Result;
use crate::staging::ArtifactStore;
use crate::strategy::Strategy;
use crate::tool::{ToolKind, ToolRunner};
use crate::types::{MediaReference, Retrieved};

/// A strategy that hands the reference URL to one external tool and stages
/// whatever it produces
pub struct ExternalToolStrategy {
    kind: ToolKind,
    platform: PlatformTag,
    runner: ToolRunner,
    store: ArtifactStore,
}

impl ExternalToolStrategy {
    /// Create a tool-backed strategy for one platform.
    pub fn new(
        kind: ToolKind,
        platform: PlatformTag,
        runner: ToolRunner,
        store: ArtifactStore,
    ) -> ExternalToolStrategy {
        ExternalToolStrategy {
            kind,
            platform,
            runner,
            store,
        }
    }
}

#[async_trait]
impl Strategy for ExternalToolStrategy {
    fn name(&self) -> &'static str {
        match self.kind {
            ToolKind::YtDlp => "yt-dlp",
            ToolKind::GalleryDl => "gallery-dl",
            ToolKind::Deemix => "deemix",
        }
    }

    async fn attempt(
        &self,
        reference: &MediaReference,
        cancel: &CancellationToken,
    ) -> Result<Retrieved> {
        let dir = self.store.attempt_dir(self.platform)?;
        match self.runner.run(self.kind, &reference.raw, &dir, cancel).await {
            Ok(files) => {
                // Tools encode the title into the output filename.
                let title = files
                    .first()
                    .and_then(|f| f.path.file_stem())
                    .and_then(|s| s.to_str())
                    .unwrap_or("media")
                    .to_string();
                Ok(Retrieved { files, title })
            }
            Err(e) => {
                self.store.release(&dir);
                Err(e)
            }
        }
    }
}
