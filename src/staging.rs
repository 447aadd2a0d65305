//! Staging area for retrieved artifacts
//!
//! Retrieved files land under a per-platform directory inside a
//! caller-provided root. Each retrieval attempt gets its own
//! randomly-tokened subdirectory so concurrent resolves never collide.
//! Callers own the lifecycle of staged files and hand them back through
//! [`ArtifactStore::release`] once consumed.

use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::warn;

use crate::classify::PlatformTag;
use crate::error::Result;
use crate::types::LocalFile;

/// Length of the random token naming each attempt directory
const ATTEMPT_TOKEN_LEN: usize = 12;

/// Constructor-injected store managing the staging directory tree
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: PathBuf) -> Result<ArtifactStore> {
        std::fs::create_dir_all(&root)?;
        Ok(ArtifactStore { root })
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensure the per-platform directory exists and return it.
    pub fn stage(&self, platform: PlatformTag) -> Result<PathBuf> {
        let dir = self.root.join(platform.to_string());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Create a fresh directory for one retrieval attempt.
    ///
    /// The directory name is a random alphanumeric token under the platform
    /// directory, so concurrent attempts for the same platform write to
    /// disjoint paths.
    pub fn attempt_dir(&self, platform: PlatformTag) -> Result<PathBuf> {
        let platform_dir = self.stage(platform)?;
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(ATTEMPT_TOKEN_LEN)
            .map(char::from)
            .collect();
        let dir = platform_dir.join(token);
        std::fs::create_dir(&dir)?;
        Ok(dir)
    }

    /// Remove a staged file or attempt directory.
    ///
    /// Idempotent: releasing a path that is already gone succeeds. Other
    /// removal failures are logged and swallowed so release never interferes
    /// with the caller's flow.
    pub fn release(&self, path: &Path) {
        let result = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        if let Err(e) = result {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to release staged path");
            }
        }
    }

    /// Release every file in a retrieved set, along with the per-attempt
    /// directories that held them.
    ///
    /// Without the directory sweep every resolve would leave one empty
    /// token directory behind under `root/<platform>/`.
    pub fn release_all(&self, files: &[LocalFile]) {
        for file in files {
            self.release(&file.path);
        }
        for file in files {
            if let Some(dir) = self.attempt_dir_of(&file.path) {
                self.release(&dir);
            }
        }
    }

    /// The per-attempt token directory containing `path`, when `path` lies
    /// inside this store's tree.
    fn attempt_dir_of(&self, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut components = relative.components();
        let platform = components.next()?;
        let token = components.next()?;
        // Require a component below the token dir so a path that IS the
        // platform or token dir never removes more than itself.
        components.next()?;
        Some(self.root.join(platform.as_os_str()).join(token.as_os_str()))
    }
}
