//! External extractor tool adapter
//!
//! Wraps the yt-dlp, gallery-dl, and deemix binaries behind one runner:
//! binary discovery (explicit config path, then PATH), bounded subprocess
//! execution with cancellation, data-driven stderr classification into the
//! closed error taxonomy, and a media scan over the tool's output directory.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ToolsConfig;
use crate::error::{Error, Result, truncate_detail};
use crate::types::{self, LocalFile};

/// The external binaries the library knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// yt-dlp, for TikTok and as the Reddit fallback
    YtDlp,
    /// gallery-dl, for Instagram
    GalleryDl,
    /// deemix, for full-quality Deezer tracks
    Deemix,
}

impl ToolKind {
    /// Name of the binary on disk.
    pub fn binary_name(self) -> &'static str {
        match self {
            ToolKind::YtDlp => "yt-dlp",
            ToolKind::GalleryDl => "gallery-dl",
            ToolKind::Deemix => "deemix",
        }
    }
}

/// What a matched stderr pattern means
#[derive(Debug, Clone, Copy)]
enum FailureClass {
    AuthenticationRequired,
    TooLarge,
    ContentUnavailable,
    RateLimitedOrTimeout,
}

/// Substring table mapping tool stderr to failure classes.
///
/// Matched case-insensitively, first hit wins. Extending tool coverage means
/// extending this table, not adding branches elsewhere.
const STDERR_PATTERNS: &[(&str, FailureClass)] = &[
    ("login required", FailureClass::AuthenticationRequired),
    ("sign in", FailureClass::AuthenticationRequired),
    ("authentication", FailureClass::AuthenticationRequired),
    ("requested content is not available", FailureClass::ContentUnavailable),
    ("larger than max-filesize", FailureClass::TooLarge),
    ("file is larger than", FailureClass::TooLarge),
    ("not available", FailureClass::ContentUnavailable),
    ("private", FailureClass::ContentUnavailable),
    ("not found", FailureClass::ContentUnavailable),
    ("404", FailureClass::ContentUnavailable),
    ("unable to download", FailureClass::ContentUnavailable),
    ("rate limit", FailureClass::RateLimitedOrTimeout),
    ("429", FailureClass::RateLimitedOrTimeout),
    ("timed out", FailureClass::RateLimitedOrTimeout),
];

/// Classify a tool's stderr into the error taxonomy.
///
/// Unmatched stderr becomes `Internal` carrying a bounded excerpt.
pub fn classify_tool_failure(tool: ToolKind, stderr: &str, size_limit: u64) -> Error {
    let haystack = stderr.to_lowercase();
    for (needle, class) in STDERR_PATTERNS {
        if haystack.contains(needle) {
            return match class {
                FailureClass::AuthenticationRequired => {
                    Error::AuthenticationRequired(truncate_detail(stderr))
                }
                FailureClass::TooLarge => Error::TooLarge {
                    size: None,
                    limit: size_limit,
                },
                FailureClass::ContentUnavailable => {
                    Error::ContentUnavailable(truncate_detail(stderr))
                }
                FailureClass::RateLimitedOrTimeout => {
                    Error::RateLimitedOrTimeout(truncate_detail(stderr))
                }
            };
        }
    }
    Error::Internal(format!(
        "{} failed: {}",
        tool.binary_name(),
        truncate_detail(stderr)
    ))
}

/// Runner driving external tool invocations
#[derive(Debug, Clone)]
pub struct ToolRunner {
    config: ToolsConfig,
    deezer_arl: Option<String>,
    max_file_size: u64,
}

impl ToolRunner {
    /// Create a runner from tool settings.
    pub fn new(config: ToolsConfig, deezer_arl: Option<String>, max_file_size: u64) -> ToolRunner {
        ToolRunner {
            config,
            deezer_arl,
            max_file_size,
        }
    }

    /// Locate a tool's binary: explicit configured path first, then PATH
    /// discovery when enabled.
    pub fn locate(&self, kind: ToolKind) -> Result<PathBuf> {
        let explicit = match kind {
            ToolKind::YtDlp => self.config.ytdlp_path.as_ref(),
            ToolKind::GalleryDl => self.config.gallerydl_path.as_ref(),
            ToolKind::Deemix => self.config.deemix_path.as_ref(),
        };
        if let Some(path) = explicit {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(Error::ToolMissing(format!(
                "{} not found at configured path {}",
                kind.binary_name(),
                path.display()
            )));
        }
        if self.config.search_path {
            return which::which(kind.binary_name()).map_err(|_| {
                Error::ToolMissing(format!("{} not found in PATH", kind.binary_name()))
            });
        }
        Err(Error::ToolMissing(format!(
            "{} has no configured path and PATH search is disabled",
            kind.binary_name()
        )))
    }

    /// True when the tool can be located without running it.
    pub fn is_available(&self, kind: ToolKind) -> bool {
        self.locate(kind).is_ok()
    }

    fn build_command(&self, binary: &Path, kind: ToolKind, url: &str, dest: &Path) -> Command {
        let mut command = Command::new(binary);
        match kind {
            ToolKind::YtDlp => {
                let template = format!("{}/%(title).80s.%(ext)s", dest.display());
                command
                    .arg("--no-playlist")
                    .arg("--max-filesize")
                    .arg(self.max_file_size.to_string())
                    .arg("-o")
                    .arg(template)
                    .arg("--no-warnings")
                    .arg(url);
            }
            ToolKind::GalleryDl => {
                command
                    .arg("--dest")
                    .arg(dest)
                    .arg("--filename")
                    .arg("{category}_{id}.{extension}")
                    .arg("--no-part")
                    .arg(url);
            }
            ToolKind::Deemix => {
                command
                    .arg("-p")
                    .arg(dest)
                    .arg("-b")
                    .arg("mp3_320")
                    .arg(url);
                if let Some(arl) = &self.deezer_arl {
                    command.env("DEEMIX_ARL", arl);
                }
            }
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Run a tool against `url`, staging its output under `dest`.
    ///
    /// The invocation is bounded by the configured tool timeout and aborts
    /// when `cancel` fires; in both cases the child is killed. On success the
    /// output directory is scanned and the media files found are returned.
    pub async fn run(
        &self,
        kind: ToolKind,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<LocalFile>> {
        let binary = self.locate(kind)?;
        let mut command = self.build_command(&binary, kind, url, dest);
        debug!(tool = kind.binary_name(), url = %url, dest = %dest.display(), "running external tool");

        let output = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(Error::Internal("cancelled".to_string()));
            }
            result = tokio::time::timeout(self.config.tool_timeout, command.output()) => {
                match result {
                    Err(_) => {
                        return Err(Error::RateLimitedOrTimeout(format!(
                            "{} exceeded {}s deadline",
                            kind.binary_name(),
                            self.config.tool_timeout.as_secs()
                        )));
                    }
                    Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(Error::ToolMissing(format!(
                            "{} vanished from {}",
                            kind.binary_name(),
                            binary.display()
                        )));
                    }
                    Ok(Err(e)) => return Err(e.into()),
                    Ok(Ok(output)) => output,
                }
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                tool = kind.binary_name(),
                code = output.status.code().unwrap_or(-1),
                "external tool failed"
            );
            return Err(classify_tool_failure(kind, &stderr, self.max_file_size));
        }

        let files = scan_media_files(dest)?;
        if files.is_empty() {
            return Err(Error::Internal(format!(
                "{} reported success but produced no media files",
                kind.binary_name()
            )));
        }
        Ok(files)
    }
}

/// Recursively collect media files under `dir`, in discovery order.
///
/// Tools nest output under category subdirectories (gallery-dl in
/// particular), so the scan descends. Non-media files are ignored.
pub fn scan_media_files(dir: &Path) -> Result<Vec<LocalFile>> {
    let mut files = Vec::new();
    collect_media(dir, &mut files)?;
    Ok(files)
}

fn collect_media(dir: &Path, out: &mut Vec<LocalFile>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_media(&path, out)?;
        } else if types::is_media_extension(&path) {
            out.push(LocalFile::from_path(path)?);
        }
    }
    Ok(())
}
