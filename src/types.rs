//! Core data types for media references, retrieved files, and candidates

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::{self, PlatformTag};
use crate::error::Result;

/// Video file extensions recognized by the media scan
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];

/// Audio file extensions recognized by the media scan
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "wav", "ogg", "flac"];

/// Image file extensions recognized by the media scan
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Broad media category derived from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio track (mp3, m4a, ...)
    Audio,
    /// Video clip (mp4, webm, ...)
    Video,
    /// Still image (jpg, png, ...)
    Image,
    /// Anything else a tool produced
    Document,
}

impl MediaKind {
    /// Classify a path by its extension, case-insensitively.
    pub fn from_path(path: &Path) -> MediaKind {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Audio
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Image
        } else {
            MediaKind::Document
        }
    }
}

/// True when the path carries one of the known media extensions.
///
/// Tool output directories can contain partial files, json sidecars, and
/// thumbnails; the scan keeps only paths this accepts.
pub fn is_media_extension(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
                || AUDIO_EXTENSIONS.contains(&ext.as_str())
                || IMAGE_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// A classified input reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    /// The caller's input, trimmed
    pub raw: String,
    /// Platform the reference was classified to
    pub platform: PlatformTag,
}

impl MediaReference {
    /// Classify an input string into a reference.
    pub fn classify(input: &str) -> MediaReference {
        let raw = input.trim().to_string();
        let platform = classify::classify(&raw);
        MediaReference { raw, platform }
    }
}

/// A staged file on local disk produced by a successful retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Absolute path inside the staging area
    pub path: PathBuf,
    /// Size in bytes at staging time
    pub size_bytes: u64,
    /// Broad media category
    pub kind: MediaKind,
}

impl LocalFile {
    /// Build a `LocalFile` from an on-disk path, reading its metadata.
    pub fn from_path(path: PathBuf) -> Result<LocalFile> {
        let metadata = std::fs::metadata(&path)?;
        let kind = MediaKind::from_path(&path);
        Ok(LocalFile {
            path,
            size_bytes: metadata.len(),
            kind,
        })
    }
}

/// The product of a successful retrieval: one or more staged files plus a
/// human-readable title
#[derive(Debug, Clone)]
pub struct Retrieved {
    /// Staged files, in the order the producing strategy discovered them
    pub files: Vec<LocalFile>,
    /// Display title (track title, post title, or filename stem)
    pub title: String,
}

/// A catalog search hit offered for disambiguation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackCandidate {
    /// Catalog track id, usable with a track resolve
    pub id: u64,
    /// Track title
    pub title: String,
    /// Artist name
    pub artist: String,
    /// Duration in seconds
    pub duration_secs: u32,
    /// Cover artwork URL, when the catalog provides one
    pub artwork_url: Option<String>,
    /// Short preview clip URL, when the catalog provides one
    pub preview_url: Option<String>,
}

/// Outcome of a resolve: either staged media or a candidate list that needs a
/// follow-up choice from the caller
#[derive(Debug)]
pub enum Resolution {
    /// Media was retrieved and staged
    Media(Retrieved),
    /// The input was a free-text query; these are the matching tracks
    Candidates(Vec<TrackCandidate>),
}
