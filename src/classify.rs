//! Platform classification for input references
//!
//! Classification is data-driven: a fixed, ordered table of per-platform
//! regex pattern lists. The first platform with any matching pattern wins,
//! so an ambiguous input always classifies the same way.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Platform a reference was classified to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformTag {
    /// Deezer track, album, or playlist URL
    Deezer,
    /// Reddit post URL (including short and share links)
    Reddit,
    /// Instagram post or reel URL
    Instagram,
    /// TikTok video URL (including short links)
    TikTok,
    /// Not a URL at all; treated as a catalog search query
    FreeTextQuery,
    /// A URL, but not one any platform handles
    Unknown,
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlatformTag::Deezer => "deezer",
            PlatformTag::Reddit => "reddit",
            PlatformTag::Instagram => "instagram",
            PlatformTag::TikTok => "tiktok",
            PlatformTag::FreeTextQuery => "query",
            PlatformTag::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

struct PlatformPatterns {
    tag: PlatformTag,
    patterns: Vec<Regex>,
}

// Patterns are compile-time constants; a failure here is a programming
// error caught by the tests below.
#[allow(clippy::expect_used)]
fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("invalid platform pattern"))
        .collect()
}

/// Ordered platform pattern table. Order is part of the contract: the first
/// platform with a matching pattern wins.
static PLATFORM_TABLE: LazyLock<Vec<PlatformPatterns>> = LazyLock::new(|| {
    vec![
        PlatformPatterns {
            tag: PlatformTag::Deezer,
            patterns: compile(&[
                r"deezer\.com/(?:[a-z]{2}/)?track/(\d+)",
                r"deezer\.com/(?:[a-z]{2}/)?album/(\d+)",
                r"deezer\.com/(?:[a-z]{2}/)?playlist/(\d+)",
            ]),
        },
        PlatformPatterns {
            tag: PlatformTag::Reddit,
            patterns: compile(&[
                r"reddit\.com/r/\w+/comments/\w+",
                r"redd\.it/\w+",
                r"old\.reddit\.com/r/\w+/comments/\w+",
                r"reddit\.com/r/\w+/s/\w+",
            ]),
        },
        PlatformPatterns {
            tag: PlatformTag::Instagram,
            patterns: compile(&[
                r"instagram\.com/p/[\w-]+",
                r"instagram\.com/reel/[\w-]+",
                r"instagr\.am/p/[\w-]+",
            ]),
        },
        PlatformPatterns {
            tag: PlatformTag::TikTok,
            patterns: compile(&[
                r"tiktok\.com/@[\w.-]+/video/\d+",
                r"vm\.tiktok\.com/[\w-]+",
                r"tiktok\.com/t/[\w-]+",
            ]),
        },
    ]
});

/// Classify an input string into a [`PlatformTag`].
///
/// Inputs with no URL scheme and no platform match are treated as free-text
/// search queries; URLs no platform claims are [`PlatformTag::Unknown`].
pub fn classify(input: &str) -> PlatformTag {
    let trimmed = input.trim();
    for entry in PLATFORM_TABLE.iter() {
        if entry.patterns.iter().any(|p| p.is_match(trimmed)) {
            return entry.tag;
        }
    }
    if Url::parse(trimmed).is_ok() {
        PlatformTag::Unknown
    } else {
        PlatformTag::FreeTextQuery
    }
}

/// The Deezer entity family a URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeezerEntity {
    /// A single track
    Track,
    /// An album; resolved to its first track
    Album,
    /// A playlist; resolved to its first track
    Playlist,
}

static DEEZER_ENTITY_TABLE: LazyLock<Vec<(DeezerEntity, Regex)>> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    let build = |kind: &str| {
        Regex::new(&format!(r"(?i)deezer\.com/(?:[a-z]{{2}}/)?{kind}/(\d+)"))
            .expect("invalid deezer entity pattern")
    };
    vec![
        (DeezerEntity::Track, build("track")),
        (DeezerEntity::Album, build("album")),
        (DeezerEntity::Playlist, build("playlist")),
    ]
});

/// Extract the Deezer entity kind and numeric id from a URL, if present.
pub fn deezer_entity(input: &str) -> Option<(DeezerEntity, u64)> {
    for (entity, pattern) in DEEZER_ENTITY_TABLE.iter() {
        if let Some(caps) = pattern.captures(input) {
            if let Some(id) = caps.get(1).and_then(|m| m.as_str().parse().ok()) {
                return Some((*entity, id));
            }
        }
    }
    None
}
