//! Error types for media-dl
//!
//! This module provides the closed error taxonomy for the library:
//! - One variant per caller-visible failure kind (invalid reference, auth
//!   required, not found, content unavailable, too large, rate limited or
//!   timed out, tool missing, internal)
//! - `#[from]` conversions for transport-level errors (I/O, HTTP, JSON)
//!   that fold into the closed kind set via [`Error::kind`]
//! - The aggregate-failure precedence rule used when every strategy in a
//!   fallback chain has failed

use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum length of a diagnostic excerpt carried in an error detail.
///
/// Tool stderr and upstream API bodies are truncated to this length before
/// they become part of an error, so raw diagnostics never leak to end users
/// beyond a bounded excerpt.
pub const MAX_DETAIL_LEN: usize = 200;

/// Main error type for media-dl
///
/// Every failure that crosses the resolver boundary is one of these variants
/// plus a short human-readable detail. Transport errors (`Io`, `Network`,
/// `Serialization`) are accepted via `#[from]` for ergonomic `?` use inside
/// the crate and are mapped onto the closed kind set by [`Error::kind`].
#[derive(Debug, Error)]
pub enum Error {
    /// Input is empty, malformed, or not resolvable to any platform
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// The operation needs a credential that is missing or rejected
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    /// The referenced content does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The content exists but cannot be retrieved (private, removed, geo-blocked)
    #[error("content unavailable: {0}")]
    ContentUnavailable(String),

    /// A retrieved file exceeds the configured size limit
    #[error("file too large: {} limit is {limit} bytes", size.map(|s| format!("{s} bytes,")).unwrap_or_default())]
    TooLarge {
        /// Size of the offending file in bytes, when known
        size: Option<u64>,
        /// The configured maximum size in bytes
        limit: u64,
    },

    /// The upstream service throttled us or an operation hit its deadline
    #[error("rate limited or timed out: {0}")]
    RateLimitedOrTimeout(String),

    /// A required external extractor binary is not installed
    #[error("external tool missing: {0}")]
    ToolMissing(String),

    /// Unexpected failure with no more specific classification
    #[error("internal error: {0}")]
    Internal(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_file_size")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The closed set of caller-visible failure kinds
///
/// Chat-transport collaborators branch on this, never on error strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input is not a resolvable reference
    InvalidReference,
    /// A credential is required and missing/rejected
    AuthenticationRequired,
    /// The content does not exist
    NotFound,
    /// The content exists but cannot be retrieved
    ContentUnavailable,
    /// The media exceeds the configured size limit
    TooLarge,
    /// Throttled or deadline exceeded
    RateLimitedOrTimeout,
    /// Required external binary is not installed
    ToolMissing,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Precedence used when synthesizing an aggregate failure.
    ///
    /// Actionable kinds outrank generic ones so that a user who needs to log
    /// in is told so even if a later strategy also timed out:
    /// AuthenticationRequired > TooLarge > ContentUnavailable > NotFound >
    /// RateLimitedOrTimeout > ToolMissing > Internal.
    fn precedence(self) -> u8 {
        match self {
            ErrorKind::AuthenticationRequired => 7,
            ErrorKind::TooLarge => 6,
            ErrorKind::ContentUnavailable => 5,
            ErrorKind::NotFound => 4,
            ErrorKind::RateLimitedOrTimeout => 3,
            ErrorKind::ToolMissing => 2,
            ErrorKind::InvalidReference => 1,
            ErrorKind::Internal => 0,
        }
    }
}

impl Error {
    /// Map this error onto the closed kind set.
    ///
    /// Transport errors are classified by shape: HTTP timeouts and connect
    /// failures become `RateLimitedOrTimeout`, status codes map to the kind a
    /// caller can act on, and everything else is `Internal`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidReference(_) => ErrorKind::InvalidReference,
            Error::AuthenticationRequired(_) => ErrorKind::AuthenticationRequired,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::ContentUnavailable(_) => ErrorKind::ContentUnavailable,
            Error::TooLarge { .. } => ErrorKind::TooLarge,
            Error::RateLimitedOrTimeout(_) => ErrorKind::RateLimitedOrTimeout,
            Error::ToolMissing(_) => ErrorKind::ToolMissing,
            Error::Internal(_) => ErrorKind::Internal,
            Error::Config { .. } => ErrorKind::Internal,
            Error::Io(_) => ErrorKind::Internal,
            Error::Network(e) => {
                if e.is_timeout() || e.is_connect() {
                    ErrorKind::RateLimitedOrTimeout
                } else if let Some(status) = e.status() {
                    match status.as_u16() {
                        401 | 403 => ErrorKind::AuthenticationRequired,
                        404 | 410 => ErrorKind::NotFound,
                        429 => ErrorKind::RateLimitedOrTimeout,
                        _ => ErrorKind::ContentUnavailable,
                    }
                } else {
                    ErrorKind::Internal
                }
            }
            Error::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Synthesize a single aggregate failure from the errors collected while
    /// driving a fallback chain.
    ///
    /// Picks the error whose kind has the highest precedence; the first
    /// occurrence wins among ties, so the detail reflects the earliest
    /// strategy that observed the winning condition.
    pub fn aggregate(errors: Vec<Error>) -> Error {
        let mut best: Option<Error> = None;
        for error in errors {
            let replace = match &best {
                None => true,
                Some(current) => error.kind().precedence() > current.kind().precedence(),
            };
            if replace {
                best = Some(error);
            }
        }
        best.unwrap_or_else(|| Error::Internal("no strategies were attempted".to_string()))
    }
}

/// Truncate a diagnostic string to [`MAX_DETAIL_LEN`] characters.
///
/// Used wherever tool stderr or upstream response bodies are folded into an
/// error detail.
pub fn truncate_detail(detail: &str) -> String {
    let trimmed = detail.trim();
    if trimmed.chars().count() <= MAX_DETAIL_LEN {
        trimmed.to_string()
    } else {
        let excerpt: String = trimmed.chars().take(MAX_DETAIL_LEN).collect();
        format!("{excerpt}...")
    }
}
