//! Weather retrieval error types.

use chrono::NaiveDate;
use skycache_core::NetworkError;
use thiserror::Error;

/// Cache backend failures. A miss is not an error.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    Connection(String),

    #[error("Cache command failed: {0}")]
    Backend(String),
}

/// Upstream fetch failures.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transport-level failure: DNS, connect, TLS, timeout.
    #[error("Upstream unavailable: {0}")]
    Unavailable(#[from] NetworkError),

    /// The provider answered with a non-2xx status.
    #[error("Upstream returned status {status}")]
    Status { status: u16 },

    /// Headers arrived but the body could not be read.
    #[error("Failed to read upstream response body: {0}")]
    Body(String),
}

/// Payload decoding failures.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("Malformed weather payload: {0}")]
    MalformedPayload(String),

    #[error("Failed to encode weather payload: {0}")]
    Encode(String),
}

/// Errors surfaced by a single resolution.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("Location is required")]
    Validation,

    #[error("Cache error: {0}")]
    CacheBackend(CacheError),

    #[error("Cached weather data is corrupt: {0}")]
    CorruptCacheEntry(CodecError),

    #[error("Failed to fetch weather data: {0}")]
    UpstreamUnavailable(FetchError),

    #[error("Failed to read response body: {0}")]
    UpstreamRead(String),

    #[error("Failed to parse weather data: {0}")]
    UpstreamPayloadInvalid(CodecError),

    #[error("Request cancelled")]
    Cancelled,

    #[error("No forecast for {date} at {location}")]
    DayNotFound { location: String, date: NaiveDate },
}

impl ResolveError {
    /// User-friendly message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation => "Location is required".to_string(),
            Self::CacheBackend(_) => {
                "Weather cache is unavailable. Please try again later.".to_string()
            }
            Self::CorruptCacheEntry(_) | Self::UpstreamPayloadInvalid(_) => {
                "Failed to parse weather data".to_string()
            }
            Self::UpstreamUnavailable(FetchError::Unavailable(e)) => {
                format!("Failed to fetch weather data. {}", e.user_message())
            }
            Self::UpstreamUnavailable(FetchError::Status { status }) if *status == 400 => {
                "Location not recognised by the weather service.".to_string()
            }
            Self::UpstreamUnavailable(FetchError::Status { status })
                if *status == 401 || *status == 403 =>
            {
                "Weather service rejected the API key. Check settings.".to_string()
            }
            Self::UpstreamUnavailable(_) => {
                "Weather service unavailable. Please try again later.".to_string()
            }
            Self::UpstreamRead(_) => "Failed to read response from the weather service.".to_string(),
            Self::Cancelled => "Request cancelled".to_string(),
            Self::DayNotFound { date, .. } => format!("No forecast available for {}", date),
        }
    }

    /// Whether the caller is at fault (maps to 4xx on HTTP surfaces).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation | Self::DayNotFound { .. })
    }

    /// Short machine-readable kind, used in structured output and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::CacheBackend(_) => "cache_backend",
            Self::CorruptCacheEntry(_) => "corrupt_cache_entry",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::UpstreamRead(_) => "upstream_read",
            Self::UpstreamPayloadInvalid(_) => "upstream_payload_invalid",
            Self::Cancelled => "cancelled",
            Self::DayNotFound { .. } => "day_not_found",
        }
    }
}

impl From<FetchError> for ResolveError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Body(msg) => Self::UpstreamRead(msg),
            other => Self::UpstreamUnavailable(other),
        }
    }
}
