use thiserror::Error;

/// Main error type for the metadata engine
#[derive(Error, Debug)]
pub enum AtlasError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP request errors
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request never produced a response (connection refused, reset, DNS)
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with HTTP 429
    #[error("Rate limited by upstream")]
    RateLimited,

    /// Every endpoint in the try-order failed
    #[error("All {attempted} endpoint(s) failed")]
    EndpointExhausted { attempted: usize },

    /// Unexpected HTTP status
    #[error("HTTP {status}")]
    HttpStatus { status: u16 },

    /// Provider errors
    #[error("Provider '{provider}' error: {message}")]
    Provider { provider: String, message: String },

    /// Storage refused a write because it would exceed the quota
    #[error("Storage quota exceeded ({size} bytes > {quota} bytes)")]
    QuotaExceeded { size: usize, quota: usize },

    /// Cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// No provider knew the subject
    #[error("No metadata found for query: {0}")]
    NotFound(String),

    /// Notification job errors
    #[error("Notify error: {0}")]
    Notify(String),

    /// Invalid configuration value
    #[error("Config error: {0}")]
    Config(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AtlasError {
    /// Failures worth another attempt: rate limiting and requests that never got an answer.
    pub fn is_transient(&self) -> bool {
        match self {
            AtlasError::RateLimited | AtlasError::Network(_) => true,
            AtlasError::HttpRequest(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AtlasError::RateLimited)
    }

    /// The request never got an answer at all. Rate limiting is an answer.
    pub fn is_unanswered(&self) -> bool {
        self.is_transient() && !self.is_rate_limited()
    }
}

impl From<String> for AtlasError {
    fn from(s: String) -> Self {
        AtlasError::Other(s)
    }
}

impl From<&str> for AtlasError {
    fn from(s: &str) -> Self {
        AtlasError::Other(s.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AtlasError>;
