//! Itinera error types

use std::time::Duration;

/// Stable, machine-checkable category of an [`ItineraError`].
///
/// Outer layers (HTTP handlers, CLI) map on this rather than on individual
/// variants, so new variants can be added without breaking callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing input, or an expired OTP record.
    Validation,
    /// Unknown identity or resource.
    NotFound,
    /// Quota, attempt limit or cooldown exceeded. Carries a retry-after hint.
    RateLimit,
    /// Credential or OTP mismatch, or an action on someone else's resource.
    Unauthorized,
    /// Duplicate registration.
    Conflict,
    /// Generative model or mail service failure.
    Upstream,
    /// Store, serialization or configuration failure.
    Internal,
}

impl ErrorKind {
    /// Short identifier, stable across releases.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::RateLimit => "rate_limit",
            Self::Unauthorized => "unauthorized",
            Self::Conflict => "conflict",
            Self::Upstream => "upstream",
            Self::Internal => "internal",
        }
    }
}

/// Itinera error types
#[derive(Debug, thiserror::Error)]
pub enum ItineraError {
    // Caller errors
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{message}, retry after {}s", retry_after.as_secs())]
    RateLimited {
        message: String,
        retry_after: Duration,
    },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    // OTP errors
    /// No pending record: it was never issued, already consumed, or its TTL ran out.
    #[error("otp expired")]
    OtpExpired,

    #[error("otp does not match")]
    OtpMismatch,

    // Upstream errors
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("upstream error ({status}): {message}")]
    UpstreamStatus {
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),

    /// Model output did not match the expected response schema.
    #[error("response schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("mail delivery failed: {0}")]
    Mail(String),

    // Internal errors
    #[error("store error: {0}")]
    Store(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ItineraError {
    /// Shorthand for a rate-limit rejection.
    pub fn rate_limited(message: impl Into<String>, retry_after: Duration) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::OtpExpired => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::Unauthorized(_) | Self::OtpMismatch => ErrorKind::Unauthorized,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Upstream(_)
            | Self::UpstreamStatus { .. }
            | Self::Timeout(_)
            | Self::SchemaMismatch(_)
            | Self::Mail(_) => ErrorKind::Upstream,
            Self::Store(_) | Self::Json(_) | Self::Configuration(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status an outer layer should answer with.
    pub fn status(&self) -> u16 {
        match self {
            Self::Timeout(_) => 504,
            _ => match self.kind() {
                ErrorKind::Validation => 400,
                ErrorKind::NotFound => 404,
                ErrorKind::RateLimit => 429,
                ErrorKind::Unauthorized => 401,
                ErrorKind::Conflict => 409,
                ErrorKind::Upstream => 502,
                ErrorKind::Internal => 500,
            },
        }
    }

    /// Retry-after hint for rate-limit rejections.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            Self::UpstreamStatus { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Whether a repeated upstream call could plausibly succeed.
    ///
    /// Local rate limits are not transient: they are advisory to the caller
    /// and never retried internally.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Upstream(_) | Self::Timeout(_) | Self::SchemaMismatch(_) => true,
            Self::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<redis::RedisError> for ItineraError {
    fn from(err: redis::RedisError) -> Self {
        ItineraError::Store(err.to_string())
    }
}

/// Result type alias for Itinera operations
pub type Result<T> = std::result::Result<T, ItineraError>;
