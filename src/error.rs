//! Error types for the throttling engine.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Boxed error type accepted from pluggable resolvers and policies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The HTTP status a gateway should map a rate-limited rejection to
/// (429 Too Many Requests). This crate stays transport-agnostic, so the
/// mapping is exposed as data rather than a response object.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Configuration errors raised while building a [`Throttler`](crate::Throttler).
///
/// These are fatal: construction fails and the engine is never started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The rate limit must admit at least one request per window.
    #[error("rate limit must be > 0")]
    ZeroLimit,
    /// The rate window must be positive and finite.
    #[error("rate window must be positive and finite (got {0:?})")]
    InvalidWindow(Duration),
    /// The cleaning interval must be positive and finite.
    #[error("cleaning interval must be positive and finite (got {0:?})")]
    InvalidCleaningInterval(Duration),
    /// Neither a fixed rate nor a rate policy was supplied.
    #[error("either a fixed rate or a rate policy is required")]
    MissingRatePolicy,
    /// Both a fixed rate and a rate policy were supplied.
    #[error("a fixed rate and a rate policy are mutually exclusive")]
    ConflictingRatePolicy,
}

/// A per-request failure while resolving the partition key or the rate.
///
/// Isolated to the request that triggered it: other requests and existing
/// bucket state are unaffected. The source error is shared behind an `Arc` so
/// the variant stays cloneable.
#[derive(Debug, Clone)]
pub enum ResolutionError {
    /// The key resolver failed for this request.
    Key(Arc<BoxError>),
    /// The rate policy failed for the resolved key.
    Rate(Arc<BoxError>),
}

impl ResolutionError {
    pub(crate) fn key(source: BoxError) -> Self {
        Self::Key(Arc::new(source))
    }

    pub(crate) fn rate(source: BoxError) -> Self {
        Self::Rate(Arc::new(source))
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(source) => write!(f, "failed to resolve partition key: {}", source),
            Self::Rate(source) => write!(f, "failed to resolve throttling rate: {}", source),
        }
    }
}

impl std::error::Error for ResolutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Key(source) | Self::Rate(source) => Some(source.as_ref().as_ref()),
        }
    }
}

/// Unified error type surfaced by the throttling middleware.
///
/// Generic over the downstream service's error so that downstream failures
/// propagate unchanged through [`ThrottleError::Inner`].
#[derive(Debug, Clone)]
pub enum ThrottleError<E> {
    /// The request's partition exhausted its budget for the current window.
    RateLimited {
        /// Partition key whose bucket rejected the request.
        key: String,
        /// Time until the current window rolls over.
        retry_after: Duration,
    },
    /// Key or rate resolution failed for this request.
    Resolution(ResolutionError),
    /// The downstream service failed.
    Inner(E),
}

impl<E> From<ResolutionError> for ThrottleError<E> {
    fn from(err: ResolutionError) -> Self {
        Self::Resolution(err)
    }
}

impl<E: fmt::Display> fmt::Display for ThrottleError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited { key, retry_after } => {
                if key.is_empty() {
                    write!(f, "rate limited (retry after {:?})", retry_after)
                } else {
                    write!(f, "rate limited for '{}' (retry after {:?})", key, retry_after)
                }
            }
            Self::Resolution(err) => write!(f, "{}", err),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ThrottleError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RateLimited { .. } => None,
            Self::Resolution(err) => Some(err),
            Self::Inner(e) => Some(e),
        }
    }
}

impl<E> ThrottleError<E> {
    /// Check if this error is a rate-limit rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Check if this error comes from key/rate resolution.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }

    /// Check if this error wraps a downstream error.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// Suggested wait before retrying, if rate limited.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// HTTP status for this error, where one is defined
    /// ([`TOO_MANY_REQUESTS`] for rate-limit rejections).
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(TOO_MANY_REQUESTS),
            _ => None,
        }
    }

    /// Get the downstream error if this is an `Inner` variant.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Borrow the downstream error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}
