//! The throttling rate: how many requests are allowed per time window.

use crate::error::ConfigError;
use std::fmt;
use std::time::Duration;

/// A validated rate: `limit` requests per `window`.
///
/// Both fields are checked at construction; a zero limit, a zero window, or an
/// unbounded window is a configuration error, so a `ThrottlingRate` in hand is
/// always usable for window arithmetic.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "RawThrottlingRate", into = "RawThrottlingRate")
)]
pub struct ThrottlingRate {
    limit: u32,
    window: Duration,
}

impl ThrottlingRate {
    /// Create a rate of `limit` requests per `window`.
    pub fn new(limit: u32, window: Duration) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        if window == Duration::ZERO || window == Duration::MAX {
            return Err(ConfigError::InvalidWindow(window));
        }
        Ok(Self { limit, window })
    }

    /// Maximum number of requests admitted within one window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// The counting window.
    pub fn window(&self) -> Duration {
        self.window
    }

    pub(crate) fn window_millis(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }
}

impl fmt::Display for ThrottlingRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requests per {:?}", self.limit, self.window)
    }
}

/// Unvalidated wire form; `ThrottlingRate` deserializes through this so that
/// serde input goes through the same checks as [`ThrottlingRate::new`].
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct RawThrottlingRate {
    limit: u32,
    window: Duration,
}

#[cfg(feature = "serde")]
impl TryFrom<RawThrottlingRate> for ThrottlingRate {
    type Error = ConfigError;

    fn try_from(raw: RawThrottlingRate) -> Result<Self, Self::Error> {
        ThrottlingRate::new(raw.limit, raw.window)
    }
}

#[cfg(feature = "serde")]
impl From<ThrottlingRate> for RawThrottlingRate {
    fn from(rate: ThrottlingRate) -> Self {
        Self { limit: rate.limit, window: rate.window }
    }
}
