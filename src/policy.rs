//! Rate policies: mapping a partition key to the rate that applies to it.

use crate::error::BoxError;
use crate::rate::ThrottlingRate;
use async_trait::async_trait;

/// Produces the [`ThrottlingRate`] in force for a partition key.
///
/// Resolution is asynchronous so dynamic policies can consult external state
/// without blocking the request path. The engine re-evaluates the policy on
/// every request; an existing bucket adopts a changed rate without resetting
/// an unexpired count.
#[async_trait]
pub trait RatePolicy: Send + Sync {
    async fn resolve(&self, key: &str) -> Result<ThrottlingRate, BoxError>;
}

/// Policy that applies the same rate to every key.
#[derive(Debug, Clone)]
pub struct FixedRatePolicy {
    rate: ThrottlingRate,
}

impl FixedRatePolicy {
    pub fn new(rate: ThrottlingRate) -> Self {
        Self { rate }
    }

    pub fn rate(&self) -> &ThrottlingRate {
        &self.rate
    }
}

#[async_trait]
impl RatePolicy for FixedRatePolicy {
    async fn resolve(&self, _key: &str) -> Result<ThrottlingRate, BoxError> {
        Ok(self.rate.clone())
    }
}

/// Adapter turning a closure into a [`RatePolicy`], for tiered or computed
/// limits that do not need to await.
pub struct RateFn<F>(F);

impl<F> RateFn<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> RatePolicy for RateFn<F>
where
    F: Fn(&str) -> Result<ThrottlingRate, BoxError> + Send + Sync,
{
    async fn resolve(&self, key: &str) -> Result<ThrottlingRate, BoxError> {
        (self.0)(key)
    }
}
