//! The throttling engine: key resolution, rate resolution, admission.

use crate::bucket::Decision;
use crate::cleaner::Cleaner;
use crate::clock::{Clock, MonotonicClock};
use crate::error::{ConfigError, ResolutionError};
use crate::policy::{FixedRatePolicy, RatePolicy};
use crate::rate::ThrottlingRate;
use crate::resolver::{GlobalKey, KeyResolver};
use crate::store::BucketStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default sweep period when none is configured.
pub const DEFAULT_CLEANING_INTERVAL: Duration = Duration::from_secs(5);

/// Per-request throttling engine.
///
/// Resolves the partition key, resolves the rate in force for that key, and
/// runs the fixed-window admission check against the shared [`BucketStore`].
/// A background cleaner task evicts idle buckets so the key space stays
/// bounded by recent traffic rather than by everything ever seen.
///
/// Built via [`Throttler::builder`]; wrap it in a
/// [`ThrottleLayer`](crate::middleware::ThrottleLayer) to use it as tower
/// middleware, or call [`check`](Throttler::check) directly from a custom
/// handler chain.
pub struct Throttler<Req> {
    resolver: Arc<dyn KeyResolver<Req>>,
    policy: Arc<dyn RatePolicy>,
    store: Arc<BucketStore>,
    clock: Arc<dyn Clock>,
    cleaner: Cleaner,
}

impl<Req> std::fmt::Debug for Throttler<Req> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttler")
            .field("tracked_keys", &self.store.len())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl<Req: Send + Sync + 'static> Throttler<Req> {
    pub fn builder() -> ThrottlerBuilder<Req> {
        ThrottlerBuilder::new()
    }
}

impl<Req> Throttler<Req> {
    /// Decide whether `request` may proceed.
    ///
    /// Suspends only while the key and rate resolve; the admission check
    /// itself is synchronous and lock-minimal. A resolution failure fails
    /// this request only and leaves all bucket state untouched.
    pub async fn check(&self, request: &Req) -> Result<(String, Decision), ResolutionError> {
        let key = self
            .resolver
            .resolve(request)
            .await
            .map_err(ResolutionError::key)?
            .unwrap_or_default();
        let rate = self.policy.resolve(&key).await.map_err(ResolutionError::rate)?;

        let decision = self.store.try_admit(&key, &rate, self.clock.now_millis());
        if let Decision::Rejected { retry_after } = &decision {
            debug!(key = %key, %rate, ?retry_after, "request rejected by throttling");
        }
        Ok((key, decision))
    }

    /// Cancel the background cleaner. Idempotent; in-flight request decisions
    /// are unaffected.
    pub fn stop(&self) {
        self.cleaner.stop();
    }

    /// Number of partition keys currently holding a bucket.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

/// Builder for [`Throttler`]. Validation happens in [`build`](Self::build);
/// an invalid configuration never starts the engine.
pub struct ThrottlerBuilder<Req> {
    cleaning_interval: Duration,
    resolver: Option<Arc<dyn KeyResolver<Req>>>,
    rate: Option<ThrottlingRate>,
    policy: Option<Arc<dyn RatePolicy>>,
    clock: Option<Arc<dyn Clock>>,
}

impl<Req: Send + Sync + 'static> Default for ThrottlerBuilder<Req> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req: Send + Sync + 'static> ThrottlerBuilder<Req> {
    pub fn new() -> Self {
        Self {
            cleaning_interval: DEFAULT_CLEANING_INTERVAL,
            resolver: None,
            rate: None,
            policy: None,
            clock: None,
        }
    }

    /// How often idle buckets are swept. Must be positive and finite.
    pub fn cleaning_interval(mut self, interval: Duration) -> Self {
        self.cleaning_interval = interval;
        self
    }

    /// How requests are grouped into partitions. Defaults to [`GlobalKey`]
    /// (every request shares one bucket).
    pub fn key_resolver<R: KeyResolver<Req> + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Shorthand for a [`FixedRatePolicy`]: the same rate for every key.
    /// Mutually exclusive with [`rate_policy`](Self::rate_policy).
    pub fn rate(mut self, rate: ThrottlingRate) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Pluggable per-key rate policy. Mutually exclusive with
    /// [`rate`](Self::rate).
    pub fn rate_policy<P: RatePolicy + 'static>(mut self, policy: P) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Override the clock (useful for deterministic tests).
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Validate the configuration and start the engine (spawning the cleaner
    /// on the ambient tokio runtime).
    pub fn build(self) -> Result<Throttler<Req>, ConfigError> {
        if self.cleaning_interval == Duration::ZERO || self.cleaning_interval == Duration::MAX {
            return Err(ConfigError::InvalidCleaningInterval(self.cleaning_interval));
        }
        let policy: Arc<dyn RatePolicy> = match (self.rate, self.policy) {
            (Some(rate), None) => Arc::new(FixedRatePolicy::new(rate)),
            (None, Some(policy)) => policy,
            (None, None) => return Err(ConfigError::MissingRatePolicy),
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingRatePolicy),
        };
        let resolver = self.resolver.unwrap_or_else(|| Arc::new(GlobalKey));
        let clock = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::default()));

        let store = Arc::new(BucketStore::new());
        let cleaner =
            Cleaner::start(Arc::clone(&store), Arc::clone(&clock), self.cleaning_interval);

        Ok(Throttler { resolver, policy, store, clock, cleaner })
    }
}
