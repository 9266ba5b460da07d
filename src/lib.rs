#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Floodgate
//!
//! Fixed-window request throttling for async Rust service chains: keyed
//! buckets, pluggable rate policies, and background cleanup.
//!
//! ## Features
//!
//! - **Fixed-window counting** per partition key (per API key, client,
//!   tenant, or one global bucket)
//! - **Pluggable key resolution and rate policies** via async traits
//! - **Concurrent bucket store** with per-key serialization and no global
//!   lock across keys
//! - **Background cleaner** that evicts idle buckets, bounding memory
//! - **Tower middleware** composing transparently with any downstream
//!   service
//! - **Injectable clock** for deterministic window tests
//!
//! ## Quick Start
//!
//! ```rust
//! use floodgate::{ThrottleLayer, Throttler, ThrottlingRate};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower_layer::Layer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), floodgate::ConfigError> {
//!     let throttler: Arc<Throttler<String>> = Arc::new(
//!         Throttler::builder()
//!             .rate(ThrottlingRate::new(100, Duration::from_secs(1))?)
//!             .build()?,
//!     );
//!
//!     // Wrap any tower service; admitted requests pass through unchanged,
//!     // rejected requests fail fast with `ThrottleError::RateLimited`.
//!     let layer = ThrottleLayer::new(Arc::clone(&throttler));
//!     let _service = layer.layer(tower::service_fn(|req: String| async move {
//!         Ok::<_, std::io::Error>(req)
//!     }));
//!
//!     throttler.stop();
//!     Ok(())
//! }
//! ```

pub mod bucket;
mod cleaner;
pub mod clock;
pub mod error;
pub mod middleware;
pub mod policy;
pub mod rate;
pub mod resolver;
pub mod store;
pub mod throttler;

// Re-exports
pub use bucket::Decision;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{
    BoxError, ConfigError, ResolutionError, ThrottleError, TOO_MANY_REQUESTS,
};
pub use middleware::{ThrottleLayer, ThrottleService};
pub use policy::{FixedRatePolicy, RateFn, RatePolicy};
pub use rate::ThrottlingRate;
pub use resolver::{GlobalKey, KeyFn, KeyResolver};
pub use store::BucketStore;
pub use throttler::{Throttler, ThrottlerBuilder, DEFAULT_CLEANING_INTERVAL};
