//! Background task that sweeps expired buckets.

use crate::clock::Clock;
use crate::store::BucketStore;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Handle to the recurring sweep task.
///
/// The task runs on the ambient tokio runtime, independently of the request
/// path, and keeps memory bounded by evicting buckets that have gone a full
/// window without activity. There is no `Drop`-based cancellation; owners
/// call [`Cleaner::stop`] explicitly at shutdown.
#[derive(Debug)]
pub(crate) struct Cleaner {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Cleaner {
    /// Spawn the sweep loop. Must be called within a tokio runtime.
    pub(crate) fn start(
        store: Arc<BucketStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; consume it so sweeps run
            // one interval after start.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let now = clock.now_millis();
                // A sweep that panics must not take the loop down with it;
                // the next occurrence still runs.
                match std::panic::catch_unwind(AssertUnwindSafe(|| store.sweep(now))) {
                    Ok(removed) => {
                        if removed > 0 {
                            debug!(removed, remaining = store.len(), "swept expired buckets");
                        }
                    }
                    Err(_) => {
                        warn!("bucket sweep panicked; skipping this occurrence");
                    }
                }
            }
        });
        Self { handle: Mutex::new(Some(handle)) }
    }

    /// Cancel future sweeps. Safe to call more than once; an in-flight sweep
    /// runs to completion because aborts only land at await points.
    pub(crate) fn stop(&self) {
        let taken = self.handle.lock().expect("cleaner handle lock poisoned").take();
        if let Some(handle) = taken {
            handle.abort();
        }
    }
}
