//! Per-partition counting state and the fixed-window admission algorithm.

use crate::rate::ThrottlingRate;
use std::time::Duration;

/// The outcome of one admission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed to the downstream handler.
    Admitted {
        /// Slots left in the current window after this admission.
        /// Useful for `X-RateLimit-Remaining` headers in wrapping code.
        remaining: u32,
    },
    /// The request must be rejected.
    Rejected {
        /// Time until the current window rolls over.
        /// Useful for `Retry-After` headers in wrapping code.
        retry_after: Duration,
    },
}

impl Decision {
    /// Helper to check if admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }
}

/// Counting state for one partition key.
///
/// All timestamps are clock milliseconds. A bucket is only ever touched while
/// its store entry is held (see [`BucketStore`](crate::store::BucketStore)),
/// so the fields need no interior synchronization of their own.
#[derive(Debug)]
pub(crate) struct Bucket {
    window_start: u64,
    count: u32,
    rate: ThrottlingRate,
    last_access: u64,
}

impl Bucket {
    pub(crate) fn new(rate: ThrottlingRate, now: u64) -> Self {
        Self { window_start: now, count: 0, rate, last_access: now }
    }

    /// Fixed-window admission: reset if the window elapsed, then admit while
    /// `count < limit`. Bursts straddling a window boundary can reach 2× the
    /// limit in the worst case; that is the documented behavior of this
    /// scheme, not something to smooth over.
    pub(crate) fn try_admit(&mut self, rate: &ThrottlingRate, now: u64) -> Decision {
        // A re-resolved rate is adopted in place; an unexpired count carries
        // over rather than restarting the window.
        if *rate != self.rate {
            self.rate = rate.clone();
        }
        let window = self.rate.window_millis();
        if now.saturating_sub(self.window_start) >= window {
            self.window_start = now;
            self.count = 0;
        }
        self.last_access = now;

        if self.count < self.rate.limit() {
            self.count += 1;
            Decision::Admitted { remaining: self.rate.limit() - self.count }
        } else {
            let window_end = self.window_start.saturating_add(window);
            Decision::Rejected {
                retry_after: Duration::from_millis(window_end.saturating_sub(now)),
            }
        }
    }

    /// A bucket is expired once it has seen no activity for a full window.
    pub(crate) fn expired(&self, now: u64) -> bool {
        now.saturating_sub(self.last_access) >= self.rate.window_millis()
    }
}
