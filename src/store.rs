//! Concurrent registry of per-key buckets.

use crate::bucket::{Bucket, Decision};
use crate::rate::ThrottlingRate;
use dashmap::DashMap;

/// Owns every live [`Bucket`], keyed by partition key.
///
/// Backed by a sharded concurrent map: admissions for the same key serialize
/// on that key's entry, admissions for unrelated keys proceed in parallel,
/// and there is no lock spanning the whole key space. The store is the sole
/// authority for bucket creation and destruction; the request path never
/// removes a bucket.
#[derive(Debug, Default)]
pub struct BucketStore {
    buckets: DashMap<String, Bucket>,
}

impl BucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Obtain (or create) the bucket for `key` and attempt to admit one
    /// request at `now`.
    ///
    /// Insert-if-absent and the window check/increment run while the entry is
    /// held, so two concurrent requests for one key never both observe the
    /// last free slot, and a creation race never yields two buckets.
    pub fn try_admit(&self, key: &str, rate: &ThrottlingRate, now: u64) -> Decision {
        let mut entry = self
            .buckets
            .entry(key.to_owned())
            .or_insert_with(|| Bucket::new(rate.clone(), now));
        entry.value_mut().try_admit(rate, now)
    }

    /// Drop every bucket that has been inactive for at least its own window.
    /// Returns the number of buckets removed.
    ///
    /// Sweeping visits one shard at a time, so admissions on other keys keep
    /// flowing while it runs.
    pub fn sweep(&self, now: u64) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.expired(now));
        before.saturating_sub(self.buckets.len())
    }

    /// Number of live buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}
