//! Partition key derivation.
//!
//! Every request is attributed to a partition key; requests sharing a key
//! share one rate budget. Resolution is asynchronous because the key may
//! depend on context that itself resolves asynchronously (for example an
//! authenticated-identity lookup).

use crate::error::BoxError;
use async_trait::async_trait;

/// Derives the partition key for a request.
///
/// Returning `Ok(None)` means the request carries no distinguishing
/// attribute; the engine maps it to the empty-string key, i.e. one global
/// bucket. Returning `Err` fails that request's future (the engine never
/// silently falls back to a default key on error, since that would move the
/// request into the wrong budget without anyone noticing).
#[async_trait]
pub trait KeyResolver<Req>: Send + Sync {
    async fn resolve(&self, request: &Req) -> Result<Option<String>, BoxError>;
}

/// Resolver that puts every request in one global bucket.
///
/// This is the default when no grouping is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalKey;

#[async_trait]
impl<Req: Sync> KeyResolver<Req> for GlobalKey {
    async fn resolve(&self, _request: &Req) -> Result<Option<String>, BoxError> {
        Ok(None)
    }
}

/// Adapter turning an infallible closure into a [`KeyResolver`].
///
/// Covers the common case of keying on a request attribute that is already
/// in hand (a header value, a client id). Implement [`KeyResolver`] directly
/// when resolution needs to await or can fail.
pub struct KeyFn<F>(F);

impl<F> KeyFn<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<Req, F> KeyResolver<Req> for KeyFn<F>
where
    Req: Sync,
    F: Fn(&Req) -> Option<String> + Send + Sync,
{
    async fn resolve(&self, request: &Req) -> Result<Option<String>, BoxError> {
        Ok((self.0)(request))
    }
}
