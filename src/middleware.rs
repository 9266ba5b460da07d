//! Tower middleware that enforces throttling in front of a downstream service.

use crate::bucket::Decision;
use crate::error::ThrottleError;
use crate::throttler::Throttler;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// A layer that throttles requests using a shared [`Throttler`].
#[derive(Debug)]
pub struct ThrottleLayer<Req> {
    throttler: Arc<Throttler<Req>>,
}

impl<Req> ThrottleLayer<Req> {
    /// Create a throttling layer.
    ///
    /// The throttler is taken as an `Arc` so the caller keeps a handle for
    /// [`Throttler::stop`] at shutdown.
    pub fn new(throttler: Arc<Throttler<Req>>) -> Self {
        Self { throttler }
    }
}

impl<Req> Clone for ThrottleLayer<Req> {
    fn clone(&self) -> Self {
        Self { throttler: Arc::clone(&self.throttler) }
    }
}

impl<S, Req> Layer<S> for ThrottleLayer<Req> {
    type Service = ThrottleService<S, Req>;

    fn layer(&self, service: S) -> Self::Service {
        ThrottleService { inner: service, throttler: Arc::clone(&self.throttler) }
    }
}

/// Middleware service produced by [`ThrottleLayer`].
///
/// Admitted requests are forwarded and the downstream future's outcome is
/// returned unchanged (success and error alike, through
/// [`ThrottleError::Inner`]); rejected requests complete immediately with
/// [`ThrottleError::RateLimited`] without touching the downstream service.
#[derive(Debug)]
pub struct ThrottleService<S, Req> {
    inner: S,
    throttler: Arc<Throttler<Req>>,
}

impl<S: Clone, Req> Clone for ThrottleService<S, Req> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), throttler: Arc::clone(&self.throttler) }
    }
}

impl<S, Req> Service<Req> for ThrottleService<S, Req>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + Sync + 'static,
{
    type Response = S::Response;
    type Error = ThrottleError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(ThrottleError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let throttler = Arc::clone(&self.throttler);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match throttler.check(&req).await {
                Ok((_, Decision::Admitted { .. })) => {
                    inner.call(req).await.map_err(ThrottleError::Inner)
                }
                Ok((key, Decision::Rejected { retry_after })) => {
                    Err(ThrottleError::RateLimited { key, retry_after })
                }
                Err(resolution) => Err(resolution.into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate::ThrottlingRate;
    use crate::resolver::KeyFn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::{service_fn, ServiceExt};

    #[derive(Debug)]
    struct Request {
        tenant: &'static str,
    }

    fn throttler(limit: u32, clock: ManualClock) -> Arc<Throttler<Request>> {
        Arc::new(
            Throttler::builder()
                .rate(ThrottlingRate::new(limit, Duration::from_secs(1)).unwrap())
                .key_resolver(KeyFn::new(|req: &Request| Some(req.tenant.to_string())))
                .clock(clock)
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn admitted_requests_pass_through_unchanged() {
        let clock = ManualClock::new();
        let throttler = throttler(2, clock);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_service = Arc::clone(&calls);

        let mut service = ThrottleLayer::new(Arc::clone(&throttler)).layer(service_fn(
            move |req: Request| {
                let calls = Arc::clone(&calls_in_service);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::io::Error>(format!("hello {}", req.tenant))
                }
            },
        ));

        let response =
            service.ready().await.unwrap().call(Request { tenant: "acme" }).await.unwrap();
        assert_eq!(response, "hello acme");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        throttler.stop();
    }

    #[tokio::test]
    async fn rejected_requests_never_reach_the_downstream_service() {
        let clock = ManualClock::new();
        let throttler = throttler(1, clock);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_service = Arc::clone(&calls);

        let mut service = ThrottleLayer::new(Arc::clone(&throttler)).layer(service_fn(
            move |_req: Request| {
                let calls = Arc::clone(&calls_in_service);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::io::Error>(())
                }
            },
        ));

        service.ready().await.unwrap().call(Request { tenant: "acme" }).await.unwrap();
        let err = service
            .ready()
            .await
            .unwrap()
            .call(Request { tenant: "acme" })
            .await
            .expect_err("second request is over the limit");
        assert!(err.is_rate_limited());
        assert_eq!(err.status_code(), Some(crate::error::TOO_MANY_REQUESTS));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        throttler.stop();
    }

    #[tokio::test]
    async fn downstream_errors_propagate_unchanged() {
        let clock = ManualClock::new();
        let throttler = throttler(5, clock);

        let mut service =
            ThrottleLayer::new(Arc::clone(&throttler)).layer(service_fn(|_req: Request| async {
                Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "backend down"))
            }));

        let err = service
            .ready()
            .await
            .unwrap()
            .call(Request { tenant: "acme" })
            .await
            .expect_err("downstream failure");
        match err {
            ThrottleError::Inner(e) => assert_eq!(e.to_string(), "backend down"),
            other => panic!("expected Inner, got {:?}", other),
        }

        throttler.stop();
    }
}
