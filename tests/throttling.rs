//! End-to-end throttling behavior: window correctness, key isolation,
//! concurrent admission safety, eviction, and shutdown.

use floodgate::{
    KeyFn, ManualClock, RateFn, ThrottleError, ThrottleLayer, Throttler, ThrottlingRate,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tower::{service_fn, ServiceExt};
use tower_layer::Layer;
use tower_service::Service;

#[derive(Debug, Clone)]
struct Request {
    key: &'static str,
}

fn keyed_throttler(
    limit: u32,
    window: Duration,
    clock: ManualClock,
) -> Arc<Throttler<Request>> {
    Arc::new(
        Throttler::builder()
            .rate(ThrottlingRate::new(limit, window).unwrap())
            .key_resolver(KeyFn::new(|req: &Request| Some(req.key.to_string())))
            .clock(clock)
            .build()
            .unwrap(),
    )
}

async fn admitted(throttler: &Throttler<Request>, key: &'static str) -> bool {
    throttler.check(&Request { key }).await.unwrap().1.is_admitted()
}

#[tokio::test]
async fn limit_is_enforced_within_one_window() {
    let clock = ManualClock::new();
    let throttler = keyed_throttler(3, Duration::from_secs(1), clock.clone());

    for _ in 0..3 {
        assert!(admitted(&throttler, "a").await);
        clock.advance(100);
    }
    // Fourth request inside the same window is over the limit.
    assert!(!admitted(&throttler, "a").await);

    throttler.stop();
}

#[tokio::test]
async fn window_rollover_restores_the_budget() {
    let clock = ManualClock::new();
    let throttler = keyed_throttler(2, Duration::from_secs(1), clock.clone());

    assert!(admitted(&throttler, "a").await);
    assert!(admitted(&throttler, "a").await);
    assert!(!admitted(&throttler, "a").await);

    clock.advance(1_000);
    // The previous window's count is discarded on rollover.
    assert!(admitted(&throttler, "a").await);
    assert!(admitted(&throttler, "a").await);
    assert!(!admitted(&throttler, "a").await);

    throttler.stop();
}

#[tokio::test]
async fn saturating_one_key_leaves_others_untouched() {
    let clock = ManualClock::new();
    let throttler = keyed_throttler(1, Duration::from_secs(1), clock.clone());

    assert!(admitted(&throttler, "a").await);
    assert!(!admitted(&throttler, "a").await);
    assert!(!admitted(&throttler, "a").await);

    assert!(admitted(&throttler, "b").await);
    assert!(admitted(&throttler, "c").await);
    assert_eq!(throttler.tracked_keys(), 3);

    throttler.stop();
}

/// Rate(2, 1s): requests for "A" at t=0 and t=0.5s are admitted, t=0.9s is
/// rejected, t=1.1s is admitted again on the new window, and "B" at t=1.1s
/// is independently admitted.
#[tokio::test]
async fn documented_two_per_second_scenario() {
    let clock = ManualClock::new();
    let throttler = keyed_throttler(2, Duration::from_secs(1), clock.clone());

    assert!(admitted(&throttler, "A").await);
    clock.advance(500);
    assert!(admitted(&throttler, "A").await);
    clock.advance(400);
    assert!(!admitted(&throttler, "A").await);
    clock.advance(200);
    assert!(admitted(&throttler, "A").await);
    assert!(admitted(&throttler, "B").await);

    throttler.stop();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_requests_admit_exactly_the_limit() {
    let clock = ManualClock::new();
    let throttler = keyed_throttler(10, Duration::from_secs(60), clock);

    let attempts: Vec<_> = (0..100)
        .map(|_| {
            let throttler = Arc::clone(&throttler);
            tokio::spawn(async move { admitted(&throttler, "hot").await })
        })
        .collect();
    let admitted_count =
        join_all(attempts).await.into_iter().filter(|outcome| *outcome.as_ref().unwrap()).count();

    assert_eq!(admitted_count, 10);

    throttler.stop();
}

#[tokio::test(start_paused = true)]
async fn idle_buckets_are_swept_and_active_ones_retained() {
    let clock = ManualClock::new();
    let throttler = Arc::new(
        Throttler::builder()
            .rate(ThrottlingRate::new(5, Duration::from_secs(1)).unwrap())
            .key_resolver(KeyFn::new(|req: &Request| Some(req.key.to_string())))
            .clock(clock.clone())
            .cleaning_interval(Duration::from_secs(5))
            .build()
            .unwrap(),
    );

    admitted(&throttler, "idle").await;
    clock.advance(4_900);
    // "busy" was active within its window when the sweep fires.
    admitted(&throttler, "busy").await;
    clock.advance(100);
    assert_eq!(throttler.tracked_keys(), 2);

    // Cross the first cleaning interval.
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(throttler.tracked_keys(), 1);

    // Still enforcing for the retained bucket.
    assert!(admitted(&throttler, "busy").await);

    throttler.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_halts_eviction() {
    let clock = ManualClock::new();
    let throttler = Arc::new(
        Throttler::builder()
            .rate(ThrottlingRate::new(1, Duration::from_millis(10)).unwrap())
            .key_resolver(KeyFn::new(|req: &Request| Some(req.key.to_string())))
            .clock(clock.clone())
            .cleaning_interval(Duration::from_secs(1))
            .build()
            .unwrap(),
    );

    admitted(&throttler, "a").await;
    throttler.stop();
    throttler.stop();

    clock.advance(3_600_000);
    tokio::time::sleep(Duration::from_secs(30)).await;
    // The bucket is long expired, but no sweep runs once stopped.
    assert_eq!(throttler.tracked_keys(), 1);

    // Decisions still work after stop; only cleanup is halted.
    assert!(admitted(&throttler, "b").await);
}

#[tokio::test]
async fn tiered_policy_applies_per_key_limits() {
    let clock = ManualClock::new();
    let throttler: Arc<Throttler<Request>> = Arc::new(
        Throttler::builder()
            .rate_policy(RateFn::new(|key: &str| {
                let limit = if key == "gold" { 3 } else { 1 };
                ThrottlingRate::new(limit, Duration::from_secs(1)).map_err(Into::into)
            }))
            .key_resolver(KeyFn::new(|req: &Request| Some(req.key.to_string())))
            .clock(clock)
            .build()
            .unwrap(),
    );

    assert!(admitted(&throttler, "gold").await);
    assert!(admitted(&throttler, "gold").await);
    assert!(admitted(&throttler, "gold").await);
    assert!(!admitted(&throttler, "gold").await);

    assert!(admitted(&throttler, "basic").await);
    assert!(!admitted(&throttler, "basic").await);

    throttler.stop();
}

#[tokio::test]
async fn middleware_full_path_admit_then_reject() {
    let clock = ManualClock::new();
    let throttler = keyed_throttler(1, Duration::from_secs(1), clock.clone());

    let mut service = ThrottleLayer::new(Arc::clone(&throttler)).layer(service_fn(
        |req: Request| async move { Ok::<_, std::io::Error>(req.key.to_uppercase()) },
    ));

    let response = service.ready().await.unwrap().call(Request { key: "acme" }).await.unwrap();
    assert_eq!(response, "ACME");

    let err = service
        .ready()
        .await
        .unwrap()
        .call(Request { key: "acme" })
        .await
        .expect_err("over the limit");
    match err {
        ThrottleError::RateLimited { key, retry_after } => {
            assert_eq!(key, "acme");
            assert!(retry_after <= Duration::from_secs(1));
        }
        other => panic!("expected RateLimited, got {:?}", other),
    }

    throttler.stop();
}
