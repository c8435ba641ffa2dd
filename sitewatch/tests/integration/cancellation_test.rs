//! キャンセルとシャットダウンの統合テスト

use crate::support::{coordinator, target, CacheSpy, MemorySink, SlowProber, StaticSource};
use sitewatch::health::{BatchState, HttpProber, Scheduler};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn cancel_mid_batch_returns_promptly_without_invalidation() {
    let targets = (0..6)
        .map(|i| target(&format!("slow{}.example.com", i)))
        .collect();
    let source = Arc::new(StaticSource::new(targets));
    let sink = Arc::new(MemorySink::default());
    let cache = Arc::new(CacheSpy::default());
    let prober = Arc::new(SlowProber::new(Duration::from_secs(30)));
    let c = Arc::new(coordinator(&source, &sink, &cache, prober.clone()).with_worker_count(2));

    let cancel = CancellationToken::new();
    let task = {
        let c = Arc::clone(&c);
        let cancel = cancel.clone();
        tokio::spawn(async move { c.run_batch(&cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("batch did not stop after cancellation")
        .unwrap();

    assert!(outcome.unwrap_err().is_cancelled());
    assert!(prober.calls.load(Ordering::SeqCst) <= 2);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    assert_eq!(cache.calls(), 0);
    assert_eq!(c.state(), BatchState::Failed);
}

#[tokio::test]
async fn cancel_interrupts_in_flight_http_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(8)))
        .mount(&server)
        .await;

    let source = Arc::new(StaticSource::new(vec![target(&server.uri())]));
    let sink = Arc::new(MemorySink::default());
    let cache = Arc::new(CacheSpy::default());
    let prober = Arc::new(HttpProber::with_timeout(Duration::from_secs(10)).unwrap());
    let c = Arc::new(coordinator(&source, &sink, &cache, prober));

    let cancel = CancellationToken::new();
    let task = {
        let c = Arc::clone(&c);
        let cancel = cancel.clone();
        tokio::spawn(async move { c.run_batch(&cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("in-flight probe was not interrupted")
        .unwrap();
    assert!(outcome.unwrap_err().is_cancelled());
    assert_eq!(cache.calls(), 0);
}

#[tokio::test]
async fn stopping_scheduler_mid_batch_finishes_cleanly() {
    let source = Arc::new(StaticSource::new(vec![target("a.example.com")]));
    let sink = Arc::new(MemorySink::default());
    let cache = Arc::new(CacheSpy::default());
    let prober = Arc::new(SlowProber::new(Duration::from_secs(30)));
    let c = coordinator(&source, &sink, &cache, prober);

    let root = CancellationToken::new();
    let handle = Scheduler::new(Arc::new(c)).start(&root, Duration::from_secs(60));

    tokio::time::sleep(Duration::from_millis(100)).await;
    tokio::time::timeout(Duration::from_secs(2), handle.stop())
        .await
        .expect("scheduler did not stop")
        .unwrap();

    assert!(!root.is_cancelled(), "stopping a handle leaves the parent alone");
    assert_eq!(cache.calls(), 0);
}

#[tokio::test]
async fn root_shutdown_stops_scheduler() {
    let source = Arc::new(StaticSource::new(Vec::new()));
    let sink = Arc::new(MemorySink::default());
    let cache = Arc::new(CacheSpy::default());
    let prober = Arc::new(SlowProber::new(Duration::from_millis(1)));
    let c = coordinator(&source, &sink, &cache, prober);

    let root = CancellationToken::new();
    let handle = Scheduler::new(Arc::new(c)).start(&root, Duration::from_secs(60));

    tokio::time::sleep(Duration::from_millis(50)).await;
    root.cancel();

    tokio::time::timeout(Duration::from_secs(2), handle.finished())
        .await
        .expect("scheduler ignored root shutdown")
        .unwrap();
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}
