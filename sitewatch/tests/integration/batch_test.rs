//! バッチコーディネーターの統合テスト
//!
//! 実HTTP（wiremock）とフェイクのストレージ/キャッシュを組み合わせる。

use crate::support::{coordinator, target, CacheSpy, MemorySink, SlowProber, StaticSource};
use sitewatch::common::{StoreError, WatchError};
use sitewatch::health::{BatchState, HttpProber};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const UNREACHABLE: &str = "http://127.0.0.1:9";

fn http_prober() -> Arc<HttpProber> {
    Arc::new(HttpProber::with_timeout(Duration::from_secs(2)).unwrap())
}

#[tokio::test]
async fn reachable_and_unreachable_targets_are_persisted_then_invalidated_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(120)))
        .mount(&server)
        .await;

    let a = target(&server.uri());
    let b = target(UNREACHABLE);
    let source = Arc::new(StaticSource::new(vec![a.clone(), b.clone()]));
    let sink = Arc::new(MemorySink::default());
    let cache = Arc::new(CacheSpy::default());
    let c = coordinator(&source, &sink, &cache, http_prober());

    let summary = c.run_batch(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.targets, 2);
    assert_eq!(summary.available, 1);
    assert_eq!(summary.unavailable, 1);
    assert_eq!(summary.persisted, 2);

    let saved_a = sink.saved_for(&a).expect("A persisted");
    assert!(saved_a.is_available());
    assert!(saved_a.latency().unwrap() >= Duration::from_millis(120));

    let saved_b = sink.saved_for(&b).expect("B persisted");
    assert!(!saved_b.is_available());
    assert_eq!(saved_b.latency(), None);

    assert_eq!(cache.invalidated_tags(), vec!["website".to_string()]);
    assert_eq!(c.state(), BatchState::Idle);
}

#[tokio::test]
async fn successful_batch_probes_every_target_exactly_once() {
    let targets: Vec<_> = (0..25)
        .map(|i| target(&format!("site{}.example.com", i)))
        .collect();
    let source = Arc::new(StaticSource::new(targets));
    let sink = Arc::new(MemorySink::default());
    let cache = Arc::new(CacheSpy::default());
    let prober = Arc::new(SlowProber::new(Duration::from_millis(10)));
    let c = coordinator(&source, &sink, &cache, prober.clone()).with_worker_count(4);

    let summary = c.run_batch(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.persisted, 25);
    assert_eq!(prober.calls.load(Ordering::SeqCst), 25);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 25);
    assert!(prober.max_in_flight.load(Ordering::SeqCst) <= 4);
    assert_eq!(cache.calls(), 1);
}

#[tokio::test]
async fn latency_recorded_only_for_available_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let healthy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&healthy)
        .await;

    let source = Arc::new(StaticSource::new(vec![
        target(&server.uri()),
        target(&healthy.uri()),
        target(UNREACHABLE),
    ]));
    let sink = Arc::new(MemorySink::default());
    let cache = Arc::new(CacheSpy::default());
    let c = coordinator(&source, &sink, &cache, http_prober());

    c.run_batch(&CancellationToken::new()).await.unwrap();

    let saved = sink.saved();
    assert_eq!(saved.len(), 3);
    for result in saved {
        assert_eq!(result.is_available(), result.latency().is_some());
    }
}

#[tokio::test]
async fn unreachable_target_is_unavailable_on_every_batch() {
    let b = target(UNREACHABLE);
    let source = Arc::new(StaticSource::new(vec![b.clone()]));
    let sink = Arc::new(MemorySink::default());
    let cache = Arc::new(CacheSpy::default());
    let c = coordinator(&source, &sink, &cache, http_prober());
    let cancel = CancellationToken::new();

    c.run_batch(&cancel).await.unwrap();
    c.run_batch(&cancel).await.unwrap();

    let saved = sink.saved();
    assert_eq!(saved.len(), 2);
    for result in saved {
        assert_eq!(result.target(), &b);
        assert!(!result.is_available());
        assert_eq!(result.latency(), None);
    }
    assert_eq!(cache.calls(), 2);
}

#[tokio::test]
async fn no_targets_still_invalidates_once_without_probing() {
    let source = Arc::new(StaticSource::new(Vec::new()));
    let sink = Arc::new(MemorySink::default());
    let cache = Arc::new(CacheSpy::default());
    let prober = Arc::new(SlowProber::new(Duration::from_millis(1)));
    let c = coordinator(&source, &sink, &cache, prober.clone());

    let summary = c.run_batch(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.targets, 0);
    assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    assert_eq!(cache.calls(), 1);
}

#[tokio::test]
async fn persistence_failure_aborts_without_invalidation() {
    let a = target("a.example.com");
    let b = target("b.example.com");
    let source = Arc::new(StaticSource::new(vec![a, b.clone()]));
    let sink = Arc::new(MemorySink::failing_on([b]));
    let cache = Arc::new(CacheSpy::default());
    let prober = Arc::new(SlowProber::new(Duration::from_millis(5)));
    let c = coordinator(&source, &sink, &cache, prober.clone());
    let mut events = c.events().subscribe();

    let err = c.run_batch(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, WatchError::Store(StoreError::Internal(_))));
    assert_eq!(cache.calls(), 0);
    assert!(sink.calls.load(Ordering::SeqCst) <= 2);
    assert!(prober.calls.load(Ordering::SeqCst) <= 2);
    assert_eq!(c.state(), BatchState::Failed);

    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, sitewatch::events::WatchEvent::BatchFailed { .. }) {
            failed = true;
        }
    }
    assert!(failed, "BatchFailed event must be published");
}

#[tokio::test]
async fn enumeration_failure_aborts_before_probing() {
    struct BrokenSource;

    #[async_trait::async_trait]
    impl sitewatch::db::TargetSource for BrokenSource {
        async fn list_targets(
            &self,
        ) -> Result<Vec<sitewatch::types::Target>, StoreError> {
            Err(StoreError::Internal("database is locked".into()))
        }
    }

    let sink = Arc::new(MemorySink::default());
    let cache = Arc::new(CacheSpy::default());
    let prober = Arc::new(SlowProber::new(Duration::from_millis(1)));
    let c = sitewatch::health::BatchCoordinator::new(
        Arc::new(BrokenSource),
        sink.clone(),
        cache.clone(),
        prober.clone(),
    );

    let err = c.run_batch(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, WatchError::Store(StoreError::Internal(_))));
    assert_eq!(prober.calls.load(Ordering::SeqCst), 0);
    assert_eq!(cache.calls(), 0);
}

// キャッシュのみの失敗でも、保存済みのバッチは失敗として扱われる。
// キャッシュは次のバッチまで古いまま残る。
#[tokio::test]
async fn cache_failure_after_persist_fails_the_batch() {
    let a = target("a.example.com");
    let source = Arc::new(StaticSource::new(vec![a.clone()]));
    let sink = Arc::new(MemorySink::default());
    let cache = Arc::new(CacheSpy::failing());
    let prober = Arc::new(SlowProber::new(Duration::from_millis(1)));
    let c = coordinator(&source, &sink, &cache, prober);

    let err = c.run_batch(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, WatchError::Cache(_)));
    assert!(sink.saved_for(&a).is_some(), "result stays persisted");
    assert_eq!(cache.calls(), 1);
}

#[tokio::test]
async fn custom_cache_tag_is_invalidated() {
    let source = Arc::new(StaticSource::new(vec![target("a.example.com")]));
    let sink = Arc::new(MemorySink::default());
    let cache = Arc::new(CacheSpy::default());
    let prober = Arc::new(SlowProber::new(Duration::from_millis(1)));
    let c = coordinator(&source, &sink, &cache, prober).with_cache_tag("sites");

    c.run_batch(&CancellationToken::new()).await.unwrap();

    assert_eq!(cache.invalidated_tags(), vec!["sites".to_string()]);
}
