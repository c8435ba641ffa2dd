//! SQLiteストア・HTTPプローブ・タグ付きキャッシュを実物で組み合わせたテスト

use sitewatch::cache::{SqliteTagCache, TaggedCache};
use sitewatch::common::StoreError;
use sitewatch::db::{self, SqliteTargetStore};
use sitewatch::health::{BatchCoordinator, HttpProber, WebsiteLookup};
use sitewatch::types::Target;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn file_store(dir: &tempfile::TempDir) -> Arc<SqliteTargetStore> {
    let path = dir.path().join("sitewatch.db");
    let url = format!("sqlite://{}", path.display());
    let pool = db::connect(&url).await.expect("database ready");
    Arc::new(SqliteTargetStore::new(pool))
}

#[tokio::test]
async fn batch_updates_stored_websites_and_clears_cached_views() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir).await;

    let fast = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(20)))
        .mount(&fast)
        .await;
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .mount(&slow)
        .await;

    let fast_target = Target::parse(&fast.uri()).unwrap();
    let slow_target = Target::parse(&slow.uri()).unwrap();
    let down_target = Target::parse("http://127.0.0.1:9").unwrap();
    for t in [&fast_target, &slow_target, &down_target] {
        assert!(store.add_target(t).await.unwrap());
    }

    let cache = Arc::new(TaggedCache::new());
    cache.set("fastest", "website", fast_target.as_str(), None).await;
    cache.set("slowest", "website", slow_target.as_str(), None).await;

    let prober = Arc::new(HttpProber::with_timeout(Duration::from_secs(2)).unwrap());
    let c = BatchCoordinator::new(store.clone(), store.clone(), cache.clone(), prober)
        .with_worker_count(3);

    let summary = c.run_batch(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.persisted, 3);
    assert_eq!(summary.invalidated, 2);
    assert!(cache.is_empty("website").await);

    let down = store.get(&down_target).await.unwrap().unwrap();
    assert!(!down.available);
    assert_eq!(down.latency, None);
    assert!(down.last_check_at.is_some());

    assert_eq!(store.fastest().await.unwrap().target, fast_target);
    assert_eq!(store.slowest().await.unwrap().target, slow_target);
}

#[tokio::test]
async fn empty_store_batch_succeeds_and_tolerates_cache_miss() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir).await;
    let cache = Arc::new(TaggedCache::new());
    let prober = Arc::new(HttpProber::new().unwrap());
    let c = BatchCoordinator::new(store.clone(), store.clone(), cache, prober);

    let summary = c.run_batch(&CancellationToken::new()).await.unwrap();

    assert_eq!(summary.targets, 0);
    assert_eq!(summary.invalidated, 0);
    assert!(matches!(store.fastest().await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn removed_targets_are_not_probed() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir).await;
    let gone = Target::parse("gone.example.com").unwrap();
    store.add_target(&gone).await.unwrap();
    assert!(store.remove_target(&gone).await.unwrap());

    let cache = Arc::new(TaggedCache::new());
    let prober = Arc::new(HttpProber::new().unwrap());
    let c = BatchCoordinator::new(store.clone(), store.clone(), cache, prober);

    let summary = c.run_batch(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.targets, 0);
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn cached_lookups_are_refreshed_after_the_next_batch() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir).await;
    let cache = Arc::new(SqliteTagCache::new(store.pool().clone()));
    let checker = Arc::new(HttpProber::with_timeout(Duration::from_secs(2)).unwrap());

    let first = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(10)))
        .mount(&first)
        .await;
    let first_target = Target::parse(&first.uri()).unwrap();
    store.add_target(&first_target).await.unwrap();

    let c = BatchCoordinator::new(store.clone(), store.clone(), cache.clone(), checker.clone());
    c.run_batch(&CancellationToken::new()).await.unwrap();

    // 別プロセスの参照コマンドと同じく、データベース上のキャッシュを共有する
    let lookup = WebsiteLookup::new(store.clone(), checker, cache.clone());
    assert_eq!(lookup.fastest().await.unwrap().target, first_target);
    assert_eq!(cache.len("website").await.unwrap(), 1);

    let second = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&second)
        .await;
    let second_target = Target::parse(&second.uri()).unwrap();
    store.add_target(&second_target).await.unwrap();
    first.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
        .mount(&first)
        .await;

    // バッチ前は古い結果のまま
    assert_eq!(lookup.fastest().await.unwrap().target, first_target);

    let summary = c.run_batch(&CancellationToken::new()).await.unwrap();
    assert_eq!(summary.invalidated, 1);
    assert_eq!(cache.len("website").await.unwrap(), 0);

    assert_eq!(lookup.fastest().await.unwrap().target, second_target);
    assert_eq!(lookup.slowest().await.unwrap().target, first_target);
}
