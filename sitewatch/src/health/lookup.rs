//! 監視結果の参照
//!
//! 最速/最遅サイトとURL指定の参照を、タグ付きキャッシュ越しに提供する。
//! キャッシュはバッチ完了時にタグ単位で無効化されるため、`watch` デーモンと同じ
//! キャッシュ（[`crate::cache::SqliteTagCache`]）を渡すこと。
//!
//! URL指定の参照は、登録済みなら保存済みの最新結果を返し、未登録なら1回だけ
//! チェックする。停止中のサイトは [`WatchError::Unavailable`] になる。

use crate::cache::TagCache;
use crate::common::error::{CacheError, StoreError, WatchError};
use crate::db::{SqliteTargetStore, WebsiteRecord};
use crate::health::coordinator::DEFAULT_CACHE_TAG;
use crate::health::probe::Prober;
use crate::types::Target;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// 参照結果のデフォルトキャッシュ期間（秒）
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// 監視結果の参照サービス
pub struct WebsiteLookup {
    store: Arc<SqliteTargetStore>,
    prober: Arc<dyn Prober>,
    cache: Arc<dyn TagCache>,
    cache_tag: String,
    cache_ttl: Option<Duration>,
}

impl WebsiteLookup {
    /// 参照サービスを作成
    pub fn new(
        store: Arc<SqliteTargetStore>,
        prober: Arc<dyn Prober>,
        cache: Arc<dyn TagCache>,
    ) -> Self {
        Self {
            store,
            prober,
            cache,
            cache_tag: DEFAULT_CACHE_TAG.to_string(),
            cache_ttl: Some(Duration::from_secs(DEFAULT_CACHE_TTL_SECS)),
        }
    }

    /// キャッシュタグを指定（バッチが無効化するタグと揃える）
    pub fn with_cache_tag(mut self, tag: impl Into<String>) -> Self {
        self.cache_tag = tag.into();
        self
    }

    /// キャッシュ期間を指定（None で無期限）
    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// 稼働中で最もレイテンシが小さいサイト
    pub async fn fastest(&self) -> Result<WebsiteRecord, WatchError> {
        self.cached("fastest", || async {
            self.store.fastest().await.map_err(website_not_found)
        })
        .await
    }

    /// 稼働中で最もレイテンシが大きいサイト
    pub async fn slowest(&self) -> Result<WebsiteRecord, WatchError> {
        self.cached("slowest", || async {
            self.store.slowest().await.map_err(website_not_found)
        })
        .await
    }

    /// URL指定で参照する
    ///
    /// 保存済みの結果がなければその場でチェックする（結果は保存しない）。
    pub async fn get_by_url(&self, raw: &str) -> Result<WebsiteRecord, WatchError> {
        let target = Target::parse(raw)?;
        let key = format!("url:{}", target);

        self.cached(&key, || async {
            let record = match self.store.get(&target).await? {
                Some(record) => record,
                None => {
                    debug!(url = %target, "Website not registered, checking once");
                    WebsiteRecord::from(self.prober.probe(&target).await?)
                }
            };
            if !record.available {
                return Err(WatchError::Unavailable("website is unavailable".to_string()));
            }
            Ok::<_, WatchError>(record)
        })
        .await
    }

    /// キャッシュにあれば返し、なければ読み込んで保存する（成功時のみ）
    async fn cached<F, Fut>(&self, key: &str, load: F) -> Result<WebsiteRecord, WatchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WebsiteRecord, WatchError>>,
    {
        match self.cache.get(key, &self.cache_tag).await {
            Ok(raw) => match serde_json::from_str::<WebsiteRecord>(&raw) {
                Ok(record) => {
                    debug!(key = %key, "Cache hit");
                    return Ok(record);
                }
                Err(e) => warn!(key = %key, error = %e, "Discarding unreadable cache entry"),
            },
            Err(CacheError::Miss(_)) => {}
            Err(e) => warn!(key = %key, error = %e, "Cache read failed, loading directly"),
        }

        let record = load().await?;

        match serde_json::to_string(&record) {
            Ok(raw) => {
                if let Err(e) = self
                    .cache
                    .set(key, &self.cache_tag, raw, self.cache_ttl)
                    .await
                {
                    warn!(key = %key, error = %e, "Cache write failed");
                }
            }
            Err(e) => warn!(key = %key, error = %e, "Failed to encode cache entry"),
        }
        Ok(record)
    }
}

fn website_not_found(err: StoreError) -> WatchError {
    match err {
        StoreError::NotFound(_) => StoreError::NotFound("website not found".to_string()).into(),
        other => other.into(),
    }
}
