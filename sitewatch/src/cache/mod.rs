//! タグ付きキャッシュ
//!
//! 派生ビュー（最速/最遅サイトやURL参照の結果）をタグ単位でまとめてキャッシュし、
//! バッチ完了時にタグごと無効化する。
//!
//! - [`TaggedCache`]: プロセス内
//! - [`sqlite::SqliteTagCache`]: データベース共有（`watch` デーモンと参照コマンドの間で共有）

/// SQLiteベースのタグ付きキャッシュ
pub mod sqlite;

pub use sqlite::SqliteTagCache;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::common::error::CacheError;

/// タグ単位のキャッシュ無効化
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// タグに紐づくエントリをすべて削除し、削除件数を返す
    ///
    /// 削除対象がなかった場合は `CacheError::Miss` を返す（致命的ではない）。
    async fn invalidate_tag(&self, tag: &str) -> Result<usize, CacheError>;
}

/// 読み書き可能なタグ付きキャッシュ
#[async_trait]
pub trait TagCache: CacheInvalidator {
    /// 値を取得（存在しないか期限切れなら `CacheError::Miss`）
    async fn get(&self, key: &str, tag: &str) -> Result<String, CacheError>;

    /// 値を保存（`ttl` が None なら無期限）
    async fn set(
        &self,
        key: &str,
        tag: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// インプロセスのタグ付きキャッシュ
#[derive(Debug, Default)]
pub struct TaggedCache {
    entries: RwLock<HashMap<String, HashMap<String, Entry>>>,
}

impl TaggedCache {
    /// 空のキャッシュを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 値を取得
    pub async fn get(&self, key: &str, tag: &str) -> Result<String, CacheError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(tag)
            .and_then(|bucket| bucket.get(key))
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
            .ok_or_else(|| CacheError::Miss(format!("{}:{}", tag, key)))
    }

    /// 値を保存（`ttl` が None なら無期限）
    pub async fn set(&self, key: &str, tag: &str, value: impl Into<String>, ttl: Option<Duration>) {
        let entry = Entry {
            value: value.into(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries
            .write()
            .await
            .entry(tag.to_string())
            .or_default()
            .insert(key.to_string(), entry);
    }

    /// タグに紐づく有効なエントリ数
    pub async fn len(&self, tag: &str) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(tag)
            .map_or(0, |bucket| bucket.values().filter(|e| !e.is_expired(now)).count())
    }

    /// タグに紐づく有効なエントリがないか
    pub async fn is_empty(&self, tag: &str) -> bool {
        self.len(tag).await == 0
    }
}

#[async_trait]
impl CacheInvalidator for TaggedCache {
    async fn invalidate_tag(&self, tag: &str) -> Result<usize, CacheError> {
        let now = Instant::now();
        let removed = self
            .entries
            .write()
            .await
            .remove(tag)
            .map_or(0, |bucket| bucket.values().filter(|e| !e.is_expired(now)).count());

        if removed == 0 {
            return Err(CacheError::Miss(format!("tag '{}'", tag)));
        }

        debug!(tag = %tag, removed, "Cache tag invalidated");
        Ok(removed)
    }
}

#[async_trait]
impl TagCache for TaggedCache {
    async fn get(&self, key: &str, tag: &str) -> Result<String, CacheError> {
        TaggedCache::get(self, key, tag).await
    }

    async fn set(
        &self,
        key: &str,
        tag: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        TaggedCache::set(self, key, tag, value, ttl).await;
        Ok(())
    }
}
