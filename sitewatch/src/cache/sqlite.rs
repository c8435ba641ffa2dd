//! SQLiteベースのタグ付きキャッシュ
//!
//! 監視対象と同じデータベースに保存するため、別プロセスの参照コマンドが書いた
//! エントリを `watch` デーモンのバッチ完了時に無効化できる。
//! 有効期限はUNIXミリ秒で保持する。

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::debug;

use super::{CacheInvalidator, TagCache};
use crate::common::error::CacheError;

/// SQLiteベースのタグ付きキャッシュ
#[derive(Clone, Debug)]
pub struct SqliteTagCache {
    pool: SqlitePool,
}

impl SqliteTagCache {
    /// 既存のプールからキャッシュを作成（マイグレーション済みであること）
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// タグに紐づく有効なエントリ数
    pub async fn len(&self, tag: &str) -> Result<usize, CacheError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM cache_entries
            WHERE tag = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(tag)
        .bind(now_ms())
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as usize)
    }

    /// 期限切れのエントリを削除し、削除件数を返す
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(now_ms())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl TagCache for SqliteTagCache {
    async fn get(&self, key: &str, tag: &str) -> Result<String, CacheError> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT value FROM cache_entries
            WHERE tag = ? AND key = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(tag)
        .bind(key)
        .bind(now_ms())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CacheError::Miss(format!("{}:{}", tag, key)))
    }

    async fn set(
        &self,
        key: &str,
        tag: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| now_ms().saturating_add(ttl.as_millis() as i64));

        sqlx::query(
            r#"
            INSERT INTO cache_entries (tag, key, value, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (tag, key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(tag)
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CacheInvalidator for SqliteTagCache {
    async fn invalidate_tag(&self, tag: &str) -> Result<usize, CacheError> {
        let mut tx = self.pool.begin().await?;

        let live: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM cache_entries
            WHERE tag = ? AND (expires_at IS NULL OR expires_at > ?)
            "#,
        )
        .bind(tag)
        .bind(now_ms())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cache_entries WHERE tag = ?")
            .bind(tag)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if live <= 0 {
            return Err(CacheError::Miss(format!("tag '{}'", tag)));
        }

        debug!(tag = %tag, removed = live, "Cache tag invalidated");
        Ok(live as usize)
    }
}
