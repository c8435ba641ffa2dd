//! 監視対象ストレージ（SQLite）
//!
//! 監視対象の登録・一覧と、最新プローブ結果の保存を行う。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::debug;

use super::traits::{ResultSink, TargetSource};
use crate::common::error::StoreError;
use crate::types::probe::{deserialize_latency_ms, serialize_latency_ms};
use crate::types::{ProbeResult, Target};

/// 監視対象と最新のプローブ結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteRecord {
    /// 監視対象
    pub target: Target,
    /// 最新の稼働状況
    pub available: bool,
    /// 最新のレイテンシ（稼働時のみ）
    #[serde(
        rename = "latency_ms",
        serialize_with = "serialize_latency_ms",
        deserialize_with = "deserialize_latency_ms"
    )]
    pub latency: Option<Duration>,
    /// 最終チェック時刻（未チェックならNone）
    pub last_check_at: Option<DateTime<Utc>>,
}

impl From<ProbeResult> for WebsiteRecord {
    fn from(result: ProbeResult) -> Self {
        Self {
            target: result.target().clone(),
            available: result.is_available(),
            latency: result.latency(),
            last_check_at: Some(result.observed_at()),
        }
    }
}

#[derive(sqlx::FromRow)]
struct WebsiteRow {
    url: String,
    available: bool,
    latency_ms: Option<i64>,
    last_check_at: Option<String>,
}

impl TryFrom<WebsiteRow> for WebsiteRecord {
    type Error = StoreError;

    fn try_from(row: WebsiteRow) -> Result<Self, Self::Error> {
        let target = Target::parse(&row.url)
            .map_err(|e| StoreError::Internal(format!("corrupt url '{}': {}", row.url, e)))?;
        let last_check_at = row
            .last_check_at
            .as_deref()
            .map(DateTime::parse_from_rfc3339)
            .transpose()
            .map_err(|e| StoreError::Internal(format!("corrupt timestamp: {}", e)))?
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Self {
            target,
            available: row.available,
            latency: row.latency_ms.map(|ms| Duration::from_millis(ms.max(0) as u64)),
            last_check_at,
        })
    }
}

/// SQLiteベースの監視対象ストア
#[derive(Clone, Debug)]
pub struct SqliteTargetStore {
    pool: SqlitePool,
}

impl SqliteTargetStore {
    /// 既存のプールからストアを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 接続プール
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 監視対象を登録（登録済みならfalse）
    pub async fn add_target(&self, target: &Target) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO websites (url, available, created_at)
            VALUES (?, 0, ?)
            "#,
        )
        .bind(target.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 監視対象を削除
    pub async fn remove_target(&self, target: &Target) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM websites WHERE url = ?")
            .bind(target.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 監視対象を取得
    pub async fn get(&self, target: &Target) -> Result<Option<WebsiteRecord>, StoreError> {
        let row = sqlx::query_as::<_, WebsiteRow>(
            r#"
            SELECT url, available, latency_ms, last_check_at
            FROM websites
            WHERE url = ?
            "#,
        )
        .bind(target.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(WebsiteRecord::try_from).transpose()
    }

    /// 監視対象を一覧
    pub async fn list(&self) -> Result<Vec<WebsiteRecord>, StoreError> {
        let rows = sqlx::query_as::<_, WebsiteRow>(
            r#"
            SELECT url, available, latency_ms, last_check_at
            FROM websites
            ORDER BY url
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WebsiteRecord::try_from).collect()
    }

    /// 稼働中で最もレイテンシが小さい監視対象
    pub async fn fastest(&self) -> Result<WebsiteRecord, StoreError> {
        self.by_latency("ASC").await
    }

    /// 稼働中で最もレイテンシが大きい監視対象
    pub async fn slowest(&self) -> Result<WebsiteRecord, StoreError> {
        self.by_latency("DESC").await
    }

    async fn by_latency(&self, order: &'static str) -> Result<WebsiteRecord, StoreError> {
        let sql = format!(
            r#"
            SELECT url, available, latency_ms, last_check_at
            FROM websites
            WHERE available = 1 AND latency_ms IS NOT NULL
            ORDER BY latency_ms {order}, url
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, WebsiteRow>(&sql)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound("no available websites".to_string()))?;

        WebsiteRecord::try_from(row)
    }
}

#[async_trait]
impl TargetSource for SqliteTargetStore {
    async fn list_targets(&self) -> Result<Vec<Target>, StoreError> {
        let urls: Vec<String> = sqlx::query_scalar("SELECT url FROM websites ORDER BY url")
            .fetch_all(&self.pool)
            .await?;

        if urls.is_empty() {
            return Err(StoreError::NotFound("no websites registered".to_string()));
        }

        urls.iter()
            .map(|url| {
                Target::parse(url)
                    .map_err(|e| StoreError::Internal(format!("corrupt url '{}': {}", url, e)))
            })
            .collect()
    }
}

#[async_trait]
impl ResultSink for SqliteTargetStore {
    async fn save(&self, result: &ProbeResult) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE websites SET
                available = ?,
                latency_ms = ?,
                last_check_at = ?
            WHERE url = ?
            "#,
        )
        .bind(result.is_available())
        .bind(result.latency_ms().map(|ms| ms as i64))
        .bind(result.observed_at().to_rfc3339())
        .bind(result.target().as_str())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            debug!(url = %result.target(), "Target removed before its result was saved");
        }
        Ok(())
    }
}
