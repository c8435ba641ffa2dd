//! データベースアクセス層
//!
//! SQLiteベースのデータ永続化

/// 監視対象ストア
pub mod targets;

/// Repository traitパターン（コーディネーターへの注入用）
pub mod traits;

pub use targets::{SqliteTargetStore, WebsiteRecord};
pub use traits::{ResultSink, TargetSource};

use crate::common::error::StoreError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::debug;

/// データベースに接続し、マイグレーションを実行する
pub async fn connect(database_url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    migrate(&pool).await?;

    debug!(database_url = %database_url, "Database ready");
    Ok(pool)
}

/// マイグレーションを実行
pub async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Internal(format!("migration failed: {}", e)))
}
