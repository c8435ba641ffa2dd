//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! # エラー分類
//!
//! - `InvalidInput`: 監視対象の識別子が不正（リトライしない）
//! - `Internal`: ストレージ・キャッシュの障害（バッチを中断する）
//! - `Unavailable`: URL指定で参照したサイトが停止中
//! - `Cancelled`: シャットダウン中（障害として扱わない）
//!
//! 到達不能なエンドポイントはエラーではなく `ProbeResult::available = false` として記録される。

use thiserror::Error;

/// Storage collaborator error
#[derive(Debug, Error)]
pub enum StoreError {
    /// No monitored targets exist (not fatal to a batch)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend failure
    #[error("Storage error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Cache collaborator error
#[derive(Debug, Error)]
pub enum CacheError {
    /// Nothing was cached under the requested key or tag (not fatal)
    #[error("Cache miss: {0}")]
    Miss(String),

    /// Backend failure
    #[error("Cache error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// sitewatch error type
#[derive(Debug, Error)]
pub enum WatchError {
    /// Malformed target identity
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Website looked up by URL is down
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Cache failure
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Job submitted to a closed worker pool
    #[error("Worker pool is closed")]
    PoolClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shutdown in progress
    #[error("Operation cancelled")]
    Cancelled,
}

/// Coarse error classification used for logging and exit handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied something unusable; never retried.
    InvalidInput,
    /// Storage, cache or runtime failure; aborts the current batch.
    Internal,
    /// Requested website is down.
    Unavailable,
    /// Shutdown path.
    Cancelled,
}

impl WatchError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::Config(_) => ErrorKind::InvalidInput,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Store(_) | Self::Cache(_) | Self::Internal(_) | Self::PoolClosed => {
                ErrorKind::Internal
            }
        }
    }

    /// Returns true if this error only signals shutdown.
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// Returns true if this is the "no targets" storage outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(StoreError::NotFound(_)))
    }
}

/// Result alias
pub type WatchResult<T> = Result<T, WatchError>;
