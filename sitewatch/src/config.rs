//! Configuration management via environment variables
//!
//! Provides helper functions for reading environment variables with fallback
//! to deprecated variable names with warning logs.

use crate::common::error::WatchError;
use crate::health::coordinator::DEFAULT_CACHE_TAG;
use crate::health::lookup::DEFAULT_CACHE_TTL_SECS;
use crate::health::probe::DEFAULT_PROBE_TIMEOUT_SECS;
use crate::health::scheduler::{FailurePolicy, DEFAULT_WATCH_PERIOD_SECS};
use crate::worker::DEFAULT_WORKER_COUNT;
use std::time::Duration;

/// デフォルトのデータベースURL
pub const DEFAULT_DATABASE_URL: &str = "sqlite://sitewatch.db?mode=rwc";

/// Get an environment variable with fallback to a deprecated name
///
/// If the new variable name is set, returns its value.
/// If only the old (deprecated) variable name is set, returns its value
/// and logs a deprecation warning.
///
/// # Example
/// ```
/// use sitewatch::config::get_env_with_fallback;
///
/// let workers = get_env_with_fallback("SITEWATCH_WORKERS", "WORKERS");
/// ```
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        tracing::warn!(
            "Environment variable '{}' is deprecated, use '{}' instead",
            old_name,
            new_name
        );
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback and default value
pub fn get_env_with_fallback_or(new_name: &str, old_name: &str, default: &str) -> String {
    get_env_with_fallback(new_name, old_name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable with fallback, parsing to a specific type
///
/// Returns `default` if neither is set or parsing fails.
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(
    new_name: &str,
    old_name: &str,
    default: T,
) -> T {
    get_env_with_fallback(new_name, old_name)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// 監視デーモンの設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// バッチの実行間隔
    pub period: Duration,
    /// ワーカー数
    pub workers: usize,
    /// 1プローブのタイムアウト
    pub probe_timeout: Duration,
    /// バッチ完了時に無効化するキャッシュタグ
    pub cache_tag: String,
    /// 参照結果（fastest / slowest / get）のキャッシュ期間
    pub cache_ttl: Duration,
    /// データベースURL
    pub database_url: String,
    /// バッチ失敗時の方針
    pub failure_policy: FailurePolicy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(DEFAULT_WATCH_PERIOD_SECS),
            workers: DEFAULT_WORKER_COUNT,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            cache_tag: DEFAULT_CACHE_TAG.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl WatchConfig {
    /// 環境変数から設定を読み込む
    ///
    /// 間隔・ワーカー数・タイムアウトが0の場合や、失敗時方針が不明な場合はエラー。
    pub fn from_env() -> Result<Self, WatchError> {
        let period_secs = get_env_with_fallback_parse(
            "SITEWATCH_WATCH_PERIOD_SECS",
            "WATCH_PERIOD_SECS",
            DEFAULT_WATCH_PERIOD_SECS,
        );
        let workers =
            get_env_with_fallback_parse("SITEWATCH_WORKERS", "WORKERS", DEFAULT_WORKER_COUNT);
        let probe_timeout_secs = get_env_with_fallback_parse(
            "SITEWATCH_PROBE_TIMEOUT_SECS",
            "PROBE_TIMEOUT_SECS",
            DEFAULT_PROBE_TIMEOUT_SECS,
        );
        let cache_tag = get_env_with_fallback_or("SITEWATCH_CACHE_TAG", "CACHE_TAG", DEFAULT_CACHE_TAG);
        let cache_ttl_secs = get_env_with_fallback_parse(
            "SITEWATCH_CACHE_TTL_SECS",
            "CACHE_TTL_SECS",
            DEFAULT_CACHE_TTL_SECS,
        );
        let database_url =
            get_env_with_fallback_or("SITEWATCH_DATABASE_URL", "DATABASE_URL", DEFAULT_DATABASE_URL);
        let failure_policy = match std::env::var("SITEWATCH_ON_BATCH_FAILURE") {
            Ok(value) => value.parse()?,
            Err(_) => FailurePolicy::default(),
        };

        let config = Self {
            period: Duration::from_secs(period_secs),
            workers,
            probe_timeout: Duration::from_secs(probe_timeout_secs),
            cache_tag,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            database_url,
            failure_policy,
        };
        config.validate()?;
        Ok(config)
    }

    /// 値の整合性を検証する
    pub fn validate(&self) -> Result<(), WatchError> {
        if self.period.is_zero() {
            return Err(WatchError::Config(
                "SITEWATCH_WATCH_PERIOD_SECS must be greater than zero".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(WatchError::Config(
                "SITEWATCH_WORKERS must be greater than zero".to_string(),
            ));
        }
        if self.probe_timeout.is_zero() {
            return Err(WatchError::Config(
                "SITEWATCH_PROBE_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        if self.cache_tag.trim().is_empty() {
            return Err(WatchError::Config(
                "SITEWATCH_CACHE_TAG must not be empty".to_string(),
            ));
        }
        if self.cache_ttl.is_zero() {
            return Err(WatchError::Config(
                "SITEWATCH_CACHE_TTL_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
