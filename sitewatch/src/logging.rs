//! ロギング初期化
//!
//! 標準エラー出力（人間向け）と日次ローテーションのJSONファイルに出力する。
//! 標準出力はコマンドの結果（JSONなど）専用。

use crate::common::error::WatchError;
use crate::config::get_env_with_fallback;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ログファイル名のプレフィックス
pub const LOG_FILE_NAME: &str = "sitewatch.log";

/// ログディレクトリのデフォルト
pub const DEFAULT_LOG_DIR: &str = "logs";

/// フィルタ未指定時のデフォルト
const DEFAULT_FILTER: &str = "info,sqlx::query=warn";

/// フィルタ指定を決定する
///
/// `SITEWATCH_LOG_LEVEL`（旧: `LOG_LEVEL`）→ `RUST_LOG` → デフォルトの順で参照する。
pub fn filter_directive() -> String {
    get_env_with_fallback("SITEWATCH_LOG_LEVEL", "LOG_LEVEL")
        .or_else(|| std::env::var("RUST_LOG").ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// ログディレクトリ（`SITEWATCH_LOG_DIR`）
pub fn log_dir() -> String {
    std::env::var("SITEWATCH_LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string())
}

/// グローバルサブスクライバーを初期化する
pub fn init() -> Result<(), WatchError> {
    let env_filter = EnvFilter::try_new(filter_directive())
        .map_err(|e| WatchError::Config(format!("invalid log filter: {}", e)))?;

    // JSON形式、日次ローテーション
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_NAME)
        .build(log_dir())
        .map_err(|e| WatchError::Config(format!("failed to open log directory: {}", e)))?;
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let console_layer = fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| WatchError::Internal(format!("failed to initialize logging: {}", e)))
}
