//! sitewatch
//!
//! 登録済みWebサイトの稼働状況とレイテンシを定期的に確認する監視デーモン

#![warn(missing_docs)]

/// 共通型定義（エラー分類）
pub mod common;

/// 型定義（監視対象・プローブ結果）
pub mod types;

/// 有界ワーカープール
pub mod worker;

/// ヘルスチェック監視（プローブ・バッチ・スケジューラー）
pub mod health;

/// データベースアクセス
pub mod db;

/// タグ付きキャッシュ
pub mod cache;

/// 監視イベントバス
pub mod events;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// ロギング初期化ユーティリティ
pub mod logging;

/// シグナルによるシャットダウン
pub mod shutdown;

/// CLIインターフェース
pub mod cli;

pub use common::error::{WatchError, WatchResult};
