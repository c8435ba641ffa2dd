//! Repository traitパターン定義
//!
//! コーディネーターが利用するストレージ側の能力を抽象化する。
//! 実装は `Arc<dyn ...>` として注入される。

use async_trait::async_trait;

use crate::common::error::StoreError;
use crate::types::{ProbeResult, Target};

/// 監視対象の取得元
#[async_trait]
pub trait TargetSource: Send + Sync {
    /// 監視対象をすべて取得
    ///
    /// 対象が1件もない場合は `StoreError::NotFound` を返す。
    async fn list_targets(&self) -> Result<Vec<Target>, StoreError>;
}

/// プローブ結果の書き込み先
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// プローブ結果を保存
    async fn save(&self, result: &ProbeResult) -> Result<(), StoreError>;
}
