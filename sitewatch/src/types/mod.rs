//! 型定義モジュール
//!
//! ドメインエンティティの型定義を提供

/// 監視対象
pub mod target;

/// プローブ結果
pub mod probe;

pub use probe::ProbeResult;
pub use target::Target;
