//! ヘルスチェックモニター
//!
//! 定期的に監視対象の稼働状況を確認する。
//!
//! - [`probe`]: 1ターゲットのプローブ
//! - [`coordinator`]: 1サイクル分のバッチ処理
//! - [`scheduler`]: バッチの定期実行
//! - [`lookup`]: 監視結果の参照（最速/最遅/URL指定）

pub mod coordinator;
pub mod lookup;
pub mod probe;
pub mod scheduler;

pub use coordinator::{BatchCoordinator, BatchOutcome, BatchState, BatchSummary};
pub use lookup::WebsiteLookup;
pub use probe::{HttpProber, Prober};
pub use scheduler::{FailurePolicy, Scheduler, SchedulerHandle};
