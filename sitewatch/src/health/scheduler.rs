//! 定期実行スケジューラー
//!
//! 起動直後に1回、その後は固定間隔でバッチを実行する。
//! バッチは逐次実行されるため重ならない。実行中に過ぎたティックはスキップし、
//! 次のバッチは次の間隔境界で開始する。

use super::coordinator::BatchCoordinator;
use crate::common::error::{WatchError, WatchResult};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// デフォルトの実行間隔（秒）
pub const DEFAULT_WATCH_PERIOD_SECS: u64 = 300;

/// バッチ失敗時の方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// 最初の失敗でスケジューラーを終了する
    #[default]
    Abort,
    /// ログを出して次の間隔を待つ
    Continue,
}

impl FailurePolicy {
    /// 文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Continue => "continue",
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(WatchError::Config(format!(
                "unknown batch failure policy '{}'",
                other
            ))),
        }
    }
}

/// スケジューラー
pub struct Scheduler {
    coordinator: Arc<BatchCoordinator>,
    policy: FailurePolicy,
}

impl Scheduler {
    /// 新しいスケジューラーを作成
    pub fn new(coordinator: Arc<BatchCoordinator>) -> Self {
        Self {
            coordinator,
            policy: FailurePolicy::default(),
        }
    }

    /// 失敗時の方針を設定
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 失敗時の方針
    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    /// キャンセルされるか、バッチが失敗するまで実行し続ける
    ///
    /// キャンセル時は `Err(WatchError::Cancelled)` を返す。
    pub async fn run(&self, cancel: CancellationToken, interval: Duration) -> WatchResult<()> {
        if interval.is_zero() {
            return Err(WatchError::InvalidInput(
                "watch interval must be greater than zero".to_string(),
            ));
        }

        info!(
            interval_secs = interval.as_secs(),
            policy = self.policy.as_str(),
            "Scheduler started"
        );

        self.tick(&cancel).await?;

        let mut timer = interval_at(Instant::now() + interval, interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Scheduler stopped");
                    return Err(WatchError::Cancelled);
                }
                scheduled = timer.tick() => {
                    self.tick(&cancel).await?;

                    // 間隔を超過したバッチの後は、取りこぼしたティックを即時実行せず次の境界まで待つ
                    if let Some((next, skipped)) = next_boundary(scheduled, interval, Instant::now()) {
                        warn!(skipped, "Batch overran the watch interval, skipping missed ticks");
                        timer.reset_at(next);
                    }
                }
            }
        }
    }

    async fn tick(&self, cancel: &CancellationToken) -> WatchResult<()> {
        match self.coordinator.run_batch(cancel).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => match self.policy {
                FailurePolicy::Abort => Err(e),
                FailurePolicy::Continue => {
                    warn!(error = %e, "Batch failed, waiting for next interval");
                    Ok(())
                }
            },
        }
    }

    /// バックグラウンドで実行を開始する
    ///
    /// `parent` がキャンセルされると停止する。`SchedulerHandle::stop` でも停止できる。
    pub fn start(self, parent: &CancellationToken, interval: Duration) -> SchedulerHandle {
        let cancel = parent.child_token();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token, interval).await });
        SchedulerHandle { cancel, task }
    }
}

/// 超過したバッチの後の次の実行時刻と、飛ばしたティック数を返す
///
/// 次の実行時刻は `scheduled` から間隔の倍数で、`now` 以降の最初のもの。
/// 直後の予定に間に合っている場合は `None`。
fn next_boundary(scheduled: Instant, interval: Duration, now: Instant) -> Option<(Instant, u32)> {
    let elapsed = now.saturating_duration_since(scheduled);
    let periods = elapsed.as_nanos().div_ceil(interval.as_nanos()).max(1) as u32;
    if periods == 1 {
        return None;
    }
    Some((scheduled + interval * periods, periods - 1))
}

/// 実行中スケジューラーのハンドル
#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: JoinHandle<WatchResult<()>>,
}

impl SchedulerHandle {
    /// 終了済みか
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 停止を要求する（完了は待たない）
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 停止を要求し、終了を待つ
    pub async fn stop(self) -> WatchResult<()> {
        self.cancel.cancel();
        self.finished().await
    }

    /// 終了を待つ（キャンセルによる終了は `Ok(())`）
    pub async fn finished(self) -> WatchResult<()> {
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_cancelled() => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(join_err) => Err(WatchError::Internal(format!(
                "scheduler task failed: {}",
                join_err
            ))),
        }
    }
}
