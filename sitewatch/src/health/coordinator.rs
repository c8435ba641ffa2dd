//! バッチコーディネーター
//!
//! 1サイクル分の処理を担当する:
//! 監視対象の取得 → ワーカープールでプローブ → 結果を逐次保存 → キャッシュタグ無効化
//!
//! 最初のエラーでバッチ全体を中断する（fail-fast）。中断前に保存済みの結果は
//! ロールバックしない。

use crate::cache::CacheInvalidator;
use crate::common::error::{CacheError, StoreError, WatchError};
use crate::db::traits::{ResultSink, TargetSource};
use crate::events::{create_shared_event_bus, SharedEventBus, WatchEvent};
use crate::health::probe::Prober;
use crate::types::ProbeResult;
use crate::worker::{Job, WorkerPool, DEFAULT_WORKER_COUNT};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// デフォルトのキャッシュタグ
pub const DEFAULT_CACHE_TAG: &str = "website";

/// バッチの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// 待機中
    Idle,
    /// 監視対象を取得中
    Enumerating,
    /// ジョブを投入中
    Dispatching,
    /// 結果を待機中
    Collecting,
    /// 結果を保存中
    Persisting,
    /// キャッシュを無効化中
    Invalidating,
    /// 直前のバッチが中断された
    Failed,
}

impl BatchState {
    /// 文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Enumerating => "enumerating",
            Self::Dispatching => "dispatching",
            Self::Collecting => "collecting",
            Self::Persisting => "persisting",
            Self::Invalidating => "invalidating",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 成功したバッチの集計
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// 通し番号
    pub batch_id: u64,
    /// 対象数
    pub targets: usize,
    /// 稼働数
    pub available: usize,
    /// 停止数
    pub unavailable: usize,
    /// 保存件数
    pub persisted: usize,
    /// 無効化されたキャッシュエントリ数（対象なしなら0）
    pub invalidated: usize,
    /// 処理時間
    pub elapsed: Duration,
}

impl BatchSummary {
    fn new(batch_id: u64, targets: usize) -> Self {
        Self {
            batch_id,
            targets,
            available: 0,
            unavailable: 0,
            persisted: 0,
            invalidated: 0,
            elapsed: Duration::ZERO,
        }
    }

    fn record(&mut self, result: &ProbeResult) {
        self.persisted += 1;
        if result.is_available() {
            self.available += 1;
        } else {
            self.unavailable += 1;
        }
    }
}

/// 1サイクルの結果
pub type BatchOutcome = Result<BatchSummary, WatchError>;

/// バッチコーディネーター
pub struct BatchCoordinator {
    source: Arc<dyn TargetSource>,
    sink: Arc<dyn ResultSink>,
    cache: Arc<dyn CacheInvalidator>,
    prober: Arc<dyn Prober>,
    cache_tag: String,
    worker_count: usize,
    events: SharedEventBus,
    state: watch::Sender<BatchState>,
    batch_seq: AtomicU64,
}

impl BatchCoordinator {
    /// 新しいコーディネーターを作成
    pub fn new(
        source: Arc<dyn TargetSource>,
        sink: Arc<dyn ResultSink>,
        cache: Arc<dyn CacheInvalidator>,
        prober: Arc<dyn Prober>,
    ) -> Self {
        let (state, _) = watch::channel(BatchState::Idle);
        Self {
            source,
            sink,
            cache,
            prober,
            cache_tag: DEFAULT_CACHE_TAG.to_string(),
            worker_count: DEFAULT_WORKER_COUNT,
            events: create_shared_event_bus(),
            state,
            batch_seq: AtomicU64::new(0),
        }
    }

    /// キャッシュタグを設定
    pub fn with_cache_tag(mut self, tag: impl Into<String>) -> Self {
        self.cache_tag = tag.into();
        self
    }

    /// ワーカー数を設定
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// イベントバスを設定
    pub fn with_event_bus(mut self, events: SharedEventBus) -> Self {
        self.events = events;
        self
    }

    /// キャッシュタグ
    pub fn cache_tag(&self) -> &str {
        &self.cache_tag
    }

    /// ワーカー数
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// イベントバス
    pub fn events(&self) -> &SharedEventBus {
        &self.events
    }

    /// 現在の状態
    pub fn state(&self) -> BatchState {
        *self.state.borrow()
    }

    /// 状態遷移を購読
    pub fn subscribe_state(&self) -> watch::Receiver<BatchState> {
        self.state.subscribe()
    }

    /// バッチを1回実行する
    pub async fn run_batch(&self, cancel: &CancellationToken) -> BatchOutcome {
        let batch_id = self.batch_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();

        self.events.publish(WatchEvent::BatchStarted { batch_id });
        debug!(batch_id, "Batch started");

        match self.execute(batch_id, cancel).await {
            Ok(mut summary) => {
                summary.elapsed = started.elapsed();
                self.transition(BatchState::Idle);
                self.events.publish(WatchEvent::BatchCompleted {
                    batch_id,
                    targets: summary.targets,
                    available: summary.available,
                    duration_ms: summary.elapsed.as_millis() as u64,
                });
                info!(
                    batch_id,
                    targets = summary.targets,
                    available = summary.available,
                    unavailable = summary.unavailable,
                    invalidated = summary.invalidated,
                    elapsed_ms = summary.elapsed.as_millis() as u64,
                    "Batch completed"
                );
                Ok(summary)
            }
            Err(e) => {
                self.transition(BatchState::Failed);
                if e.is_cancelled() {
                    debug!(batch_id, "Batch cancelled");
                } else {
                    self.events.publish(WatchEvent::BatchFailed {
                        batch_id,
                        error: e.to_string(),
                    });
                    error!(batch_id, error = %e, "Batch aborted");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, batch_id: u64, cancel: &CancellationToken) -> BatchOutcome {
        self.transition(BatchState::Enumerating);
        let targets = match self.source.list_targets().await {
            Ok(targets) => targets,
            Err(StoreError::NotFound(reason)) => {
                debug!(batch_id, reason = %reason, "No targets to check");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut summary = BatchSummary::new(batch_id, targets.len());

        if !targets.is_empty() {
            // 中断時に処理中のプローブも止める
            let batch_cancel = cancel.child_token();
            let _stop_workers = batch_cancel.clone().drop_guard();

            self.transition(BatchState::Dispatching);
            let mut pool = WorkerPool::new(self.worker_count)?;
            let jobs: Vec<Job<ProbeResult>> = targets
                .into_iter()
                .map(|target| {
                    let prober = Arc::clone(&self.prober);
                    Job::new(target.to_string(), move || async move {
                        prober.probe(&target).await
                    })
                })
                .collect();
            pool.submit(jobs)?;
            pool.close();

            self.transition(BatchState::Collecting);
            let mut results = pool.run(batch_cancel);

            while let Some(result) = results.recv().await {
                let probe = result?;

                self.transition(BatchState::Persisting);
                self.sink.save(&probe).await?;
                summary.record(&probe);
                self.log_result(batch_id, &probe);
                self.events.publish(WatchEvent::TargetChecked {
                    batch_id,
                    target: probe.target().clone(),
                    available: probe.is_available(),
                    latency_ms: probe.latency_ms(),
                });
                self.transition(BatchState::Collecting);
            }
        }

        // ワーカーが結果を出さずに止まった場合、部分的なバッチでキャッシュを無効化しない
        if cancel.is_cancelled() {
            return Err(WatchError::Cancelled);
        }

        self.transition(BatchState::Invalidating);
        match self.cache.invalidate_tag(&self.cache_tag).await {
            Ok(removed) => summary.invalidated = removed,
            Err(CacheError::Miss(_)) => {
                debug!(batch_id, tag = %self.cache_tag, "Nothing cached under tag");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(summary)
    }

    fn log_result(&self, batch_id: u64, probe: &ProbeResult) {
        if probe.is_available() {
            debug!(
                batch_id,
                url = %probe.target(),
                latency_ms = probe.latency_ms(),
                "Target available"
            );
        } else {
            warn!(batch_id, url = %probe.target(), "Target unavailable");
        }
    }

    fn transition(&self, next: BatchState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            trace!(from = %previous, to = %next, "Batch state changed");
        }
    }
}
