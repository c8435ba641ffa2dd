//! watch サブコマンド
//!
//! 監視デーモンを起動し、シグナルを受けるまでバッチを定期実行します。

use crate::cache::SqliteTagCache;
use crate::config::WatchConfig;
use crate::db::{self, SqliteTargetStore};
use crate::events::AvailabilityTracker;
use crate::health::{BatchCoordinator, HttpProber, Scheduler};
use crate::shutdown::spawn_signal_listener;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// watch サブコマンドの引数
#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
    /// Seconds between batches (overrides SITEWATCH_WATCH_PERIOD_SECS)
    #[arg(short, long)]
    pub period: Option<u64>,

    /// Number of concurrent probes (overrides SITEWATCH_WORKERS)
    #[arg(short, long)]
    pub workers: Option<usize>,
}

impl WatchArgs {
    /// 環境変数の設定に引数を上書きする
    pub fn apply(&self, mut config: WatchConfig) -> Result<WatchConfig, crate::WatchError> {
        if let Some(period) = self.period {
            config.period = Duration::from_secs(period);
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.validate()?;
        Ok(config)
    }
}

/// watch コマンドを実行
pub async fn execute(args: &WatchArgs) -> Result<(), anyhow::Error> {
    let config = args.apply(WatchConfig::from_env()?)?;

    let pool = db::connect(&config.database_url).await?;
    let store = Arc::new(SqliteTargetStore::new(pool.clone()));
    let prober = Arc::new(HttpProber::with_timeout(config.probe_timeout)?);
    // fastest / slowest / get が書き込むキャッシュをバッチ完了時に無効化する
    let cache = Arc::new(SqliteTagCache::new(pool));

    let coordinator = BatchCoordinator::new(store.clone(), store, cache, prober)
        .with_cache_tag(config.cache_tag.clone())
        .with_worker_count(config.workers);

    info!(
        period_secs = config.period.as_secs(),
        workers = config.workers,
        cache_tag = %config.cache_tag,
        "Starting sitewatch"
    );

    let root = CancellationToken::new();
    let _signals = spawn_signal_listener(root.clone());
    let tracker = AvailabilityTracker::spawn(coordinator.events(), root.clone());

    let handle = Scheduler::new(Arc::new(coordinator))
        .with_failure_policy(config.failure_policy)
        .start(&root, config.period);

    let result = handle.finished().await;
    root.cancel();
    let _ = tracker.await;
    result?;
    info!("sitewatch stopped");
    Ok(())
}
