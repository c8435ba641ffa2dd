//! fastest / slowest / get サブコマンド
//!
//! 保存済みの監視結果を参照し、JSONで出力します。
//! 結果は `watch` と同じデータベース上のキャッシュを経由するため、
//! 次のバッチが完了するまでは同じ値が返ります。

use crate::cache::SqliteTagCache;
use crate::config::WatchConfig;
use crate::db::{self, SqliteTargetStore, WebsiteRecord};
use crate::health::{HttpProber, WebsiteLookup};
use clap::Args;
use std::sync::Arc;

/// get サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    /// URL or host to look up (checked once if not registered)
    pub url: String,
}

async fn open_lookup() -> Result<WebsiteLookup, anyhow::Error> {
    let config = WatchConfig::from_env()?;
    let pool = db::connect(&config.database_url).await?;
    let prober = Arc::new(HttpProber::with_timeout(config.probe_timeout)?);

    Ok(WebsiteLookup::new(
        Arc::new(SqliteTargetStore::new(pool.clone())),
        prober,
        Arc::new(SqliteTagCache::new(pool)),
    )
    .with_cache_tag(config.cache_tag)
    .with_cache_ttl(Some(config.cache_ttl)))
}

fn print_record(record: &WebsiteRecord) -> Result<(), anyhow::Error> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

/// fastest コマンドを実行
pub async fn execute_fastest() -> Result<(), anyhow::Error> {
    let record = open_lookup().await?.fastest().await?;
    print_record(&record)
}

/// slowest コマンドを実行
pub async fn execute_slowest() -> Result<(), anyhow::Error> {
    let record = open_lookup().await?.slowest().await?;
    print_record(&record)
}

/// get コマンドを実行
pub async fn execute_get(args: &GetArgs) -> Result<(), anyhow::Error> {
    let record = open_lookup().await?.get_by_url(&args.url).await?;
    print_record(&record)
}
