//! add / remove / list サブコマンド
//!
//! 監視対象の登録・削除・一覧を行います。

use crate::config::{get_env_with_fallback_or, DEFAULT_DATABASE_URL};
use crate::db::{self, SqliteTargetStore};
use crate::types::Target;
use clap::Args;

/// add サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// URLs or hosts to register
    #[arg(required = true)]
    pub urls: Vec<String>,
}

/// remove サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct RemoveArgs {
    /// URLs or hosts to unregister
    #[arg(required = true)]
    pub urls: Vec<String>,
}

/// list サブコマンドの引数
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Print as JSON instead of a table
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

async fn open_store() -> Result<SqliteTargetStore, anyhow::Error> {
    let database_url =
        get_env_with_fallback_or("SITEWATCH_DATABASE_URL", "DATABASE_URL", DEFAULT_DATABASE_URL);
    let pool = db::connect(&database_url).await?;
    Ok(SqliteTargetStore::new(pool))
}

/// 入力をすべて正規化する（1つでも不正なら何も登録しない）
fn parse_all(urls: &[String]) -> Result<Vec<Target>, anyhow::Error> {
    urls.iter()
        .map(|raw| Target::parse(raw).map_err(anyhow::Error::from))
        .collect()
}

/// add コマンドを実行
pub async fn execute_add(args: &AddArgs) -> Result<(), anyhow::Error> {
    let targets = parse_all(&args.urls)?;
    let store = open_store().await?;

    for target in &targets {
        if store.add_target(target).await? {
            println!("Added {}", target);
        } else {
            println!("Already registered: {}", target);
        }
    }
    Ok(())
}

/// remove コマンドを実行
pub async fn execute_remove(args: &RemoveArgs) -> Result<(), anyhow::Error> {
    let targets = parse_all(&args.urls)?;
    let store = open_store().await?;

    for target in &targets {
        if store.remove_target(target).await? {
            println!("Removed {}", target);
        } else {
            println!("Not registered: {}", target);
        }
    }
    Ok(())
}

/// list コマンドを実行
pub async fn execute_list(args: &ListArgs) -> Result<(), anyhow::Error> {
    let store = open_store().await?;
    let records = store.list().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No websites registered");
        return Ok(());
    }

    println!("{:<48} {:<8} {:>10}  LAST CHECK", "URL", "STATUS", "LATENCY");
    for record in records {
        let status = match (record.last_check_at, record.available) {
            (None, _) => "pending",
            (Some(_), true) => "up",
            (Some(_), false) => "down",
        };
        let latency = record
            .latency
            .map(|d| format!("{}ms", d.as_millis()))
            .unwrap_or_else(|| "-".to_string());
        let checked = record
            .last_check_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<48} {:<8} {:>10}  {}",
            record.target, status, latency, checked
        );
    }
    Ok(())
}
