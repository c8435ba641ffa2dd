//! check サブコマンド
//!
//! 1つのURLを1回だけプローブし、結果をJSONで出力します（保存はしません）。

use crate::config::get_env_with_fallback_parse;
use crate::health::probe::DEFAULT_PROBE_TIMEOUT_SECS;
use crate::health::HttpProber;
use clap::Args;
use std::time::Duration;

/// check サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// URL or host to probe
    pub url: String,

    /// Probe timeout in seconds (overrides SITEWATCH_PROBE_TIMEOUT_SECS)
    #[arg(short, long)]
    pub timeout: Option<u64>,
}

/// check コマンドを実行
pub async fn execute(args: &CheckArgs) -> Result<(), anyhow::Error> {
    let timeout_secs = args.timeout.unwrap_or_else(|| {
        get_env_with_fallback_parse(
            "SITEWATCH_PROBE_TIMEOUT_SECS",
            "PROBE_TIMEOUT_SECS",
            DEFAULT_PROBE_TIMEOUT_SECS,
        )
    });
    let prober = HttpProber::with_timeout(Duration::from_secs(timeout_secs.max(1)))?;

    let result = prober.check_url(&args.url).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
