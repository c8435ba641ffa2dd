//! 単一ターゲットのプローブ
//!
//! 1回のHTTP GETで稼働状況とレイテンシを測定する。
//! ネットワーク起因の失敗（到達不能・タイムアウト・DNS失敗・非2xx）はすべて
//! `available = false` として結果に畳み込み、エラーにはしない。

use crate::common::error::WatchError;
use crate::types::{ProbeResult, Target};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{redirect, Client};
use std::time::{Duration, Instant};
use tracing::debug;

/// プローブのデフォルトタイムアウト（秒）
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// リダイレクト追従の上限（reqwestのデフォルトと同じ）
const MAX_REDIRECTS: usize = 10;

/// User-Agentヘッダー
const USER_AGENT: &str = concat!("sitewatch/", env!("CARGO_PKG_VERSION"));

/// プローブの抽象
///
/// コーディネーターはこのtraitを通してプローブするため、テストでは差し替え可能。
#[async_trait]
pub trait Prober: Send + Sync {
    /// ターゲットを1回プローブする
    async fn probe(&self, target: &Target) -> Result<ProbeResult, WatchError>;
}

/// reqwestによるHTTPプローバー
#[derive(Clone, Debug)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
}

impl HttpProber {
    /// デフォルトタイムアウトでプローバーを作成
    pub fn new() -> Result<Self, WatchError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS))
    }

    /// タイムアウトを指定してプローバーを作成
    pub fn with_timeout(timeout: Duration) -> Result<Self, WatchError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WatchError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// 設定済みのタイムアウト
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 生のURLを正規化して1回だけプローブする（永続化はしない）
    pub async fn check_url(&self, raw_url: &str) -> Result<ProbeResult, WatchError> {
        let target = Target::parse(raw_url)?;
        self.probe(&target).await
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, target: &Target) -> Result<ProbeResult, WatchError> {
        let url = target.url()?;

        let observed_at = Utc::now();
        let start = Instant::now();

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %target, error = %e, "Probe request failed");
                return Ok(ProbeResult::unavailable(target.clone(), observed_at));
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(url = %target, status = %status, "Probe returned non-success status");
            return Ok(ProbeResult::unavailable(target.clone(), observed_at));
        }

        // レスポンス完了までをレイテンシとする
        if let Err(e) = response.bytes().await {
            debug!(url = %target, error = %e, "Failed to read probe response body");
            return Ok(ProbeResult::unavailable(target.clone(), observed_at));
        }

        let latency = start.elapsed();
        debug!(
            url = %target,
            latency_ms = latency.as_millis() as u64,
            "Probe succeeded"
        );
        Ok(ProbeResult::available(target.clone(), latency, observed_at))
    }
}
