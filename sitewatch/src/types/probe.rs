//! プローブ結果の型定義

use super::target::Target;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// 1回のプローブの結果
///
/// 生成後は変更されない。`latency` は `available == true` のときのみ `Some`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    target: Target,
    available: bool,
    #[serde(rename = "latency_ms", serialize_with = "serialize_latency_ms")]
    latency: Option<Duration>,
    observed_at: DateTime<Utc>,
}

impl ProbeResult {
    /// 到達可能かつ成功ステータスだった結果を作成
    pub fn available(target: Target, latency: Duration, observed_at: DateTime<Utc>) -> Self {
        Self {
            target,
            available: true,
            latency: Some(latency),
            observed_at,
        }
    }

    /// 到達不能（またはステータス異常）だった結果を作成
    pub fn unavailable(target: Target, observed_at: DateTime<Utc>) -> Self {
        Self {
            target,
            available: false,
            latency: None,
            observed_at,
        }
    }

    /// 対象
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// 稼働しているか
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// レイテンシ（稼働時のみ）
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// レイテンシ（ミリ秒、稼働時のみ）
    pub fn latency_ms(&self) -> Option<u64> {
        self.latency.map(|d| d.as_millis() as u64)
    }

    /// プローブ開始時刻
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }
}

pub(crate) fn serialize_latency_ms<S: Serializer>(
    latency: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match latency {
        Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn deserialize_latency_ms<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}
