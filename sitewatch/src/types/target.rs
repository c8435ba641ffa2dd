//! 監視対象（Target）の型定義
//!
//! 入力URLを正規化し、`scheme://host[:port]` のオリジン文字列を識別子とする。

use crate::common::error::WatchError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// スキーム省略時に補うスキーム
const DEFAULT_SCHEME: &str = "https";

/// 監視対象エンドポイント
///
/// 生成後は不変。識別子は正規化済みのオリジン文字列。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target {
    origin: String,
}

impl Target {
    /// 生のURL文字列をパースして正規化する
    ///
    /// - 前後の空白を除去
    /// - スキームがなければ `https://` を補う
    /// - `http` / `https` 以外は拒否
    /// - パス・クエリ・フラグメント・認証情報は破棄
    pub fn parse(raw: &str) -> Result<Self, WatchError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(WatchError::InvalidInput("empty target url".to_string()));
        }

        // `http:/host` や `https:host` のような区切りの誤りをホスト名扱いにしない
        if let Some((scheme, _)) = trimmed.split_once(':') {
            let is_web_scheme =
                scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https");
            if is_web_scheme && !trimmed.contains("://") {
                return Err(WatchError::InvalidInput(format!(
                    "{}: expected '://' after scheme",
                    trimmed
                )));
            }
        }

        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("{}://{}", DEFAULT_SCHEME, trimmed)
        };

        let url = Url::parse(&candidate)
            .map_err(|e| WatchError::InvalidInput(format!("{}: {}", trimmed, e)))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(WatchError::InvalidInput(format!(
                    "{}: unsupported scheme '{}'",
                    trimmed, other
                )))
            }
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(WatchError::InvalidInput(format!(
                "{}: missing host",
                trimmed
            )));
        }

        Ok(Self {
            origin: url.origin().ascii_serialization(),
        })
    }

    /// 正規化済みの識別子（オリジン）
    pub fn as_str(&self) -> &str {
        &self.origin
    }

    /// ホスト部分
    pub fn host(&self) -> &str {
        self.origin
            .split_once("://")
            .map_or(self.origin.as_str(), |(_, rest)| rest)
    }

    /// プローブ先URL
    pub fn url(&self) -> Result<Url, WatchError> {
        Url::parse(&self.origin).map_err(|e| WatchError::InvalidInput(e.to_string()))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.origin)
    }
}

impl FromStr for Target {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Target {
    type Error = WatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.origin
    }
}
