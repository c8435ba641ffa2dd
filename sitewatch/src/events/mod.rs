//! 監視イベントバス
//!
//! バッチの開始・各ターゲットの結果・完了/失敗を購読者にブロードキャストするための基盤。
//! `watch` デーモンは [`AvailabilityTracker`] で購読し、稼働状況の変化をログに出す。

use crate::types::Target;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// イベントバスのチャネル容量
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// 監視イベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WatchEvent {
    /// バッチ開始
    BatchStarted {
        /// 通し番号
        batch_id: u64,
    },
    /// ターゲットの結果を保存した
    TargetChecked {
        /// 通し番号
        batch_id: u64,
        /// 対象
        target: Target,
        /// 稼働状況
        available: bool,
        /// レイテンシ（ミリ秒、稼働時のみ）
        latency_ms: Option<u64>,
    },
    /// バッチ完了（キャッシュ無効化まで成功）
    BatchCompleted {
        /// 通し番号
        batch_id: u64,
        /// 対象数
        targets: usize,
        /// 稼働数
        available: usize,
        /// 処理時間（ミリ秒）
        duration_ms: u64,
    },
    /// バッチ中断
    BatchFailed {
        /// 通し番号
        batch_id: u64,
        /// エラー内容
        error: String,
    },
}

/// 監視イベントバス
#[derive(Clone)]
pub struct WatchEventBus {
    sender: broadcast::Sender<WatchEvent>,
}

impl Default for WatchEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchEventBus {
    /// 新しいイベントバスを作成
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// イベントバスを購読
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.sender.subscribe()
    }

    /// イベントを発行
    ///
    /// 購読者がいない場合でもエラーにはならない
    pub fn publish(&self, event: WatchEvent) {
        let _ = self.sender.send(event);
    }

    /// 現在の購読者数を取得
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Arc でラップされたイベントバス
pub type SharedEventBus = Arc<WatchEventBus>;

/// 共有可能なイベントバスを作成
pub fn create_shared_event_bus() -> SharedEventBus {
    Arc::new(WatchEventBus::new())
}

/// 稼働状況の変化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// 停止 → 稼働
    Recovered,
    /// 稼働 → 停止
    WentDown,
}

/// ターゲットごとの直前の稼働状況を保持し、変化を検出する
#[derive(Debug, Default)]
pub struct AvailabilityTracker {
    last: HashMap<Target, bool>,
}

impl AvailabilityTracker {
    /// 空のトラッカーを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// イベントを反映し、稼働状況が変化していれば返す
    ///
    /// 初回の観測は変化として扱わない。
    pub fn observe(&mut self, event: &WatchEvent) -> Option<Transition> {
        let WatchEvent::TargetChecked {
            target, available, ..
        } = event
        else {
            return None;
        };

        match self.last.insert(target.clone(), *available) {
            Some(false) if *available => Some(Transition::Recovered),
            Some(true) if !*available => Some(Transition::WentDown),
            _ => None,
        }
    }

    /// 追跡中のターゲット数
    pub fn len(&self) -> usize {
        self.last.len()
    }

    /// 追跡中のターゲットがないか
    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }

    /// バスを購読し、変化をログに出すタスクを起動する
    pub fn spawn(bus: &WatchEventBus, cancel: CancellationToken) -> JoinHandle<()> {
        let mut receiver = bus.subscribe();
        tokio::spawn(async move {
            let mut tracker = Self::new();
            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    received = receiver.recv() => received,
                };

                match event {
                    Ok(event) => tracker.log_transition(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Availability tracker lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn log_transition(&mut self, event: &WatchEvent) {
        let Some(transition) = self.observe(event) else {
            return;
        };
        if let WatchEvent::TargetChecked {
            target, latency_ms, ..
        } = event
        {
            match transition {
                Transition::Recovered => info!(url = %target, latency_ms, "Website recovered"),
                Transition::WentDown => warn!(url = %target, "Website went down"),
            }
        }
    }
}
