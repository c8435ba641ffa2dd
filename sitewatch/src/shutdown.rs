//! シグナルによるシャットダウン
//!
//! Ctrl+C / SIGTERM を受けたらルートの `CancellationToken` をキャンセルする。
//! スケジューラーと処理中のバッチはこのトークンの子で動作する。

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// シャットダウンシグナルを待機し、トークンをキャンセルする
///
/// トークンが先にキャンセルされた場合はそのまま戻る。
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = cancel.cancelled() => {
            return;
        }
    }

    cancel.cancel();
}

/// シグナル待機タスクを起動する
pub fn spawn_signal_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(shutdown_signal(cancel))
}
