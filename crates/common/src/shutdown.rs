//! Process shutdown helpers shared by the HTTP server and background loops.

use tokio::sync::watch;
use tracing::info;

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(event = "shutdown_signal", signal = "ctrl_c", "shutdown requested"),
        _ = terminate => info!(event = "shutdown_signal", signal = "sigterm", "shutdown requested"),
    }
}

/// A `watch` pair that flips to `true` once shutdown starts.
/// Loops hold the receiver and exit when it changes.
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Wait until the receiver observes `true` (or the sender is dropped).
pub async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_for_shutdown_returns_after_flip() {
        let (tx, mut rx) = shutdown_channel();
        let waiter = tokio::spawn(async move { wait_for_shutdown(&mut rx).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn wait_for_shutdown_returns_when_sender_dropped() {
        let (tx, mut rx) = shutdown_channel();
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), wait_for_shutdown(&mut rx)).await.unwrap();
    }
}
