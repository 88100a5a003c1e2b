//! Graceful shutdown handling for the gateway.
//!
//! Shutdown happens in two steps. The first signal stops the listener from
//! accepting connections while in-flight requests keep running. If they have
//! not finished when the grace period runs out, the root cancellation token is
//! cancelled, which ends every backend call and open stream.

use std::future::Future;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Wait for Ctrl+C, SIGTERM, SIGINT or SIGQUIT.
///
/// A handler that cannot be installed is logged and never fires; the others
/// keep working.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        "ctrl+c"
    };

    #[cfg(unix)]
    let sigterm = unix_signal(signal::unix::SignalKind::terminate(), "sigterm");
    #[cfg(unix)]
    let sigint = unix_signal(signal::unix::SignalKind::interrupt(), "sigint");
    #[cfg(unix)]
    let sigquit = unix_signal(signal::unix::SignalKind::quit(), "sigquit");

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<&str>();
    #[cfg(not(unix))]
    let sigint = std::future::pending::<&str>();
    #[cfg(not(unix))]
    let sigquit = std::future::pending::<&str>();

    let signal_name = tokio::select! {
        name = ctrl_c => name,
        name = sigterm => name,
        name = sigint => name,
        name = sigquit => name,
    };

    info!(signal = signal_name, "Received shutdown signal");
}

#[cfg(unix)]
async fn unix_signal(kind: signal::unix::SignalKind, name: &'static str) -> &'static str {
    match signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(signal = name, error = %e, "Failed to install signal handler");
            std::future::pending::<()>().await;
        }
    }
    name
}

/// Await `drained`; once `grace` elapses, cancel `root` and keep waiting.
///
/// Returns whether the in-flight work finished inside the grace period.
pub async fn drain<F>(drained: F, root: &CancellationToken, grace: Duration) -> (F::Output, bool)
where
    F: Future,
{
    tokio::pin!(drained);

    if let Ok(output) = tokio::time::timeout(grace, &mut drained).await {
        return (output, true);
    }

    warn!(
        grace_secs = grace.as_secs(),
        "Grace period elapsed, cancelling in-flight requests"
    );
    root.cancel();
    (drained.await, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_within_grace() {
        let root = CancellationToken::new();
        let (value, clean) = drain(async { 7 }, &root, Duration::from_secs(1)).await;

        assert_eq!(value, 7);
        assert!(clean);
        assert!(!root.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_cancels_after_grace() {
        let root = CancellationToken::new();
        let child = root.child_token();
        let work = async move {
            child.cancelled().await;
            "cancelled"
        };

        let (value, clean) = drain(work, &root, Duration::from_secs(5)).await;

        assert_eq!(value, "cancelled");
        assert!(!clean);
        assert!(root.is_cancelled());
    }
}
