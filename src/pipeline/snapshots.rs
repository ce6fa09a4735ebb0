//! Periodic milestone snapshot task.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::LaunchServices;

/// Capture a tracker snapshot every `interval` until cancelled.
pub async fn run_snapshot_loop(
    services: Arc<LaunchServices>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // Skip the immediate first tick
    ticker.tick().await;

    info!(interval_secs = interval.as_secs(), "Status snapshot task started");
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Status snapshot task stopping");
                break;
            }
            _ = ticker.tick() => {
                services.capture_snapshot().await;
                let retained = services.aggregator.read().await.snapshot_count();
                debug!(retained, "Status snapshot captured");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_loop_future_is_spawnable() {
        let services = Arc::new(LaunchServices::default());
        let task = run_snapshot_loop(services, Duration::from_secs(1), CancellationToken::new());
        assert_send(&task);
    }

    #[tokio::test]
    async fn test_loop_captures_until_cancelled() {
        let services = Arc::new(LaunchServices::default());
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_snapshot_loop(
            Arc::clone(&services),
            Duration::from_millis(5),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        task.await.unwrap();

        let captured = services.aggregator.read().await.snapshot_count();
        assert!(captured >= 1, "expected snapshots, got {captured}");
    }
}
