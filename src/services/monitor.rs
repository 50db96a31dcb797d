use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::engine::LifecycleEngine;

/// Run the lifecycle monitor loop while the fence is up. Each tick advances
/// every live signal against current prices. The loop exits when leadership
/// is lost so the supervisor can drain and restart it on the next term.
pub async fn run_monitor(
    engine: Arc<LifecycleEngine>,
    interval_secs: u64,
    fence: Arc<AtomicBool>,
) {
    tracing::info!(interval_secs = interval_secs, "lifecycle monitor started");
    let mut ticker = interval(Duration::from_secs(interval_secs));

    loop {
        ticker.tick().await;

        if !fence.load(Ordering::Relaxed) {
            tracing::info!("lifecycle monitor stopping, leadership lost");
            break;
        }

        match engine.tick(Utc::now(), &fence).await {
            Ok(report) => {
                tracing::debug!(
                    signals = report.signals,
                    processed = report.processed,
                    events = report.events,
                    skipped = report.skipped,
                    failed = report.failed,
                    "tick complete"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "tick failed");
            }
        }
    }
}
