use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::time::{interval, Duration};

use crate::db::signal_repo;
use crate::models::event::SnapshotRow;
use crate::sink::EventSink;

/// Run the snapshot mirror loop while the fence is up. Every cycle hands the
/// most recent signals, full state included, to the sink for the dashboard
/// consumer. Mirroring runs under the lease like the writers do, so two
/// processes never publish competing snapshots.
pub async fn run_mirror(
    pool: SqlitePool,
    sink: Arc<dyn EventSink>,
    interval_secs: u64,
    rows: i64,
    fence: Arc<AtomicBool>,
) {
    tracing::info!(
        interval_secs = interval_secs,
        rows = rows,
        "snapshot mirror started"
    );
    let mut ticker = interval(Duration::from_secs(interval_secs));

    loop {
        ticker.tick().await;

        if !fence.load(Ordering::Relaxed) {
            tracing::info!("snapshot mirror stopping, leadership lost");
            break;
        }

        let signals = match signal_repo::list_recent(&pool, rows).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "snapshot query failed");
                continue;
            }
        };

        let snapshot: Vec<SnapshotRow> = signals.iter().map(SnapshotRow::from).collect();
        sink.mirror(&snapshot).await;
        tracing::debug!(rows = snapshot.len(), "snapshot mirrored");
    }
}
