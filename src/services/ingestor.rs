use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::time::{interval, Duration};

use crate::ingestion::{pipeline, DraftSource};
use crate::oracle::PriceOracle;
use crate::sink::EventSink;

/// Run the draft ingestor loop while the fence is up. Each cycle pulls one
/// page from the source, stores the drafts, and advances the saved offset.
pub async fn run_ingestor(
    pool: SqlitePool,
    source: Arc<dyn DraftSource>,
    oracle: Arc<dyn PriceOracle>,
    sink: Arc<dyn EventSink>,
    interval_secs: u64,
    fence: Arc<AtomicBool>,
) {
    tracing::info!(interval_secs = interval_secs, "draft ingestor started");
    let mut ticker = interval(Duration::from_secs(interval_secs));

    loop {
        ticker.tick().await;

        if !fence.load(Ordering::Relaxed) {
            tracing::info!("draft ingestor stopping, leadership lost");
            break;
        }

        match pipeline::ingest_batch(
            &pool,
            source.as_ref(),
            oracle.as_ref(),
            sink.as_ref(),
            Utc::now(),
            &fence,
        )
        .await
        {
            Ok(report) => {
                if report.inserted > 0 || report.activated > 0 {
                    tracing::info!(
                        inserted = report.inserted,
                        duplicates = report.duplicates,
                        activated = report.activated,
                        "ingestion cycle complete"
                    );
                } else {
                    tracing::debug!(drafts = report.drafts, "ingestion cycle complete");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "ingestion cycle failed");
            }
        }
    }
}
