use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use super::DraftSource;
use crate::db::{signal_repo, state_repo};
use crate::errors::IngestError;
use crate::models::event::{EventKind, SignalEvent};
use crate::models::Mode;
use crate::oracle::PriceOracle;
use crate::sink::EventSink;

/// What one ingestion cycle did, for the caller's log line.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub drafts: usize,
    pub inserted: u32,
    pub duplicates: u32,
    pub activated: u32,
}

/// Run one ingestion cycle:
/// 1. Retry MARKET activations that had no price on an earlier cycle
/// 2. Fetch the next page of drafts from the source
/// 3. Store each draft; duplicates by source message id are no-ops
/// 4. Activate MARKET drafts at the current price, or defer on lookup failure
/// 5. Persist the source offset, only after the whole page is durable
///
/// Every event is published only after its row change committed, so a crash
/// can lose an emission but never emit ahead of the store. The fence is
/// re-checked between drafts; when it drops the offset stays unsaved and the
/// next leader redelivers the page.
pub async fn ingest_batch(
    pool: &SqlitePool,
    source: &dyn DraftSource,
    oracle: &dyn PriceOracle,
    sink: &dyn EventSink,
    now: DateTime<Utc>,
    fence: &AtomicBool,
) -> Result<IngestReport, IngestError> {
    let start = Instant::now();
    let mut report = IngestReport::default();

    // Step 1: deferred MARKET activations from previous cycles.
    activate_pending_market(pool, oracle, sink, now, fence, &mut report).await?;

    // Step 2: next page.
    let offset = state_repo::get_offset(pool).await?;
    let batch = source.fetch(offset).await?;
    report.drafts = batch.drafts.len();

    for draft in &batch.drafts {
        if !fence.load(Ordering::Relaxed) {
            tracing::info!("leadership fence dropped mid-batch, leaving offset unsaved");
            return Ok(report);
        }

        // Step 3: store.
        if let Err(reason) = draft.validate() {
            tracing::warn!(
                message_id = draft.source_message_id,
                reason = %reason,
                "dropping invalid draft"
            );
            continue;
        }

        let id = match signal_repo::insert_draft(pool, draft, now).await? {
            Some(id) => id,
            None => {
                tracing::debug!(
                    message_id = draft.source_message_id,
                    "duplicate draft, already tracked"
                );
                counter!("duplicate_drafts_total").increment(1);
                report.duplicates += 1;
                continue;
            }
        };

        counter!("signals_ingested_total").increment(1);
        report.inserted += 1;
        tracing::info!(
            signal_id = id,
            symbol = %draft.symbol,
            side = %draft.side,
            mode = %draft.mode,
            "signal ingested"
        );

        sink.publish(&SignalEvent::from_parts(
            id,
            &draft.symbol,
            draft.side,
            EventKind::Created,
            now,
        ))
        .await;

        // Step 4: MARKET signals activate at the first price we can get.
        if draft.mode == Mode::Market {
            match oracle.price(&draft.symbol).await {
                Ok(price) => {
                    signal_repo::mark_activated(pool, id, price, now, false).await?;
                    counter!("activations_total").increment(1);
                    report.activated += 1;

                    let event = SignalEvent {
                        price: Some(price),
                        ..SignalEvent::from_parts(
                            id,
                            &draft.symbol,
                            draft.side,
                            EventKind::Activated,
                            now,
                        )
                    };
                    sink.publish(&event).await;
                }
                Err(e) => {
                    counter!("price_lookup_failures_total").increment(1);
                    tracing::warn!(
                        signal_id = id,
                        symbol = %draft.symbol,
                        error = %e,
                        "no price for market activation, deferring to a later cycle"
                    );
                }
            }
        }
    }

    // Step 5: persist progress. Anything that failed above aborted before
    // this point, so the source redelivers the page next cycle and the
    // duplicate check absorbs the replay.
    if batch.next_offset > offset {
        state_repo::set_offset(pool, batch.next_offset).await?;
    }

    histogram!("ingest_batch_duration_seconds").record(start.elapsed().as_secs_f64());
    Ok(report)
}

async fn activate_pending_market(
    pool: &SqlitePool,
    oracle: &dyn PriceOracle,
    sink: &dyn EventSink,
    now: DateTime<Utc>,
    fence: &AtomicBool,
    report: &mut IngestReport,
) -> Result<(), IngestError> {
    for signal in signal_repo::list_pending_market(pool).await? {
        if !fence.load(Ordering::Relaxed) {
            return Ok(());
        }
        match oracle.price(&signal.symbol).await {
            Ok(price) => {
                signal_repo::mark_activated(pool, signal.id, price, now, false).await?;
                counter!("activations_total").increment(1);
                report.activated += 1;
                tracing::info!(
                    signal_id = signal.id,
                    symbol = %signal.symbol,
                    price = %price,
                    "deferred market activation"
                );
                sink.publish(&SignalEvent::with_price(
                    &signal,
                    EventKind::Activated,
                    price,
                    now,
                ))
                .await;
            }
            Err(e) => {
                counter!("price_lookup_failures_total").increment(1);
                tracing::debug!(
                    signal_id = signal.id,
                    symbol = %signal.symbol,
                    error = %e,
                    "price still unavailable, market signal stays pending"
                );
            }
        }
    }

    Ok(())
}
