pub mod telegram;

pub use telegram::TelegramSink;

use async_trait::async_trait;

use crate::models::{SignalEvent, SnapshotRow};

/// Outbound side of the core: lifecycle events and dashboard snapshots.
/// Delivery is best-effort by contract — implementations log failures and
/// drop them, nothing propagates back into the engine.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Hand over one lifecycle event.
    async fn publish(&self, event: &SignalEvent);

    /// Hand over the current dashboard snapshot.
    async fn mirror(&self, rows: &[SnapshotRow]);
}

/// Log-only sink, used when no Telegram credentials are configured.
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn publish(&self, event: &SignalEvent) {
        tracing::info!(
            signal_id = event.signal_id,
            symbol = %event.symbol,
            kind = %event.kind,
            index = event.index,
            price = event.price.map(|p| p.to_string()),
            "signal event"
        );
    }

    async fn mirror(&self, rows: &[SnapshotRow]) {
        tracing::debug!(rows = rows.len(), "dashboard snapshot");
    }
}
