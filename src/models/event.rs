use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use super::{Mode, Side, Signal, SignalStatus, Zone};

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Activated,
    Entry2Activated,
    TargetHit,
    Tp1Refire,
    AvgReclaimed,
    Expired,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Activated => "activated",
            EventKind::Entry2Activated => "entry2_activated",
            EventKind::TargetHit => "target_hit",
            EventKind::Tp1Refire => "tp1_refire",
            EventKind::AvgReclaimed => "avg_reclaimed",
            EventKind::Expired => "expired",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SignalEvent — what the engine hands to the sink
// ---------------------------------------------------------------------------

/// One lifecycle event. `index` is the 1-based target index for target-hit
/// style events; the profit fields are percentages, with the entry2 pair
/// present only while the secondary entry is active.
#[derive(Debug, Clone, Serialize)]
pub struct SignalEvent {
    pub signal_id: i64,
    pub symbol: String,
    pub side: Side,
    pub kind: EventKind,
    pub index: Option<u32>,
    pub price: Option<Decimal>,
    pub profit_pct: Option<Decimal>,
    pub leveraged_profit_pct: Option<Decimal>,
    pub entry2_profit_pct: Option<Decimal>,
    pub entry2_leveraged_profit_pct: Option<Decimal>,
    pub at: DateTime<Utc>,
}

impl SignalEvent {
    /// Event built before the row has been read back, e.g. right after an
    /// insert returns the new id.
    pub fn from_parts(
        signal_id: i64,
        symbol: &str,
        side: Side,
        kind: EventKind,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            signal_id,
            symbol: symbol.to_string(),
            side,
            kind,
            index: None,
            price: None,
            profit_pct: None,
            leveraged_profit_pct: None,
            entry2_profit_pct: None,
            entry2_leveraged_profit_pct: None,
            at,
        }
    }

    /// Event with no index/price/profit payload.
    pub fn plain(signal: &Signal, kind: EventKind, at: DateTime<Utc>) -> Self {
        Self::from_parts(signal.id, &signal.symbol, signal.side, kind, at)
    }

    pub fn with_price(signal: &Signal, kind: EventKind, price: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            price: Some(price),
            ..Self::plain(signal, kind, at)
        }
    }
}

// ---------------------------------------------------------------------------
// SnapshotRow — full-state row for dashboard mirroring
// ---------------------------------------------------------------------------

/// Everything the dashboard consumer needs about one signal, including the
/// derived status label.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRow {
    pub id: i64,
    pub source_message_id: i64,
    pub symbol: String,
    pub side: Side,
    pub mode: Mode,
    pub status: SignalStatus,
    pub entry1: Zone,
    pub entry2: Option<Zone>,
    pub targets: Vec<Decimal>,
    pub tp_hits: u32,
    pub activated_price: Option<Decimal>,
    pub entry2_activated_price: Option<Decimal>,
    pub high_water_pct: Option<Decimal>,
    pub tp1_refired: bool,
    pub avg_reclaimed: bool,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
}

impl From<&Signal> for SnapshotRow {
    fn from(s: &Signal) -> Self {
        Self {
            id: s.id,
            source_message_id: s.source_message_id,
            symbol: s.symbol.clone(),
            side: s.side,
            mode: s.mode,
            status: s.status(),
            entry1: s.entry1,
            entry2: s.entry2,
            targets: s.targets.clone(),
            tp_hits: s.tp_hits,
            activated_price: s.activated_price,
            entry2_activated_price: s.entry2_activated_price,
            high_water_pct: s.high_water_pct,
            tp1_refired: s.tp1_refired,
            avg_reclaimed: s.avg_reclaimed,
            created_at: s.created_at,
            activated_at: s.activated_at,
        }
    }
}
