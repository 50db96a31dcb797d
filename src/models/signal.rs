use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Mode, Side, SignalStatus};

// ---------------------------------------------------------------------------
// Zone
// ---------------------------------------------------------------------------

/// Inclusive price interval. Constructed normalized (low <= high) so zone
/// membership never depends on the order the bounds appeared in the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub low: Decimal,
    pub high: Decimal,
}

impl Zone {
    pub fn new(a: Decimal, b: Decimal) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// A single-price "zone" (message gave one number, no range).
    pub fn point(price: Decimal) -> Self {
        Self { low: price, high: price }
    }

    pub fn contains(&self, price: Decimal) -> bool {
        self.low <= price && price <= self.high
    }
}

// ---------------------------------------------------------------------------
// SignalDraft — parser output, ingestion input
// ---------------------------------------------------------------------------

/// A parsed but not yet stored signal. The target list ordering (ascending
/// for LONG, descending for SHORT) is established here and never re-sorted
/// downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalDraft {
    pub source_message_id: i64,
    pub symbol: String,
    pub side: Side,
    pub mode: Mode,
    pub entry1: Zone,
    pub entry2: Option<Zone>,
    pub targets: Vec<Decimal>,
}

impl SignalDraft {
    /// Shape check before a draft reaches the store.
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.trim().is_empty() {
            return Err("empty symbol".into());
        }
        if self.targets.is_empty() {
            return Err("no target levels".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Signal — one tracked trade setup
// ---------------------------------------------------------------------------

/// A stored signal with its full lifecycle state. Static facts (symbol,
/// side, mode, zones, targets) never change after creation; the lifecycle
/// fields are mutated only by the engine under leadership.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub id: i64,
    pub source_message_id: i64,
    pub symbol: String,
    pub side: Side,
    pub mode: Mode,
    pub entry1: Zone,
    pub entry2: Option<Zone>,
    pub targets: Vec<Decimal>,
    pub created_at: DateTime<Utc>,

    pub activated: bool,
    pub activated_at: Option<DateTime<Utc>>,
    pub activated_price: Option<Decimal>,

    pub entry2_activated: bool,
    pub entry2_activated_at: Option<DateTime<Utc>>,
    pub entry2_activated_price: Option<Decimal>,

    pub tp_hits: u32,
    /// Best signed profit (entry1 basis, percent) ever observed while
    /// active. Monotonic; gates secondary-entry activation.
    pub high_water_pct: Option<Decimal>,

    pub tp1_refire_armed: bool,
    pub tp1_refired: bool,
    pub avg_reclaimed: bool,

    pub reporting_expired: bool,
}

impl Signal {
    pub fn status(&self) -> SignalStatus {
        if self.reporting_expired {
            SignalStatus::Expired
        } else if self.entry2_activated {
            SignalStatus::Entry2
        } else if self.activated {
            SignalStatus::Active
        } else {
            SignalStatus::New
        }
    }

    /// Mean of the primary and secondary activation prices; defined only
    /// once both entries are active.
    pub fn average_entry_price(&self) -> Option<Decimal> {
        match (self.activated_price, self.entry2_activated_price) {
            (Some(p1), Some(p2)) => Some((p1 + p2) / Decimal::from(2)),
            _ => None,
        }
    }
}
