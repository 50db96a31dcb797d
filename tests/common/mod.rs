use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tempfile::TempDir;

use sigwatch::db;
use sigwatch::db::signal_repo;
use sigwatch::engine::{EngineConfig, LifecycleEngine};
use sigwatch::errors::{PriceUnavailable, SourceError};
use sigwatch::ingestion::{DraftBatch, DraftSource};
use sigwatch::models::event::{EventKind, SignalEvent, SnapshotRow};
use sigwatch::models::{Mode, Side, Signal, SignalDraft, Zone};
use sigwatch::oracle::PriceOracle;
use sigwatch::sink::EventSink;

/// Open a fresh sqlite database in a temp directory and run all migrations.
/// The `TempDir` must stay alive as long as the pool is in use.
#[allow(dead_code)]
pub async fn setup_test_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("test.db");

    let pool = db::init_pool(path.to_str().unwrap())
        .await
        .expect("Failed to open test database");

    (pool, dir)
}

/// Engine config shared by the test suites: 5-day activation window, 30-day
/// reporting window, 15% entry2 disable threshold, 10x display leverage.
#[allow(dead_code)]
pub fn test_engine_config() -> EngineConfig {
    EngineConfig {
        activation_window_days: 5,
        reporting_window_days: 30,
        entry2_disable_profit_pct: Decimal::from(15),
        leverage_multiplier: Decimal::from(10),
    }
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

#[allow(dead_code)]
pub fn make_draft(
    message_id: i64,
    symbol: &str,
    side: Side,
    mode: Mode,
    entry1: Zone,
    entry2: Option<Zone>,
    targets: Vec<Decimal>,
) -> SignalDraft {
    SignalDraft {
        source_message_id: message_id,
        symbol: symbol.into(),
        side,
        mode,
        entry1,
        entry2,
        targets,
    }
}

/// Insert a draft and return the new row id.
#[allow(dead_code)]
pub async fn seed_signal(pool: &SqlitePool, draft: &SignalDraft, created_at: DateTime<Utc>) -> i64 {
    signal_repo::insert_draft(pool, draft, created_at)
        .await
        .expect("Failed to insert draft")
        .expect("Draft should not be a duplicate")
}

/// Mark a seeded signal activated at the given price and time.
#[allow(dead_code)]
pub async fn activate_signal(pool: &SqlitePool, id: i64, price: Decimal, at: DateTime<Utc>) {
    signal_repo::mark_activated(pool, id, price, at, false)
        .await
        .expect("Failed to activate signal");
}

#[allow(dead_code)]
pub async fn get_signal(pool: &SqlitePool, id: i64) -> Signal {
    signal_repo::get_signal(pool, id)
        .await
        .expect("DB query should succeed")
        .expect("Signal should exist")
}

#[allow(dead_code)]
pub fn make_engine(
    pool: &SqlitePool,
    oracle: std::sync::Arc<MockOracle>,
    sink: std::sync::Arc<RecordingSink>,
) -> LifecycleEngine {
    LifecycleEngine::new(pool.clone(), oracle, sink, test_engine_config())
}

// ---------------------------------------------------------------------------
// MockOracle
// ---------------------------------------------------------------------------

/// Price oracle backed by an in-memory table. Symbols without an entry are
/// unavailable, which is how price-feed outages are simulated.
#[derive(Default)]
pub struct MockOracle {
    prices: Mutex<HashMap<String, Decimal>>,
}

#[allow(dead_code)]
impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(symbol: &str, price: Decimal) -> Self {
        let oracle = Self::new();
        oracle.set(symbol, price);
        oracle
    }

    pub fn set(&self, symbol: &str, price: Decimal) {
        self.prices.lock().unwrap().insert(symbol.into(), price);
    }

    pub fn clear(&self, symbol: &str) {
        self.prices.lock().unwrap().remove(symbol);
    }
}

#[async_trait]
impl PriceOracle for MockOracle {
    async fn price(&self, symbol: &str) -> Result<Decimal, PriceUnavailable> {
        self.prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| PriceUnavailable::new(symbol, "no mock price"))
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Sink that records everything it is handed, in order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SignalEvent>>,
    snapshots: Mutex<Vec<Vec<SnapshotRow>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SignalEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|e| e.kind).collect()
    }

    pub fn events_of(&self, kind: EventKind) -> Vec<SignalEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn snapshots(&self) -> Vec<Vec<SnapshotRow>> {
        self.snapshots.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, event: &SignalEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    async fn mirror(&self, rows: &[SnapshotRow]) {
        self.snapshots.lock().unwrap().push(rows.to_vec());
    }
}

// ---------------------------------------------------------------------------
// StaticSource
// ---------------------------------------------------------------------------

/// Draft source fed from a queue of pre-built batches; once the queue is
/// drained every fetch returns an empty page at the requested offset.
#[derive(Default)]
pub struct StaticSource {
    batches: Mutex<VecDeque<DraftBatch>>,
}

#[allow(dead_code)]
impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&self, next_offset: i64, drafts: Vec<SignalDraft>) {
        self.batches.lock().unwrap().push_back(DraftBatch {
            next_offset,
            drafts,
        });
    }
}

#[async_trait]
impl DraftSource for StaticSource {
    async fn fetch(&self, offset: i64) -> Result<DraftBatch, SourceError> {
        Ok(self
            .batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| DraftBatch::empty(offset)))
    }
}
