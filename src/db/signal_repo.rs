use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::errors::StoreError;
use crate::models::{Mode, Side, Signal, SignalDraft, Zone};

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Raw signals row. Prices live as decimal strings and targets as a JSON
/// array; `TryFrom` turns this into the typed `Signal`.
#[derive(Debug, sqlx::FromRow)]
struct SignalRow {
    id: i64,
    source_message_id: i64,
    symbol: String,
    side: String,
    mode: String,
    entry1_low: String,
    entry1_high: String,
    entry2_low: Option<String>,
    entry2_high: Option<String>,
    targets: String,
    created_at: DateTime<Utc>,
    activated: bool,
    activated_at: Option<DateTime<Utc>>,
    activated_price: Option<String>,
    entry2_activated: bool,
    entry2_activated_at: Option<DateTime<Utc>>,
    entry2_activated_price: Option<String>,
    tp_hits: i64,
    high_water_pct: Option<String>,
    tp1_refire_armed: bool,
    tp1_refired: bool,
    avg_reclaimed: bool,
    reporting_expired: bool,
}

fn parse_decimal(s: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(s).map_err(|e| StoreError::Decode(format!("bad decimal {s:?}: {e}")))
}

fn parse_opt_decimal(s: &Option<String>) -> Result<Option<Decimal>, StoreError> {
    s.as_deref().map(parse_decimal).transpose()
}

impl TryFrom<SignalRow> for Signal {
    type Error = StoreError;

    fn try_from(row: SignalRow) -> Result<Self, StoreError> {
        let side = Side::from_db_str(&row.side)
            .ok_or_else(|| StoreError::Decode(format!("unknown side {:?}", row.side)))?;
        let mode = Mode::from_db_str(&row.mode)
            .ok_or_else(|| StoreError::Decode(format!("unknown mode {:?}", row.mode)))?;

        let entry1 = Zone::new(parse_decimal(&row.entry1_low)?, parse_decimal(&row.entry1_high)?);
        let entry2 = match (&row.entry2_low, &row.entry2_high) {
            (Some(low), Some(high)) => Some(Zone::new(parse_decimal(low)?, parse_decimal(high)?)),
            (None, None) => None,
            _ => {
                return Err(StoreError::Decode(format!(
                    "half-open entry2 zone on signal {}",
                    row.id
                )))
            }
        };

        let targets: Vec<Decimal> = serde_json::from_str(&row.targets)
            .map_err(|e| StoreError::Decode(format!("bad targets on signal {}: {e}", row.id)))?;

        let tp_hits = u32::try_from(row.tp_hits)
            .map_err(|_| StoreError::Decode(format!("negative tp_hits on signal {}", row.id)))?;

        Ok(Signal {
            id: row.id,
            source_message_id: row.source_message_id,
            symbol: row.symbol,
            side,
            mode,
            entry1,
            entry2,
            targets,
            created_at: row.created_at,
            activated: row.activated,
            activated_at: row.activated_at,
            activated_price: parse_opt_decimal(&row.activated_price)?,
            entry2_activated: row.entry2_activated,
            entry2_activated_at: row.entry2_activated_at,
            entry2_activated_price: parse_opt_decimal(&row.entry2_activated_price)?,
            tp_hits,
            high_water_pct: parse_opt_decimal(&row.high_water_pct)?,
            tp1_refire_armed: row.tp1_refire_armed,
            tp1_refired: row.tp1_refired,
            avg_reclaimed: row.avg_reclaimed,
            reporting_expired: row.reporting_expired,
        })
    }
}

fn rows_to_signals(rows: Vec<SignalRow>) -> Result<Vec<Signal>, StoreError> {
    rows.into_iter().map(Signal::try_from).collect()
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Insert a draft keyed by its source message id. Returns the new row id,
/// or `None` when a signal for that message already exists (idempotent).
pub async fn insert_draft(
    pool: &SqlitePool,
    draft: &SignalDraft,
    created_at: DateTime<Utc>,
) -> Result<Option<i64>, StoreError> {
    let targets = serde_json::to_string(&draft.targets)
        .map_err(|e| StoreError::Decode(format!("unencodable targets: {e}")))?;

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO signals (
            source_message_id, symbol, side, mode,
            entry1_low, entry1_high, entry2_low, entry2_high,
            targets, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(draft.source_message_id)
    .bind(&draft.symbol)
    .bind(draft.side.as_str())
    .bind(draft.mode.as_str())
    .bind(draft.entry1.low.to_string())
    .bind(draft.entry1.high.to_string())
    .bind(draft.entry2.map(|z| z.low.to_string()))
    .bind(draft.entry2.map(|z| z.high.to_string()))
    .bind(targets)
    .bind(created_at)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        Ok(None)
    } else {
        Ok(Some(result.last_insert_rowid()))
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub async fn get_signal(pool: &SqlitePool, id: i64) -> Result<Option<Signal>, StoreError> {
    let row = sqlx::query_as::<_, SignalRow>("SELECT * FROM signals WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(Signal::try_from).transpose()
}

/// All signals still in play (not reporting-expired), oldest first so tick
/// processing order is stable.
pub async fn list_active(pool: &SqlitePool) -> Result<Vec<Signal>, StoreError> {
    let rows = sqlx::query_as::<_, SignalRow>(
        "SELECT * FROM signals WHERE reporting_expired = 0 ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows_to_signals(rows)
}

/// Most recently created signals, for dashboard mirroring.
pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Signal>, StoreError> {
    let rows = sqlx::query_as::<_, SignalRow>(
        "SELECT * FROM signals ORDER BY created_at DESC, id DESC LIMIT ?1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows_to_signals(rows)
}

/// MARKET signals whose immediate activation was deferred because no price
/// was available at ingestion time.
pub async fn list_pending_market(pool: &SqlitePool) -> Result<Vec<Signal>, StoreError> {
    let rows = sqlx::query_as::<_, SignalRow>(
        "SELECT * FROM signals
         WHERE mode = 'MARKET' AND activated = 0 AND reporting_expired = 0
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows_to_signals(rows)
}

// ---------------------------------------------------------------------------
// Lifecycle updates
// ---------------------------------------------------------------------------
// Every mutation carries `reporting_expired = 0`: a terminal row can never
// change again, whatever the caller believes about it.

/// Record activation. When the landing zone was entry2 (`into_entry2`),
/// the secondary entry activates in the same statement with the same
/// price and timestamp.
pub async fn mark_activated(
    pool: &SqlitePool,
    id: i64,
    price: Decimal,
    at: DateTime<Utc>,
    into_entry2: bool,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE signals
        SET activated = 1,
            activated_at = ?2,
            activated_price = ?3,
            entry2_activated = CASE WHEN ?4 THEN 1 ELSE entry2_activated END,
            entry2_activated_at = CASE WHEN ?4 THEN ?2 ELSE entry2_activated_at END,
            entry2_activated_price = CASE WHEN ?4 THEN ?3 ELSE entry2_activated_price END
        WHERE id = ?1 AND reporting_expired = 0 AND activated = 0
        "#,
    )
    .bind(id)
    .bind(at)
    .bind(price.to_string())
    .bind(into_entry2)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record secondary-entry activation. `arm_tp1_refire` is set when target 1
/// was already consumed beforehand, so the engine knows a re-touch of that
/// level deserves its own event.
pub async fn mark_entry2_activated(
    pool: &SqlitePool,
    id: i64,
    price: Decimal,
    at: DateTime<Utc>,
    arm_tp1_refire: bool,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE signals
        SET entry2_activated = 1,
            entry2_activated_at = ?2,
            entry2_activated_price = ?3,
            tp1_refire_armed = ?4
        WHERE id = ?1 AND reporting_expired = 0 AND entry2_activated = 0
        "#,
    )
    .bind(id)
    .bind(at)
    .bind(price.to_string())
    .bind(arm_tp1_refire)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist a new consumed-target count. The `tp_hits < ?2` guard keeps the
/// counter monotonic at the store level.
pub async fn set_tp_hits(pool: &SqlitePool, id: i64, tp_hits: u32) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE signals SET tp_hits = ?2 WHERE id = ?1 AND reporting_expired = 0 AND tp_hits < ?2",
    )
    .bind(id)
    .bind(i64::from(tp_hits))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn set_high_water(pool: &SqlitePool, id: i64, pct: Decimal) -> Result<(), StoreError> {
    sqlx::query("UPDATE signals SET high_water_pct = ?2 WHERE id = ?1 AND reporting_expired = 0")
        .bind(id)
        .bind(pct.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn mark_tp1_refired(pool: &SqlitePool, id: i64) -> Result<(), StoreError> {
    sqlx::query("UPDATE signals SET tp1_refired = 1 WHERE id = ?1 AND reporting_expired = 0")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn mark_avg_reclaimed(pool: &SqlitePool, id: i64) -> Result<(), StoreError> {
    sqlx::query("UPDATE signals SET avg_reclaimed = 1 WHERE id = ?1 AND reporting_expired = 0")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Terminal transition; after this no update touches the row again.
pub async fn mark_expired(pool: &SqlitePool, id: i64) -> Result<(), StoreError> {
    sqlx::query("UPDATE signals SET reporting_expired = 1 WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
