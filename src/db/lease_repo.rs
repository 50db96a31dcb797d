use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::errors::StoreError;

const LEASE_NAME: &str = "monitor";

/// Atomically acquire or renew the leadership lease.
///
/// The conditional upsert writes `(owner, now + ttl)` only when the lease
/// is unset, expired, or already held by `owner`; otherwise it is a no-op.
/// One affected row means granted. Because check and write are a single
/// statement, two processes racing here cannot both win.
pub async fn try_acquire_or_renew(
    pool: &SqlitePool,
    owner: &str,
    ttl_secs: u64,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let now_ms = now.timestamp_millis();
    let expires_at = now_ms + (ttl_secs as i64) * 1000;

    let result = sqlx::query(
        r#"
        INSERT INTO leader_lease (name, owner, expires_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(name) DO UPDATE
            SET owner = excluded.owner, expires_at = excluded.expires_at
            WHERE leader_lease.owner = excluded.owner
               OR leader_lease.expires_at <= ?4
        "#,
    )
    .bind(LEASE_NAME)
    .bind(owner)
    .bind(expires_at)
    .bind(now_ms)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Current lease row, if any: `(owner, expires_at)` with expiry in epoch
/// millis.
pub async fn current(pool: &SqlitePool) -> Result<Option<(String, i64)>, StoreError> {
    let row: Option<(String, i64)> =
        sqlx::query_as("SELECT owner, expires_at FROM leader_lease WHERE name = ?1")
            .bind(LEASE_NAME)
            .fetch_optional(pool)
            .await?;

    Ok(row)
}
