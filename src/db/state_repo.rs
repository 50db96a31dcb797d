use sqlx::SqlitePool;

use crate::errors::StoreError;

const OFFSET_KEY: &str = "ingestion_offset";

pub async fn get_state(pool: &SqlitePool, key: &str) -> Result<Option<String>, StoreError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT v FROM app_state WHERE k = ?1")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.0))
}

pub async fn set_state(pool: &SqlitePool, key: &str, value: &str) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO app_state (k, v) VALUES (?1, ?2)
         ON CONFLICT(k) DO UPDATE SET v = excluded.v",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Last consumed ingestion offset; 0 when nothing has been consumed yet.
pub async fn get_offset(pool: &SqlitePool) -> Result<i64, StoreError> {
    Ok(get_state(pool, OFFSET_KEY)
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

pub async fn set_offset(pool: &SqlitePool, offset: i64) -> Result<(), StoreError> {
    set_state(pool, OFFSET_KEY, &offset.to_string()).await
}
