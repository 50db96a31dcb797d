/// Price lookup yielded nothing usable. Always recoverable: the engine
/// skips the affected signal for the current tick.
#[derive(Debug, thiserror::Error)]
#[error("price unavailable for {symbol}: {reason}")]
pub struct PriceUnavailable {
    pub symbol: String,
    pub reason: String,
}

impl PriceUnavailable {
    pub fn new(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// A persisted value failed to parse back (decimal or targets JSON).
    #[error("corrupt stored value: {0}")]
    Decode(String),
}

/// Failure fetching drafts from the upstream source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Failure in one ingestion cycle. Either side aborts the batch before
/// the offset is saved, so the next cycle redelivers.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stored row violates an engine invariant (e.g. tp_hits beyond the
    /// target count). Fatal for that signal's tick only.
    #[error("invariant violated for signal {signal_id}: {detail}")]
    InvariantViolation { signal_id: i64, detail: String },
}
