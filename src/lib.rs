pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod oracle;
pub mod services;
pub mod sink;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::ingestion::DraftSource;
use crate::oracle::PriceOracle;
use crate::sink::EventSink;

/// Everything one node needs to compete for the lease and run: the store,
/// the config, and the pluggable edges. `source` is optional; a node without
/// one only monitors signals already in the store.
#[derive(Clone)]
pub struct Service {
    pub pool: sqlx::SqlitePool,
    pub config: AppConfig,
    pub oracle: Arc<dyn PriceOracle>,
    pub sink: Arc<dyn EventSink>,
    pub source: Option<Arc<dyn DraftSource>>,
}
