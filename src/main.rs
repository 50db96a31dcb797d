use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use sigwatch::config::AppConfig;
use sigwatch::db::{self, state_repo};
use sigwatch::ingestion::{DraftSource, TelegramDraftSource};
use sigwatch::metrics::init_metrics;
use sigwatch::oracle::proxy::ProxyPriceOracle;
use sigwatch::oracle::PriceOracle;
use sigwatch::services::run_supervisor;
use sigwatch::sink::telegram::TelegramSink;
use sigwatch::sink::{EventSink, TracingSink};
use sigwatch::Service;

const STARTUP_PING_KEY: &str = "last_startup_ping";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;

    tracing::info!(path = %config.database_path, "Connecting to database...");
    let pool = db::init_pool(&config.database_path).await?;
    tracing::info!("Database ready");

    init_metrics(config.metrics_addr.as_deref());

    let oracle: Arc<dyn PriceOracle> =
        Arc::new(ProxyPriceOracle::new(config.price_proxy_url.clone()));

    let sink: Arc<dyn EventSink> = if config.has_telegram_sink() {
        let sink = TelegramSink::new(
            config.bot_token.clone().unwrap(),
            config.target_chat_id.clone().unwrap(),
            config.source_chat_id.map(|id| id.to_string()),
        );
        maybe_announce_startup(&pool, &sink).await?;
        Arc::new(sink)
    } else {
        tracing::warn!("No Telegram sink credentials — events go to the log only");
        Arc::new(TracingSink)
    };

    let source: Option<Arc<dyn DraftSource>> = if config.has_telegram_source() {
        Some(Arc::new(TelegramDraftSource::new(
            config.bot_token.as_deref().unwrap(),
            config.source_chat_id.unwrap(),
        )))
    } else {
        tracing::warn!("No Telegram source configured — running monitor-only");
        None
    };

    let service = Service {
        pool,
        config,
        oracle,
        sink,
        source,
    };

    tokio::spawn(run_supervisor(service));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received. Exiting...");

    Ok(())
}

/// Post the once-a-day "still alive" note to the target channel. The last
/// ping time lives in the store so restarts inside the same day stay quiet.
async fn maybe_announce_startup(pool: &SqlitePool, sink: &TelegramSink) -> anyhow::Result<()> {
    let now = Utc::now();
    let last = state_repo::get_state(pool, STARTUP_PING_KEY)
        .await?
        .and_then(|v| v.parse::<DateTime<Utc>>().ok());

    let due = last.map_or(true, |t| now - t >= Duration::hours(24));
    if due {
        sink.announce("Signal tracker online").await;
        state_repo::set_state(pool, STARTUP_PING_KEY, &now.to_rfc3339()).await?;
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
