use rust_decimal::Decimal;
use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: String,
    pub price_proxy_url: String,

    // Telegram credentials (optional — without them events go to the log
    // and no channel is polled)
    pub bot_token: Option<String>,
    pub source_chat_id: Option<i64>,
    pub target_chat_id: Option<String>,

    // Lifecycle windows and thresholds
    pub activation_window_days: i64,
    pub reporting_window_days: i64,
    pub entry2_disable_profit_pct: Decimal,
    pub leverage_multiplier: Decimal,

    // Cadences
    pub tick_interval_secs: u64,
    pub poll_interval_secs: u64,
    pub mirror_interval_secs: u64,
    pub dashboard_rows: i64,

    // Leadership
    pub lease_ttl_secs: u64,
    pub lease_renew_secs: u64,

    pub metrics_addr: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "signals.db".into()),
            price_proxy_url: env::var("PRICE_PROXY_URL")
                .map_err(|_| anyhow::anyhow!("PRICE_PROXY_URL must be set"))?
                .trim()
                .trim_end_matches('/')
                .to_string(),

            bot_token: env::var("BOT_TOKEN").ok(),
            source_chat_id: env::var("SOURCE_CHAT_ID").ok().and_then(|s| s.trim().parse().ok()),
            target_chat_id: env::var("TARGET_CHAT_ID").ok(),

            activation_window_days: env::var("ACTIVATION_WINDOW_DAYS")
                .unwrap_or_else(|_| "5".into())
                .parse()?,
            reporting_window_days: env::var("REPORTING_WINDOW_DAYS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
            entry2_disable_profit_pct: env::var("ENTRY2_DISABLE_PROFIT_PCT")
                .unwrap_or_else(|_| "15".into())
                .parse()
                .unwrap_or(Decimal::from(15)),
            leverage_multiplier: env::var("LEVERAGE_MULTIPLIER")
                .unwrap_or_else(|_| "10".into())
                .parse()
                .unwrap_or(Decimal::from(10)),

            tick_interval_secs: env::var("TICK_INTERVAL_SECS")
                .unwrap_or_else(|_| "15".into())
                .parse()?,
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "3".into())
                .parse()?,
            mirror_interval_secs: env::var("MIRROR_INTERVAL_SECS")
                .unwrap_or_else(|_| "120".into())
                .parse()?,
            dashboard_rows: env::var("DASHBOARD_ROWS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,

            lease_ttl_secs: env::var("LEASE_TTL_SECS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
            lease_renew_secs: env::var("LEASE_RENEW_SECS")
                .unwrap_or_else(|_| "10".into())
                .parse()?,

            metrics_addr: env::var("METRICS_ADDR").ok(),
        })
    }

    /// True when events can be delivered to Telegram instead of the log.
    pub fn has_telegram_sink(&self) -> bool {
        self.bot_token.is_some() && self.target_chat_id.is_some()
    }

    /// True when a source channel can be polled for drafts.
    pub fn has_telegram_source(&self) -> bool {
        self.bot_token.is_some() && self.source_chat_id.is_some()
    }
}
