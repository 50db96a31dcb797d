use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;

use crate::models::{EventKind, SignalEvent, SnapshotRow};
use crate::sink::EventSink;

/// Telegram delivery of lifecycle events. Failures are logged but never
/// block the engine.
///
/// Routing follows the channel convention: "new signal saved" goes back to
/// the source channel, everything else to the target chat.
#[derive(Debug, Clone)]
pub struct TelegramSink {
    http: reqwest::Client,
    bot_token: String,
    target_chat: String,
    source_chat: Option<String>,
}

impl TelegramSink {
    pub fn new(bot_token: String, target_chat: String, source_chat: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            target_chat,
            source_chat,
        }
    }

    /// Post a plain status message to the target chat (startup ping).
    pub async fn announce(&self, message: &str) {
        self.send_to(&self.target_chat, message).await;
    }

    async fn send_to(&self, chat_id: &str, message: &str) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        let body = json!({
            "chat_id": chat_id,
            "text": message,
            "disable_web_page_preview": true,
        });

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    tracing::warn!(
                        status = %resp.status(),
                        "Telegram sendMessage returned non-2xx"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send Telegram notification");
            }
        }
    }
}

#[async_trait]
impl EventSink for TelegramSink {
    async fn publish(&self, event: &SignalEvent) {
        let message = format_event(event);
        let chat = match event.kind {
            EventKind::Created => self.source_chat.as_deref().unwrap_or(&self.target_chat),
            _ => &self.target_chat,
        };
        self.send_to(chat, &message).await;
    }

    async fn mirror(&self, rows: &[SnapshotRow]) {
        // Dashboard mirroring is the external writer's job; the snapshot
        // handoff is just observable here.
        tracing::debug!(rows = rows.len(), "snapshot ready for dashboard writer");
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

fn fmt_price(p: Option<Decimal>) -> String {
    p.map(|x| x.normalize().to_string())
        .unwrap_or_else(|| "-".into())
}

fn fmt_pct(p: Option<Decimal>) -> String {
    p.map(|x| format!("{}%", x.round_dp(2).normalize()))
        .unwrap_or_else(|| "-".into())
}

/// Render one lifecycle event as a chat message.
pub fn format_event(event: &SignalEvent) -> String {
    match event.kind {
        EventKind::Created => format!(
            "New signal saved\n{} ({})",
            event.symbol, event.side
        ),
        EventKind::Activated => format!(
            "Signal activated\n{} ({})\nCurrent price: {}",
            event.symbol,
            event.side,
            fmt_price(event.price)
        ),
        EventKind::Entry2Activated => format!(
            "Entry 2 activated\n{} ({})\nCurrent price: {}",
            event.symbol,
            event.side,
            fmt_price(event.price)
        ),
        EventKind::TargetHit => {
            let index = event.index.unwrap_or(0);
            let mut msg = format!(
                "{} TP{} HIT\nTP price: {}\nProfit: {} (lev {})",
                event.symbol,
                index,
                fmt_price(event.price),
                fmt_pct(event.profit_pct),
                fmt_pct(event.leveraged_profit_pct)
            );
            if event.entry2_profit_pct.is_some() {
                msg.push_str(&format!(
                    "\nFrom entry 2: {} (lev {})",
                    fmt_pct(event.entry2_profit_pct),
                    fmt_pct(event.entry2_leveraged_profit_pct)
                ));
            }
            msg
        }
        EventKind::Tp1Refire => format!(
            "{} TP1 re-hit after entry 2\nTP price: {}\nFrom entry 2: {} (lev {})",
            event.symbol,
            fmt_price(event.price),
            fmt_pct(event.entry2_profit_pct),
            fmt_pct(event.entry2_leveraged_profit_pct)
        ),
        EventKind::AvgReclaimed => format!(
            "{} returned to average entry\nAverage price: {}",
            event.symbol,
            fmt_price(event.price)
        ),
        EventKind::Expired => format!(
            "Signal expired\n{} ({})",
            event.symbol, event.side
        ),
    }
}
