use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::PriceUnavailable;
use crate::oracle::PriceOracle;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Price oracle backed by the HTTP price proxy:
/// `GET {base_url}?symbol=BTCUSDT` answering `{"price": ...}` where the
/// price may arrive as a JSON number or a string.
#[derive(Debug, Clone)]
pub struct ProxyPriceOracle {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PriceResponse {
    price: serde_json::Value,
}

impl ProxyPriceOracle {
    pub fn new(base_url: impl Into<String>) -> Self {
        // The proxy sits behind Cloudflare and rejects requests without a
        // browser-looking User-Agent.
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("Mozilla/5.0")
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PriceOracle for ProxyPriceOracle {
    async fn price(&self, symbol: &str) -> Result<Decimal, PriceUnavailable> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[("symbol", symbol)])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| PriceUnavailable::new(symbol, e.to_string()))?;

        if !resp.status().is_success() {
            return Err(PriceUnavailable::new(
                symbol,
                format!("proxy status {}", resp.status()),
            ));
        }

        let body: PriceResponse = resp
            .json()
            .await
            .map_err(|e| PriceUnavailable::new(symbol, e.to_string()))?;

        parse_price(&body.price)
            .ok_or_else(|| PriceUnavailable::new(symbol, format!("bad price field: {}", body.price)))
    }
}

/// The proxy has served the price both as a number and as a string across
/// its revisions; go through the string form so no float rounding sneaks in.
fn parse_price(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}
