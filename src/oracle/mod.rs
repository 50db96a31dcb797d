pub mod proxy;

pub use proxy::ProxyPriceOracle;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::PriceUnavailable;

/// Current-price lookup. Implementations must fold every transport,
/// timeout, or payload failure into `PriceUnavailable` — the engine treats
/// that as "skip this signal this tick", never as fatal.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn price(&self, symbol: &str) -> Result<Decimal, PriceUnavailable>;
}
