use crate::core::events::{NewOrder, OrderRef};
use crate::core::model::{Candle, OrderResponse};
use crate::exchanges::error::VenueError;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Uniform REST contract for one trading venue (one per asset class).
/// Implementations perform a single physical call per method; spacing and
/// retries are the gateway's job.
#[async_trait]
pub trait VenueClient: Send + Sync {
    /// Most recent `limit` candles, oldest first
    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, VenueError>;

    /// Latest funding rate. `None` for venues or symbols without one.
    async fn funding_rate(&self, symbol: &str) -> Result<Option<f64>, VenueError>;

    async fn place_order(&self, order: &NewOrder) -> Result<OrderResponse, VenueError>;

    async fn cancel_order(
        &self,
        symbol: &str,
        order: &OrderRef,
    ) -> Result<OrderResponse, VenueError>;

    /// Account equity in the quote asset (USDT)
    async fn account_equity(&self) -> Result<Decimal, VenueError>;
}
