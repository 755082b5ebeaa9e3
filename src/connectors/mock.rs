use crate::connectors::dry_run::order_ack;
use crate::core::events::{NewOrder, OrderRef};
use crate::core::model::{Candle, OrderResponse};
use crate::exchanges::error::VenueError;
use crate::traits::VenueClient;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

/// One physical call observed by a [`MockVenue`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: &'static str,
    pub target: String,
    pub at: Instant,
}

/// Scripted in-memory venue for tests and offline runs.
///
/// Failures are scripted per `(operation, target)`, where the target is the
/// symbol for `klines`, `funding_rate` and `place_order`, and the order
/// reference for `cancel_order`. Queued failures are consumed one per call;
/// a permanent failure applies to every call.
#[derive(Debug)]
pub struct MockVenue {
    candles: RwLock<HashMap<String, Vec<Candle>>>,
    funding: RwLock<HashMap<String, f64>>,
    equity: RwLock<Option<Decimal>>,
    queued_failures: Mutex<HashMap<(String, String), VecDeque<VenueError>>>,
    permanent_failures: RwLock<HashMap<(String, String), VenueError>>,
    placed: Mutex<Vec<NewOrder>>,
    cancelled: Mutex<Vec<(String, OrderRef)>>,
    calls: Mutex<Vec<RecordedCall>>,
    next_order_id: AtomicI64,
}

impl Default for MockVenue {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVenue {
    pub fn new() -> Self {
        Self {
            candles: RwLock::new(HashMap::new()),
            funding: RwLock::new(HashMap::new()),
            equity: RwLock::new(None),
            queued_failures: Mutex::new(HashMap::new()),
            permanent_failures: RwLock::new(HashMap::new()),
            placed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            next_order_id: AtomicI64::new(1000),
        }
    }

    pub fn with_candles(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        self.candles.get_mut().insert(symbol.to_uppercase(), candles);
        self
    }

    pub fn with_funding_rate(mut self, symbol: &str, rate: f64) -> Self {
        self.funding.get_mut().insert(symbol.to_uppercase(), rate);
        self
    }

    pub fn with_equity(mut self, equity: Decimal) -> Self {
        *self.equity.get_mut() = Some(equity);
        self
    }

    pub async fn set_equity(&self, equity: Decimal) {
        *self.equity.write().await = Some(equity);
    }

    /// Fail the next `errors.len()` calls of `operation` on `target`, in order
    pub fn with_failures(mut self, operation: &str, target: &str, errors: Vec<VenueError>) -> Self {
        self.queued_failures
            .get_mut()
            .entry((operation.to_string(), target.to_string()))
            .or_default()
            .extend(errors);
        self
    }

    /// Fail every call of `operation` on `target`
    pub fn with_permanent_failure(mut self, operation: &str, target: &str, error: VenueError) -> Self {
        self.permanent_failures
            .get_mut()
            .insert((operation.to_string(), target.to_string()), error);
        self
    }

    pub async fn set_candles(&self, symbol: &str, candles: Vec<Candle>) {
        self.candles.write().await.insert(symbol.to_uppercase(), candles);
    }

    pub async fn placed_orders(&self) -> Vec<NewOrder> {
        self.placed.lock().await.clone()
    }

    pub async fn cancelled_orders(&self) -> Vec<(String, OrderRef)> {
        self.cancelled.lock().await.clone()
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    async fn record(&self, operation: &'static str, target: &str) -> Result<(), VenueError> {
        self.calls.lock().await.push(RecordedCall {
            operation,
            target: target.to_string(),
            at: Instant::now(),
        });

        let key = (operation.to_string(), target.to_string());
        if let Some(err) = self.permanent_failures.read().await.get(&key) {
            return Err(err.clone());
        }
        if let Some(queue) = self.queued_failures.lock().await.get_mut(&key) {
            if let Some(err) = queue.pop_front() {
                return Err(err);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VenueClient for MockVenue {
    async fn klines(
        &self,
        symbol: &str,
        _interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, VenueError> {
        self.record("klines", symbol).await?;
        let candles = self.candles.read().await;
        let series = candles
            .get(symbol)
            .ok_or_else(|| VenueError::business(-1121, "Invalid symbol."))?;
        let skip = series.len().saturating_sub(limit as usize);
        Ok(series[skip..].to_vec())
    }

    async fn funding_rate(&self, symbol: &str) -> Result<Option<f64>, VenueError> {
        self.record("funding_rate", symbol).await?;
        Ok(self.funding.read().await.get(symbol).copied())
    }

    async fn place_order(&self, order: &NewOrder) -> Result<OrderResponse, VenueError> {
        self.record("place_order", order.symbol.as_str()).await?;
        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        let client_order_id = order
            .client_order_id
            .clone()
            .unwrap_or_else(|| format!("mock-{}", order_id));
        self.placed.lock().await.push(order.clone());
        Ok(order_ack(order, order_id, &client_order_id, "FILLED"))
    }

    async fn cancel_order(
        &self,
        symbol: &str,
        order: &OrderRef,
    ) -> Result<OrderResponse, VenueError> {
        self.record("cancel_order", &order.to_string()).await?;
        self.cancelled
            .lock()
            .await
            .push((symbol.to_string(), order.clone()));

        let mut response = OrderResponse::new();
        response.insert("symbol".into(), json!(symbol));
        response.insert("status".into(), json!("CANCELED"));
        match order {
            OrderRef::Exchange(id) => response.insert("orderId".into(), json!(id)),
            OrderRef::Client(id) => response.insert("origClientOrderId".into(), json!(id)),
        };
        Ok(response)
    }

    /// Scripted failures use the target `"account"`
    async fn account_equity(&self) -> Result<Decimal, VenueError> {
        self.record("account_equity", "account").await?;
        (*self.equity.read().await)
            .ok_or_else(|| VenueError::business(-2015, "Invalid API-key, IP, or permissions for action."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(close: f64) -> Candle {
        Candle {
            open_time: 0,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            close_time: 0,
            quote_volume: close,
            trade_count: 1,
        }
    }

    #[tokio::test]
    async fn test_klines_respects_limit() {
        let venue = MockVenue::new().with_candles("BTCUSDT", (1..=10).map(|i| candle(i as f64)).collect());
        let rows = venue.klines("BTCUSDT", "1h", 3).await.unwrap();
        assert_eq!(rows.iter().map(|c| c.close).collect::<Vec<_>>(), vec![8.0, 9.0, 10.0]);
    }

    #[tokio::test]
    async fn test_queued_failures_then_success() {
        let venue = MockVenue::new()
            .with_candles("BTCUSDT", vec![candle(1.0)])
            .with_failures("klines", "BTCUSDT", vec![VenueError::Timeout]);

        assert_eq!(venue.klines("BTCUSDT", "1h", 5).await, Err(VenueError::Timeout));
        assert!(venue.klines("BTCUSDT", "1h", 5).await.is_ok());
        assert_eq!(venue.call_count("klines").await, 2);
    }

    #[tokio::test]
    async fn test_account_equity_is_scripted() {
        let venue = MockVenue::new();
        assert!(venue.account_equity().await.is_err());

        venue.set_equity(Decimal::new(12_345, 1)).await;
        assert_eq!(venue.account_equity().await, Ok(Decimal::new(12_345, 1)));
        assert_eq!(venue.call_count("account_equity").await, 2);
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_business_error() {
        let venue = MockVenue::new();
        let err = venue.klines("NOPE", "1h", 5).await.unwrap_err();
        assert!(matches!(err, VenueError::Business { code: -1121, .. }));
    }
}
