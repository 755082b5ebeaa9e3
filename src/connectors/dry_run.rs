use crate::core::events::{NewOrder, OrderRef, OrderType};
use crate::core::model::{Candle, OrderResponse};
use crate::exchanges::error::VenueError;
use crate::traits::VenueClient;
use async_trait::async_trait;
use log::info;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Venue code for "Unknown order sent."
pub const UNKNOWN_ORDER: i64 = -2011;

#[derive(Debug, Clone)]
struct RestingOrder {
    symbol: String,
    client_order_id: String,
}

/// Paper trading venue.
///
/// Market data and account equity pass through to a real venue; orders never
/// leave the process. Market orders fill at once and are not kept. Other
/// types rest as `NEW` until cancelled.
pub struct PaperVenue {
    data: Arc<dyn VenueClient>,
    /// Only orders still `NEW`
    resting: Mutex<HashMap<i64, RestingOrder>>,
    next_id: AtomicI64,
}

impl PaperVenue {
    pub fn new(data: Arc<dyn VenueClient>) -> Self {
        Self {
            data,
            resting: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub async fn open_orders(&self) -> usize {
        self.resting.lock().await.len()
    }
}

/// Venue-shaped response for an order we accepted locally
pub(crate) fn order_ack(order: &NewOrder, order_id: i64, client_order_id: &str, status: &str) -> OrderResponse {
    let mut response = OrderResponse::new();
    response.insert("orderId".into(), json!(order_id));
    response.insert("clientOrderId".into(), json!(client_order_id));
    response.insert("symbol".into(), json!(order.symbol.as_str()));
    response.insert("side".into(), json!(order.side.as_str()));
    response.insert("type".into(), json!(order.order_type.as_str()));
    response.insert("origQty".into(), json!(order.quantity.to_string()));
    response.insert("status".into(), json!(status));
    if let Some(price) = order.price {
        response.insert("price".into(), json!(price.to_string()));
    }
    response
}

#[async_trait]
impl VenueClient for PaperVenue {
    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, VenueError> {
        self.data.klines(symbol, interval, limit).await
    }

    async fn funding_rate(&self, symbol: &str) -> Result<Option<f64>, VenueError> {
        self.data.funding_rate(symbol).await
    }

    async fn place_order(&self, order: &NewOrder) -> Result<OrderResponse, VenueError> {
        let order_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let client_order_id = order
            .client_order_id
            .clone()
            .unwrap_or_else(|| format!("paper-{}", uuid::Uuid::new_v4().simple()));
        let status = if order.order_type == OrderType::Market {
            "FILLED"
        } else {
            "NEW"
        };

        info!(
            "[paper] {} {} {} qty={} -> {}",
            order.order_type.as_str(),
            order.side.as_str(),
            order.symbol,
            order.quantity,
            status
        );

        if status == "NEW" {
            self.resting.lock().await.insert(
                order_id,
                RestingOrder {
                    symbol: order.symbol.as_str().to_string(),
                    client_order_id: client_order_id.clone(),
                },
            );
        }

        let mut response = order_ack(order, order_id, &client_order_id, status);
        response.insert("paper".into(), Value::Bool(true));
        Ok(response)
    }

    async fn cancel_order(
        &self,
        symbol: &str,
        order: &OrderRef,
    ) -> Result<OrderResponse, VenueError> {
        let mut resting = self.resting.lock().await;
        let found = resting
            .iter()
            .find(|(id, o)| {
                o.symbol == symbol
                    && match order {
                        OrderRef::Exchange(wanted) => *id == wanted,
                        OrderRef::Client(wanted) => &o.client_order_id == wanted,
                    }
            })
            .map(|(id, _)| *id);

        match found.and_then(|id| resting.remove(&id).map(|paper| (id, paper))) {
            Some((id, paper)) => {
                info!("[paper] cancelled {} on {}", id, symbol);

                let mut response = OrderResponse::new();
                response.insert("orderId".into(), json!(id));
                response.insert("clientOrderId".into(), json!(paper.client_order_id));
                response.insert("symbol".into(), json!(symbol));
                response.insert("status".into(), json!("CANCELED"));
                response.insert("paper".into(), Value::Bool(true));
                Ok(response)
            }
            None => Err(VenueError::business(UNKNOWN_ORDER, "Unknown order sent.")),
        }
    }

    async fn account_equity(&self) -> Result<Decimal, VenueError> {
        self.data.account_equity().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::mock::MockVenue;
    use crate::core::events::OrderSide;
    use crate::types::{Price, Size};
    use rust_decimal_macros::dec;

    fn paper() -> PaperVenue {
        PaperVenue::new(Arc::new(MockVenue::new()))
    }

    #[tokio::test]
    async fn test_market_order_fills() {
        let venue = paper();
        let order = NewOrder::market("BTCUSDT", OrderSide::Buy, Size::new(dec!(0.25)));

        let response = venue.place_order(&order).await.unwrap();
        assert_eq!(response["status"], "FILLED");
        assert_eq!(response["origQty"], "0.25");
        assert_eq!(response["side"], "BUY");
        assert_eq!(response["paper"], true);
        assert_eq!(venue.open_orders().await, 0);
    }

    #[tokio::test]
    async fn test_limit_order_can_be_cancelled_once() {
        let venue = paper();
        let order = NewOrder::limit(
            "ETHUSDT",
            OrderSide::Sell,
            Size::new(dec!(1)),
            Price::new(dec!(3000)),
        )
        .with_client_order_id("my-order");

        let response = venue.place_order(&order).await.unwrap();
        assert_eq!(response["status"], "NEW");
        assert_eq!(venue.open_orders().await, 1);

        let cancel = OrderRef::Client("my-order".into());
        let cancelled = venue.cancel_order("ETHUSDT", &cancel).await.unwrap();
        assert_eq!(cancelled["status"], "CANCELED");

        let again = venue.cancel_order("ETHUSDT", &cancel).await.unwrap_err();
        assert_eq!(again, VenueError::business(UNKNOWN_ORDER, "Unknown order sent."));
    }

    #[tokio::test]
    async fn test_filled_orders_are_not_retained() {
        let venue = paper();
        for _ in 0..50 {
            let order = NewOrder::market("BTCUSDT", OrderSide::Buy, Size::new(dec!(0.01)));
            venue.place_order(&order).await.unwrap();
        }
        assert_eq!(venue.resting.lock().await.len(), 0);

        let filled = OrderRef::Exchange(1);
        let err = venue.cancel_order("BTCUSDT", &filled).await.unwrap_err();
        assert_eq!(err, VenueError::business(UNKNOWN_ORDER, "Unknown order sent."));
    }

    #[tokio::test]
    async fn test_cancelled_order_is_dropped() {
        let venue = paper();
        let order = NewOrder::limit(
            "BTCUSDT",
            OrderSide::Buy,
            Size::new(dec!(0.01)),
            Price::new(dec!(20000)),
        );
        let response = venue.place_order(&order).await.unwrap();
        let id = response["orderId"].as_i64().unwrap();

        venue.cancel_order("BTCUSDT", &OrderRef::Exchange(id)).await.unwrap();
        assert!(venue.resting.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_account_equity_passes_through() {
        let data = Arc::new(MockVenue::new().with_equity(dec!(750)));
        let venue = PaperVenue::new(data);
        assert_eq!(venue.account_equity().await, Ok(dec!(750)));
    }

    #[tokio::test]
    async fn test_cancel_unknown_order() {
        let venue = paper();
        let err = venue
            .cancel_order("BTCUSDT", &OrderRef::Exchange(42))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }
}
