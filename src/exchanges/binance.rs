use crate::core::events::{NewOrder, OrderRef};
use crate::core::model::{Candle, OrderResponse};
use crate::exchanges::error::VenueError;
use crate::traits::VenueClient;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use log::debug;
use reqwest::{Client, Method, Response, StatusCode};
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::Sha256;
use std::str::FromStr;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const RECV_WINDOW_MS: u64 = 5000;
/// Fallback wait when a 429/418 carries no Retry-After header
const DEFAULT_RETRY_AFTER_MS: u64 = 1000;
const QUOTE_ASSET: &str = "USDT";

/// Which Binance REST API a venue talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Market {
    Spot,
    UsdFutures,
}

impl Market {
    fn default_base_url(&self) -> &'static str {
        match self {
            Market::Spot => "https://api.binance.com",
            Market::UsdFutures => "https://fapi.binance.com",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            Market::Spot => "/api/v3",
            Market::UsdFutures => "/fapi/v1",
        }
    }

    fn account_path(&self) -> &'static str {
        match self {
            Market::Spot => "/api/v3/account",
            Market::UsdFutures => "/fapi/v2/account",
        }
    }
}

/// Binance spot / USD-M futures REST venue
pub struct BinanceVenue {
    market: Market,
    api_key: String,
    api_secret: String,
    base_url: String,
    http_client: Client,
}

impl BinanceVenue {
    pub fn new(
        market: Market,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Result<Self, VenueError> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VenueError::Transport(e.to_string()))?;

        Ok(Self {
            market,
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            base_url: market.default_base_url().to_string(),
            http_client,
        })
    }

    /// Point the venue at another host (testnet, local mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn market(&self) -> Market {
        self.market
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}/{}", self.base_url, self.market.prefix(), endpoint)
    }

    /// HMAC-SHA256 of `payload`, lowercase hex
    fn sign(&self, payload: &str) -> Result<String, VenueError> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| VenueError::Malformed(format!("invalid signing key: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn public_get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Value, VenueError> {
        let url = self.url(endpoint);
        debug!("GET {} {:?}", url, query);
        let response = self.http_client.get(&url).query(query).send().await?;
        Self::read_body(response).await
    }

    async fn signed(
        &self,
        method: Method,
        endpoint: &str,
        params: Vec<(&str, String)>,
    ) -> Result<Value, VenueError> {
        self.signed_at(method, &self.url(endpoint), params).await
    }

    /// Signed request. GET params go in the query string, others in a form body.
    async fn signed_at(
        &self,
        method: Method,
        url: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<Value, VenueError> {
        params.push(("recvWindow", RECV_WINDOW_MS.to_string()));
        params.push(("timestamp", chrono::Utc::now().timestamp_millis().to_string()));

        let payload = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        let signed = format!("{}&signature={}", payload, self.sign(&payload)?);

        debug!("{} {}", method, url);
        let request = if method == Method::GET {
            self.http_client.get(format!("{}?{}", url, signed))
        } else {
            self.http_client
                .request(method, url)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(signed)
        };
        let response = request.header("X-MBX-APIKEY", &self.api_key).send().await?;
        Self::read_body(response).await
    }

    async fn read_body(response: Response) -> Result<Value, VenueError> {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(DEFAULT_RETRY_AFTER_MS);
            return Err(VenueError::RateLimited { retry_after_ms });
        }

        let body = response.text().await?;
        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }
        if let Some(err) = VenueError::from_api_body(&body) {
            return Err(err);
        }
        if status.is_server_error() {
            Err(VenueError::Transport(format!("HTTP {}: {}", status, body)))
        } else {
            Err(VenueError::business(status.as_u16() as i64, body))
        }
    }
}

impl std::fmt::Debug for BinanceVenue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceVenue")
            .field("market", &self.market)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Numbers arrive either as JSON numbers or as decimal strings
fn number(value: &Value, field: &str) -> Result<f64, VenueError> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| VenueError::Malformed(format!("{} is not numeric: {}", field, value)))
}

fn decimal(value: &Value, field: &str) -> Result<Decimal, VenueError> {
    match value {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
    .ok_or_else(|| VenueError::Malformed(format!("{} is not a decimal: {}", field, value)))
}

/// Free plus locked quote asset from a spot `account` body
pub fn spot_equity(account: &Value) -> Result<Decimal, VenueError> {
    let balances = account
        .get("balances")
        .and_then(Value::as_array)
        .ok_or_else(|| VenueError::Malformed("account has no balances".into()))?;

    let Some(quote) = balances
        .iter()
        .find(|b| b.get("asset").and_then(Value::as_str) == Some(QUOTE_ASSET))
    else {
        return Ok(Decimal::ZERO);
    };
    let free = decimal(quote.get("free").unwrap_or(&Value::Null), "free")?;
    let locked = decimal(quote.get("locked").unwrap_or(&Value::Null), "locked")?;
    Ok(free + locked)
}

/// Margin balance (wallet plus unrealized PnL) from a futures `account` body
pub fn futures_equity(account: &Value) -> Result<Decimal, VenueError> {
    decimal(
        account.get("totalMarginBalance").unwrap_or(&Value::Null),
        "totalMarginBalance",
    )
}

fn integer(value: &Value, field: &str) -> Result<i64, VenueError> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| VenueError::Malformed(format!("{} is not an integer: {}", field, value)))
}

/// Parses one kline row:
/// `[open_time, open, high, low, close, volume, close_time, quote_volume, trades, ...]`
pub fn parse_kline(row: &Value) -> Result<Candle, VenueError> {
    let fields = row
        .as_array()
        .filter(|a| a.len() >= 9)
        .ok_or_else(|| VenueError::Malformed(format!("unexpected kline row: {}", row)))?;

    Ok(Candle {
        open_time: integer(&fields[0], "open_time")?,
        open: number(&fields[1], "open")?,
        high: number(&fields[2], "high")?,
        low: number(&fields[3], "low")?,
        close: number(&fields[4], "close")?,
        volume: number(&fields[5], "volume")?,
        close_time: integer(&fields[6], "close_time")?,
        quote_volume: number(&fields[7], "quote_volume")?,
        trade_count: integer(&fields[8], "trade_count")?.max(0) as u64,
    })
}

fn into_object(value: Value) -> Result<OrderResponse, VenueError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(VenueError::Malformed(format!("expected object, got {}", other))),
    }
}

#[async_trait]
impl VenueClient for BinanceVenue {
    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, VenueError> {
        let body = self
            .public_get(
                "klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        body.as_array()
            .ok_or_else(|| VenueError::Malformed("klines response is not a list".into()))?
            .iter()
            .map(parse_kline)
            .collect()
    }

    async fn funding_rate(&self, symbol: &str) -> Result<Option<f64>, VenueError> {
        if self.market == Market::Spot {
            return Ok(None);
        }

        let body = self
            .public_get(
                "fundingRate",
                &[("symbol", symbol.to_string()), ("limit", "1".to_string())],
            )
            .await?;

        match body.as_array().and_then(|rows| rows.first()) {
            Some(row) => row
                .get("fundingRate")
                .map(|v| number(v, "fundingRate"))
                .transpose(),
            None => Ok(None),
        }
    }

    async fn place_order(&self, order: &NewOrder) -> Result<OrderResponse, VenueError> {
        let mut params = vec![
            ("symbol", order.symbol.as_str().to_string()),
            ("side", order.side.as_str().to_string()),
            ("type", order.order_type.as_str().to_string()),
            ("quantity", order.quantity.value().normalize().to_string()),
        ];
        if let Some(price) = order.price {
            params.push(("price", price.value().normalize().to_string()));
        }
        if let Some(stop_price) = order.stop_price {
            params.push(("stopPrice", stop_price.value().normalize().to_string()));
        }
        // reduceOnly and positionSide only exist on the derivatives API
        if self.market == Market::UsdFutures {
            if let Some(reduce_only) = order.reduce_only {
                params.push(("reduceOnly", reduce_only.to_string()));
            }
            if let Some(position_side) = order.position_side {
                params.push(("positionSide", position_side.as_str().to_string()));
            }
        }
        if let Some(tif) = order.time_in_force {
            params.push(("timeInForce", tif.as_str().to_string()));
        }
        if let Some(client_order_id) = &order.client_order_id {
            params.push(("newClientOrderId", client_order_id.clone()));
        }

        into_object(self.signed(Method::POST, "order", params).await?)
    }

    async fn cancel_order(
        &self,
        symbol: &str,
        order: &OrderRef,
    ) -> Result<OrderResponse, VenueError> {
        let mut params = vec![("symbol", symbol.to_string())];
        match order {
            OrderRef::Exchange(id) => params.push(("orderId", id.to_string())),
            OrderRef::Client(id) => params.push(("origClientOrderId", id.clone())),
        }

        into_object(self.signed(Method::DELETE, "order", params).await?)
    }

    async fn account_equity(&self) -> Result<Decimal, VenueError> {
        let url = format!("{}{}", self.base_url, self.market.account_path());
        let account = self.signed_at(Method::GET, &url, Vec::new()).await?;
        match self.market {
            Market::Spot => spot_equity(&account),
            Market::UsdFutures => futures_equity(&account),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_kline_row() {
        let row = json!([
            1499040000000i64,
            "0.01634790",
            "0.80000000",
            "0.01575800",
            "0.01577100",
            "148976.11427815",
            1499644799999i64,
            "2434.19055334",
            308,
            "1756.87402397",
            "28.46694368",
            "0"
        ]);

        let candle = parse_kline(&row).unwrap();
        assert_eq!(candle.open_time, 1499040000000);
        assert_eq!(candle.close, 0.015771);
        assert_eq!(candle.quote_volume, 2434.19055334);
        assert_eq!(candle.trade_count, 308);
    }

    #[test]
    fn test_parse_kline_rejects_short_row() {
        let err = parse_kline(&json!([1, "2", "3"])).unwrap_err();
        assert!(matches!(err, VenueError::Malformed(_)));
    }

    #[test]
    fn test_signature_is_hex_sha256() {
        // Reference vector from the Binance API documentation
        let venue = BinanceVenue::new(
            Market::Spot,
            "key",
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j",
        )
        .unwrap();
        let payload = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";

        assert_eq!(
            venue.sign(payload).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_spot_equity_sums_free_and_locked_usdt() {
        let account = json!({
            "balances": [
                {"asset": "BTC", "free": "0.5", "locked": "0"},
                {"asset": "USDT", "free": "1200.50", "locked": "99.50"}
            ]
        });
        assert_eq!(spot_equity(&account).unwrap(), Decimal::new(1300, 0));
        assert_eq!(spot_equity(&json!({"balances": []})).unwrap(), Decimal::ZERO);
        assert!(spot_equity(&json!({})).is_err());
    }

    #[test]
    fn test_futures_equity_reads_margin_balance() {
        let account = json!({"totalWalletBalance": "500", "totalMarginBalance": "512.25"});
        assert_eq!(futures_equity(&account).unwrap(), Decimal::new(51225, 2));
        assert!(matches!(futures_equity(&json!({})), Err(VenueError::Malformed(_))));
    }

    #[test]
    fn test_urls() {
        let spot = BinanceVenue::new(Market::Spot, "k", "s").unwrap();
        assert_eq!(spot.url("klines"), "https://api.binance.com/api/v3/klines");

        let fut = BinanceVenue::new(Market::UsdFutures, "k", "s")
            .unwrap()
            .with_base_url("http://127.0.0.1:9000/");
        assert_eq!(fut.url("order"), "http://127.0.0.1:9000/fapi/v1/order");
    }
}
