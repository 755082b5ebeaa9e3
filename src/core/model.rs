//! Domain model shared by the collector, screener, risk engine and executor.

use crate::core::events::OrderSide;
use crate::types::{Price, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw venue response, kept as a JSON object so venue-specific fields survive
pub type OrderResponse = serde_json::Map<String, serde_json::Value>;

/// Isolated risk and capital bucket. Each class trades on its own venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrategyClass {
    #[serde(rename = "SPOT")]
    Spot,
    #[serde(rename = "FUT")]
    Futures,
}

impl StrategyClass {
    /// Processing order within a cycle
    pub const ALL: [StrategyClass; 2] = [StrategyClass::Spot, StrategyClass::Futures];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyClass::Spot => "SPOT",
            StrategyClass::Futures => "FUT",
        }
    }

    /// Derivatives classes carry a funding rate
    pub fn is_derivatives(&self) -> bool {
        matches!(self, StrategyClass::Futures)
    }
}

impl fmt::Display for StrategyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SPOT" => Ok(StrategyClass::Spot),
            "FUT" | "FUTURES" => Ok(StrategyClass::Futures),
            other => Err(format!("unknown strategy class: {}", other)),
        }
    }
}

/// One kline row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
    pub quote_volume: f64,
    pub trade_count: u64,
}

/// Latest market data for one symbol. Superseded every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: Symbol,
    pub class: StrategyClass,
    pub interval: String,
    pub candles: Vec<Candle>,
    pub funding_rate: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

/// Screener output for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub symbol: Symbol,
    pub score: f64,
    pub expected_return: f64,
    pub atr_value: f64,
    pub atr_pct: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub risk_reward_ratio: f64,
    pub last_price: f64,
    pub action: Action,
}

impl ScoredCandidate {
    /// Decision function input: `[expected_return, atr_pct/100, sharpe, sortino, rr]`
    pub fn features(&self) -> FeatureVector {
        [
            self.expected_return,
            self.atr_pct / 100.0,
            self.sharpe,
            self.sortino,
            self.risk_reward_ratio,
        ]
    }
}

pub type FeatureVector = [f64; 5];

/// Sized-order input to the executor. Consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub class: StrategyClass,
    pub price: Price,
    pub atr_value: Price,
    pub atr_pct: f64,
    pub confidence: f64,
    pub expected_return: f64,
    pub fee_rate: f64,
    pub leverage: Decimal,
}

/// Terminal outcome of one `execute` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub accepted: bool,
    pub reason: Option<String>,
    pub order_response: Option<OrderResponse>,
}

impl ExecutionResult {
    pub fn accepted(order_response: OrderResponse) -> Self {
        Self {
            accepted: true,
            reason: None,
            order_response: Some(order_response),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
            order_response: None,
        }
    }
}

/// Account equity snapshot. `nav_a` funds SPOT, `nav_b` funds FUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavSnapshot {
    pub nav_total: Decimal,
    pub nav_a: Decimal,
    pub nav_b: Decimal,
}

impl NavSnapshot {
    pub fn new(nav_a: Decimal, nav_b: Decimal) -> Self {
        Self {
            nav_total: nav_a + nav_b,
            nav_a,
            nav_b,
        }
    }

    /// Capital allotted to one class
    pub fn for_class(&self, class: StrategyClass) -> Decimal {
        match class {
            StrategyClass::Spot => self.nav_a,
            StrategyClass::Futures => self.nav_b,
        }
    }
}
