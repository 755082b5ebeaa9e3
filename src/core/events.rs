use crate::core::model::{OrderResponse, StrategyClass};
use crate::types::{Price, Size, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Side selected by the sign of a decision confidence. Zero buys.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    TakeProfitMarket,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::StopMarket => "STOP_MARKET",
            OrderType::TakeProfitMarket => "TAKE_PROFIT_MARKET",
        }
    }
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    GoodTillCancelled,
    ImmediateOrCancel,
    FillOrKill,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::GoodTillCancelled => "GTC",
            TimeInForce::ImmediateOrCancel => "IOC",
            TimeInForce::FillOrKill => "FOK",
        }
    }
}

/// Hedge-mode position side on derivatives venues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Both,
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Both => "BOTH",
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        }
    }
}

/// Order as submitted to a venue. Optional fields are only sent when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Size,
    pub price: Option<Price>,
    pub stop_price: Option<Price>,
    pub reduce_only: Option<bool>,
    pub position_side: Option<PositionSide>,
    pub time_in_force: Option<TimeInForce>,
    pub client_order_id: Option<String>,
}

impl NewOrder {
    /// Create a market order
    pub fn market(symbol: impl Into<Symbol>, side: OrderSide, quantity: Size) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            stop_price: None,
            reduce_only: None,
            position_side: None,
            time_in_force: None,
            client_order_id: None,
        }
    }

    /// Create a limit order, good till cancelled
    pub fn limit(symbol: impl Into<Symbol>, side: OrderSide, quantity: Size, price: Price) -> Self {
        Self {
            order_type: OrderType::Limit,
            price: Some(price),
            time_in_force: Some(TimeInForce::GoodTillCancelled),
            ..Self::market(symbol, side, quantity)
        }
    }

    pub fn with_client_order_id(mut self, client_order_id: impl Into<String>) -> Self {
        self.client_order_id = Some(client_order_id.into());
        self
    }

    pub fn with_stop_price(mut self, stop_price: Price) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    pub fn with_reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = Some(reduce_only);
        self
    }

    pub fn with_position_side(mut self, position_side: PositionSide) -> Self {
        self.position_side = Some(position_side);
        self
    }

    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = Some(time_in_force);
        self
    }
}

/// Identifies an order to cancel, either by venue id or by our client id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderRef {
    Exchange(i64),
    Client(String),
}

impl std::fmt::Display for OrderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderRef::Exchange(id) => write!(f, "{}", id),
            OrderRef::Client(id) => write!(f, "{}", id),
        }
    }
}

/// Structured events published to the event sink. Delivery is best effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum TradingEvent {
    Heartbeat {
        at: DateTime<Utc>,
    },
    SchedulerTick {
        cycle: u64,
    },
    SignalsScored {
        class: StrategyClass,
        symbols: Vec<Symbol>,
    },
    /// `response` is the venue response plus the computed sl, tp and size
    OrderExecuted {
        class: StrategyClass,
        symbol: Symbol,
        side: OrderSide,
        response: OrderResponse,
    },
    OrderRejected {
        class: StrategyClass,
        symbol: Symbol,
        reason: String,
    },
    CampaignPaused {
        class: StrategyClass,
        until: Option<DateTime<Utc>>,
        reason: Option<String>,
    },
}

impl TradingEvent {
    /// Wire name of the event, as used in the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            TradingEvent::Heartbeat { .. } => "heartbeat",
            TradingEvent::SchedulerTick { .. } => "scheduler_tick",
            TradingEvent::SignalsScored { .. } => "signals_scored",
            TradingEvent::OrderExecuted { .. } => "order_executed",
            TradingEvent::OrderRejected { .. } => "order_rejected",
            TradingEvent::CampaignPaused { .. } => "campaign_paused",
        }
    }
}
