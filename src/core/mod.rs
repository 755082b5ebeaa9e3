pub mod clock;
pub mod events;
pub mod model;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{
    NewOrder, OrderRef, OrderSide, OrderType, PositionSide, TimeInForce, TradingEvent,
};
pub use model::{
    Action, Candle, ExecutionResult, FeatureVector, MarketSnapshot, NavSnapshot, OrderRequest,
    OrderResponse, ScoredCandidate, StrategyClass,
};
