pub mod config;
pub mod connectors;
pub mod core;
pub mod exchanges;
pub mod indicators;
pub mod market_data;
pub mod monitoring;
pub mod oms;
pub mod realtime;
pub mod risk;
pub mod strategies;
pub mod traits;
pub mod types;

pub use config::{ClassProfile, ConfigError, Settings, TradingMode};
pub use connectors::{GatewayNavSource, MockVenue, PaperVenue, SharedNavSource};
pub use crate::core::{
    Candle, Clock, ExecutionResult, MarketSnapshot, NavSnapshot, OrderRequest, ScoredCandidate,
    StrategyClass, SystemClock, TradingEvent,
};
pub use exchanges::{BinanceVenue, Market, VenueError};
pub use market_data::{MarketDataCollector, SnapshotCache, Universe};
pub use oms::{Gateway, GatewayError, RetryPolicy};
pub use realtime::{CycleReport, SchedulerConfig, TradeExecutor, TradingScheduler};
pub use risk::{RiskConfig, RiskEngine, RiskStatus};
pub use strategies::{PolicyRegistry, Screener};
pub use types::{Price, Size, Symbol};

use log::LevelFilter;
use std::str::FromStr;

/// Console logging, plus a file when `log_file` is set. Journal lines
/// (target `journal`) are always kept at info.
pub fn init_logging(level: &str, log_file: Option<&str>) -> Result<(), fern::InitError> {
    let level = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for(monitoring::JOURNAL_TARGET, LevelFilter::Info)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(std::io::stdout());

    if let Some(path) = log_file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}
