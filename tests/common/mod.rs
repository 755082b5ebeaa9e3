#![allow(dead_code)]

use chrono::{DateTime, Utc};
use crypto_autotrader::config::ClassProfile;
use crypto_autotrader::connectors::MockVenue;
use crypto_autotrader::core::{Candle, ManualClock, StrategyClass};
use crypto_autotrader::oms::{Gateway, RetryPolicy};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub fn start_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(start_time()))
}

/// Zig-zag close path starting at `start` with `drift` per bar
pub fn path(start: f64, drift: f64, len: usize) -> Vec<f64> {
    let mut price = start;
    (0..len)
        .map(|i| {
            let wiggle = if i % 2 == 0 { 0.004 } else { -0.002 };
            price *= 1.0 + drift + wiggle;
            price
        })
        .collect()
}

/// Hourly candles along `closes` with a 1% band and flat quote volume
pub fn candles(closes: &[f64], quote_volume: f64) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            open_time: i as i64 * 3_600_000,
            open: close,
            high: close * 1.005,
            low: close * 0.995,
            close,
            volume: quote_volume / close,
            close_time: i as i64 * 3_600_000 + 3_599_999,
            quote_volume,
            trade_count: 250,
        })
        .collect()
}

/// Liquid uptrending series that scores positive
pub fn uptrend(start: f64) -> Vec<Candle> {
    candles(&path(start, 0.005, 120), 5e7)
}

pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(10), Duration::from_millis(40))
}

pub fn gateway(name: &str, venue: Arc<MockVenue>, min_interval: Duration) -> Arc<Gateway> {
    Arc::new(Gateway::new(name, venue, min_interval, fast_policy(3)))
}

pub fn profile(class: StrategyClass) -> ClassProfile {
    ClassProfile {
        class,
        fee_rate: match class {
            StrategyClass::Spot => 0.001,
            StrategyClass::Futures => 0.0004,
        },
        leverage: match class {
            StrategyClass::Spot => Decimal::ONE,
            StrategyClass::Futures => Decimal::TWO,
        },
        daily_stop_pct: -3.0,
        qty_step: dec!(0.0001),
        min_interval: Duration::ZERO,
        policy_path: PathBuf::from("unused.json"),
        default_nav: dec!(10000),
    }
}
