use crate::core::model::{NavSnapshot, StrategyClass};
use crate::market_data::Universe;
use crate::oms::RetryPolicy;
use crate::risk::RiskConfig;
use crate::strategies::ScreenerConfig;
use crate::types::Symbol;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Startup configuration problems. Fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(String),

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: String, value: String },

    #[error("decision model artifact not found: {0}")]
    MissingArtifact(String),

    #[error("decision model artifact {path} unusable: {reason}")]
    Artifact { path: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    /// Real market data, orders filled locally
    Paper,
    Live,
}

/// Constants that differ between strategy classes
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProfile {
    pub class: StrategyClass,
    pub fee_rate: f64,
    pub leverage: Decimal,
    /// Daily PnL percentage at or below which the class pauses
    pub daily_stop_pct: f64,
    /// Minimum order quantity increment
    pub qty_step: Decimal,
    /// Minimum spacing between venue calls
    pub min_interval: Duration,
    pub policy_path: PathBuf,
    pub default_nav: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub mode: TradingMode,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub spot_symbols: Vec<Symbol>,
    pub fut_symbols: Vec<Symbol>,
    pub interval: String,
    pub kline_limit: u32,
    pub position_pct_max: Decimal,
    pub atr_sl_mult: Decimal,
    pub atr_tp_mult: Decimal,
    pub screener_min_qvol: f64,
    pub screener_top_n: usize,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub cycle_interval: Duration,
    pub heartbeat_interval: Duration,
    pub reset_sweep_interval: Duration,
    pub monitor_interval: Duration,
    pub log_level: String,
    pub log_file: Option<String>,
    pub spot: ClassProfile,
    pub futures: ClassProfile,
}

/// Typed reads over a `name -> value` lookup
struct Reader<F> {
    lookup: F,
}

impl<F> Reader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, var: &str, default: &str) -> String {
        self.raw(var).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, var: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.raw(var) {
            None => Ok(default),
            Some(value) => value
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid {
                    var: var.to_string(),
                    value,
                }),
        }
    }

    fn positive<T>(&self, var: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default + Display + Copy,
        T::Err: Display,
    {
        let value = self.parse(var, default)?;
        if value > T::default() {
            Ok(value)
        } else {
            Err(invalid(var, value))
        }
    }

    fn millis(&self, var: &str, default: u64) -> Result<Duration, ConfigError> {
        self.positive(var, default).map(Duration::from_millis)
    }

    fn secs(&self, var: &str, default: u64) -> Result<Duration, ConfigError> {
        self.positive(var, default).map(Duration::from_secs)
    }

    fn symbols(&self, var: &str, default: &str) -> Result<Vec<Symbol>, ConfigError> {
        let raw = self.string(var, default);
        let symbols: Vec<Symbol> = raw
            .split(',')
            .map(Symbol::new)
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(bad) = symbols.iter().find(|s| !s.is_valid()) {
            return Err(invalid(var, bad));
        }
        Ok(symbols)
    }
}

fn invalid(var: &str, value: impl Display) -> ConfigError {
    ConfigError::Invalid {
        var: var.to_string(),
        value: value.to_string(),
    }
}

impl Settings {
    /// Process environment, after loading an optional `.env` file
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Reader { lookup };

        let mode = match env.string("TRADING_MODE", "PAPER").to_uppercase().as_str() {
            "PAPER" => TradingMode::Paper,
            "LIVE" => TradingMode::Live,
            other => return Err(invalid("TRADING_MODE", other)),
        };
        let api_key = env.raw("BINANCE_API_KEY");
        let api_secret = env.raw("BINANCE_API_SECRET");
        if mode == TradingMode::Live {
            if api_key.is_none() {
                return Err(ConfigError::Missing("BINANCE_API_KEY".into()));
            }
            if api_secret.is_none() {
                return Err(ConfigError::Missing("BINANCE_API_SECRET".into()));
            }
        }

        let spot_symbols = env.symbols("SPOT_SYMBOLS", "BTCUSDT")?;
        let fut_symbols = env.symbols("FUT_SYMBOLS", "BTCUSDT")?;
        if spot_symbols.is_empty() && fut_symbols.is_empty() {
            return Err(ConfigError::Missing("SPOT_SYMBOLS or FUT_SYMBOLS".into()));
        }

        let position_pct_max: Decimal = env.positive("POSITION_PCT_MAX", Decimal::new(2, 1))?;
        if position_pct_max > Decimal::ONE {
            return Err(invalid("POSITION_PCT_MAX", position_pct_max));
        }

        let spot = ClassProfile {
            class: StrategyClass::Spot,
            fee_rate: env.parse("FEE_TAKER_SPOT", 0.0010)?,
            leverage: env.positive("LEVERAGE_SPOT", Decimal::ONE)?,
            daily_stop_pct: daily_stop(&env, "DAILY_STOP_SPOT_PCT", -3.0)?,
            qty_step: env.positive("QTY_STEP_SPOT", Decimal::new(1, 4))?,
            min_interval: env.millis("SPOT_MIN_INTERVAL_MS", 200)?,
            policy_path: PathBuf::from(env.string("POLICY_SPOT_PATH", "models/spot/policy.json")),
            default_nav: env.positive("DEFAULT_NAV_SPOT", Decimal::new(60_000, 0))?,
        };
        let futures = ClassProfile {
            class: StrategyClass::Futures,
            fee_rate: env.parse("FEE_TAKER_FUT", 0.0004)?,
            leverage: env.positive("LEVERAGE_FUT", Decimal::TWO)?,
            daily_stop_pct: daily_stop(&env, "DAILY_STOP_FUT_PCT", -5.0)?,
            qty_step: env.positive("QTY_STEP_FUT", Decimal::new(1, 4))?,
            min_interval: env.millis("FUT_MIN_INTERVAL_MS", 100)?,
            policy_path: PathBuf::from(env.string("POLICY_FUT_PATH", "models/futures/policy.json")),
            default_nav: env.positive("DEFAULT_NAV_FUT", Decimal::new(40_000, 0))?,
        };
        for (var, fee) in [("FEE_TAKER_SPOT", spot.fee_rate), ("FEE_TAKER_FUT", futures.fee_rate)] {
            if !(0.0..1.0).contains(&fee) {
                return Err(invalid(var, fee));
            }
        }
        let screener_min_qvol: f64 = env.parse("SCREENER_MIN_QVOL_USDT", 10_000_000.0)?;
        if !screener_min_qvol.is_finite() || screener_min_qvol < 0.0 {
            return Err(invalid("SCREENER_MIN_QVOL_USDT", screener_min_qvol));
        }

        Ok(Self {
            mode,
            api_key,
            api_secret,
            spot_symbols,
            fut_symbols,
            interval: env.string("INTERVAL", "1h"),
            kline_limit: env.positive("KLINE_LIMIT", 500)?,
            position_pct_max,
            atr_sl_mult: env.positive("ATR_SL_MULT", Decimal::new(125, 2))?,
            atr_tp_mult: env.positive("ATR_TP_MULT", Decimal::new(25, 1))?,
            screener_min_qvol,
            screener_top_n: env.positive("SCREENER_TOP_N", 5)?,
            retry_max_attempts: env.positive("RETRY_MAX_ATTEMPTS", 3)?,
            retry_base_delay: env.millis("RETRY_BASE_DELAY_MS", 500)?,
            retry_max_delay: env.millis("RETRY_MAX_DELAY_MS", 8000)?,
            cycle_interval: env.secs("CYCLE_INTERVAL_SECS", 3600)?,
            heartbeat_interval: env.secs("HEARTBEAT_INTERVAL_SECS", 30)?,
            reset_sweep_interval: env.secs("RESET_SWEEP_INTERVAL_SECS", 3600)?,
            monitor_interval: env.secs("MONITOR_INTERVAL_SECS", 60)?,
            log_level: env.string("LOG_LEVEL", "info"),
            log_file: env.raw("LOG_FILE"),
            spot,
            futures,
        })
    }

    pub fn profile(&self, class: StrategyClass) -> &ClassProfile {
        match class {
            StrategyClass::Spot => &self.spot,
            StrategyClass::Futures => &self.futures,
        }
    }

    pub fn universe(&self) -> Universe {
        let mut universe = Universe::new();
        universe.insert(StrategyClass::Spot, self.spot_symbols.clone());
        universe.insert(StrategyClass::Futures, self.fut_symbols.clone());
        universe
    }

    pub fn default_nav(&self) -> NavSnapshot {
        NavSnapshot::new(self.spot.default_nav, self.futures.default_nav)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            self.retry_base_delay,
            self.retry_max_delay,
        )
    }

    pub fn risk_config(&self) -> RiskConfig {
        RiskConfig {
            max_position_fraction: self.position_pct_max,
            atr_sl_mult: self.atr_sl_mult,
            atr_tp_mult: self.atr_tp_mult,
            ..RiskConfig::default()
        }
    }

    pub fn screener_config(&self) -> ScreenerConfig {
        ScreenerConfig {
            min_quote_volume: self.screener_min_qvol,
            top_n: self.screener_top_n,
            atr_sl_mult: self.atr_sl_mult.to_f64().unwrap_or(1.25),
            atr_tp_mult: self.atr_tp_mult.to_f64().unwrap_or(2.5),
            ..ScreenerConfig::default()
        }
    }
}

/// Daily stop thresholds are losses, so they must not be positive
fn daily_stop<F>(env: &Reader<F>, var: &str, default: f64) -> Result<f64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value: f64 = env.parse(var, default)?;
    if value.is_finite() && value <= 0.0 {
        Ok(value)
    } else {
        Err(invalid(var, value))
    }
}
