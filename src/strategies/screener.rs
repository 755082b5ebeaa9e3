use crate::core::model::{Action, Candle, ScoredCandidate, StrategyClass};
use crate::indicators::{atr, mean, sharpe, simple_returns, sortino, tail};
use crate::types::Symbol;
use log::{debug, info};
use std::cmp::Ordering;
use thiserror::Error;

/// Guards the risk-reward denominator against a zero ATR
const RR_EPSILON: f64 = 1e-8;

/// A symbol whose candle history can not be scored this cycle
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataGapError {
    #[error("need at least {needed} candles, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    #[error("non-finite or non-positive {0}")]
    NonFinite(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenerConfig {
    /// Floor on trailing mean quote volume
    pub min_quote_volume: f64,
    pub liquidity_window: usize,
    /// Window for expected return and the action decision
    pub return_window: usize,
    /// Window for Sharpe and Sortino
    pub risk_window: usize,
    pub atr_period: usize,
    pub top_n: usize,
    pub atr_sl_mult: f64,
    pub atr_tp_mult: f64,
    /// Fewer candles than this is a data gap
    pub min_history: usize,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            min_quote_volume: 10_000_000.0,
            liquidity_window: 24,
            return_window: 24,
            risk_window: 72,
            atr_period: 14,
            top_n: 5,
            atr_sl_mult: 1.25,
            atr_tp_mult: 2.5,
            min_history: 15,
        }
    }
}

/// Ranks symbols of one strategy class into trade candidates
#[derive(Debug, Clone)]
pub struct Screener {
    config: ScreenerConfig,
}

impl Screener {
    pub fn new(config: ScreenerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    /// Scores every series, drops illiquid and negative-score symbols, and
    /// returns at most `top_n` candidates by descending score. Equal scores
    /// keep their input order. Symbols with a data gap are skipped.
    pub fn score<'a, I>(&self, class: StrategyClass, series: I, fee_rate: f64) -> Vec<ScoredCandidate>
    where
        I: IntoIterator<Item = (&'a Symbol, &'a [Candle])>,
    {
        let mut candidates = Vec::new();
        for (symbol, candles) in series {
            match self.screen_symbol(symbol, candles, fee_rate) {
                Ok(Some(candidate)) => candidates.push(candidate),
                Ok(None) => {}
                Err(err) => info!("[{}] skipping {}: {}", class, symbol, err),
            }
        }

        candidates.retain(|c| c.score >= 0.0);
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        candidates.truncate(self.config.top_n);

        debug!("[{}] {} candidates after screening", class, candidates.len());
        candidates
    }

    /// Features for one symbol. `Ok(None)` when it fails the liquidity floor.
    pub fn screen_symbol(
        &self,
        symbol: &Symbol,
        candles: &[Candle],
        fee_rate: f64,
    ) -> Result<Option<ScoredCandidate>, DataGapError> {
        let needed = self.config.min_history.max(2);
        if candles.len() < needed {
            return Err(DataGapError::InsufficientHistory {
                needed,
                got: candles.len(),
            });
        }

        let quote_volumes: Vec<f64> = candles.iter().map(|c| c.quote_volume).collect();
        let liquidity = mean(tail(&quote_volumes, self.config.liquidity_window));
        if !(liquidity >= self.config.min_quote_volume) {
            debug!(
                "{} below liquidity floor ({:.0} < {:.0})",
                symbol, liquidity, self.config.min_quote_volume
            );
            return Ok(None);
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let last_price = closes[closes.len() - 1];
        if !last_price.is_finite() || last_price <= 0.0 {
            return Err(DataGapError::NonFinite("close"));
        }

        let atr_value = atr(candles, self.config.atr_period)
            .filter(|v| v.is_finite())
            .ok_or(DataGapError::NonFinite("atr"))?;
        let atr_pct = atr_value / last_price * 100.0;

        let returns = simple_returns(&closes);
        let expected_return = mean(tail(&returns, self.config.return_window));
        if !expected_return.is_finite() {
            return Err(DataGapError::NonFinite("expected return"));
        }
        let risk_returns = tail(&returns, self.config.risk_window);
        let sharpe = sharpe(risk_returns);
        let sortino = sortino(risk_returns);

        let risk_reward_ratio = (expected_return * self.config.atr_tp_mult).max(0.0)
            / (atr_value * self.config.atr_sl_mult).max(RR_EPSILON);

        let score = 0.4 * sharpe + 0.4 * sortino + 0.2 * (expected_return * 100.0) - fee_rate * 100.0;

        let action = if expected_return > fee_rate {
            Action::Buy
        } else if expected_return < -fee_rate {
            Action::Sell
        } else {
            Action::Hold
        };

        Ok(Some(ScoredCandidate {
            symbol: symbol.clone(),
            score,
            expected_return,
            atr_value,
            atr_pct,
            sharpe,
            sortino,
            risk_reward_ratio,
            last_price,
            action,
        }))
    }
}

impl Default for Screener {
    fn default() -> Self {
        Self::new(ScreenerConfig::default())
    }
}
