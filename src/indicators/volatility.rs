use crate::core::model::Candle;
use std::fmt;

/// True range against the previous close. The first bar has no previous
/// close and uses its own high-low span.
pub fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    match prev_close {
        None => high - low,
        Some(prev_close) => (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs()),
    }
}

/// Average True Range with Wilder smoothing: an exponential average of the
/// true range with `alpha = 1/period`, seeded with the first bar's range.
#[derive(Debug, Clone)]
pub struct WilderAtr {
    period: usize,
    alpha: f64,
    current: Option<f64>,
    prev_close: Option<f64>,
    samples: usize,
}

impl WilderAtr {
    /// A zero period is treated as 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            alpha: 1.0 / period as f64,
            current: None,
            prev_close: None,
            samples: 0,
        }
    }

    pub fn next(&mut self, high: f64, low: f64, close: f64) -> f64 {
        let tr = true_range(high, low, self.prev_close);
        let value = match self.current {
            None => tr,
            Some(previous) => self.alpha.mul_add(tr, (1.0 - self.alpha) * previous),
        };
        self.current = Some(value);
        self.prev_close = Some(close);
        self.samples += 1;
        value
    }

    pub fn value(&self) -> Option<f64> {
        self.current
    }

    /// At least `period` bars have been folded in
    pub fn is_warm(&self) -> bool {
        self.samples >= self.period
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.prev_close = None;
        self.samples = 0;
    }
}

impl fmt::Display for WilderAtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ATR({}): {:.4}", self.period, self.current.unwrap_or(0.0))
    }
}

/// Latest ATR over a whole candle series. `None` for an empty series.
pub fn atr(candles: &[Candle], period: usize) -> Option<f64> {
    let mut indicator = WilderAtr::new(period);
    for candle in candles {
        indicator.next(candle.high, candle.low, candle.close);
    }
    indicator.value()
}
