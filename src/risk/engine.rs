use crate::core::clock::Clock;
use crate::core::events::OrderSide;
use crate::core::model::{NavSnapshot, StrategyClass};
use crate::risk::state::{PauseReason, RiskState, RiskStatus};
use crate::types::Price;
use chrono::Duration;
use log::{info, warn};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Risk engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    /// Share of NAV one position may use before volatility scaling
    pub max_position_fraction: Decimal,
    pub atr_sl_mult: Decimal,
    pub atr_tp_mult: Decimal,
    /// Consecutive losses that trigger a pause
    pub loss_streak_limit: u32,
    pub pause_window: Duration,
    /// Age of `last_reset` after which the sweep resets a class
    pub reset_interval: Duration,
    /// Size multiplier while cooling or paused
    pub cooldown_factor: Decimal,
    /// Lower bound on ATR as a fraction of price
    pub min_atr_fraction: Decimal,
    pub min_confidence: Decimal,
    pub max_confidence: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_fraction: dec!(0.2),
            atr_sl_mult: dec!(1.25),
            atr_tp_mult: dec!(2.5),
            loss_streak_limit: 3,
            pause_window: Duration::hours(24),
            reset_interval: Duration::hours(24),
            cooldown_factor: dec!(0.5),
            min_atr_fraction: dec!(0.01),
            min_confidence: dec!(0.2),
            max_confidence: Decimal::ONE,
        }
    }
}

/// Owns the per-class [`RiskState`]s and every rule that reads or changes them.
///
/// Each class sits behind its own mutex so classes never wait on each other.
/// States are created on first touch and live for the whole process.
pub struct RiskEngine {
    config: RiskConfig,
    clock: Arc<dyn Clock>,
    states: HashMap<StrategyClass, Mutex<Option<RiskState>>>,
}

impl RiskEngine {
    pub fn new(config: RiskConfig, clock: Arc<dyn Clock>) -> Self {
        let states = StrategyClass::ALL
            .iter()
            .map(|class| (*class, Mutex::new(None)))
            .collect();
        Self {
            config,
            clock,
            states,
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Runs `f` on the class state, creating it when absent
    async fn with_state<T>(&self, class: StrategyClass, f: impl FnOnce(&mut RiskState) -> T) -> T {
        let now = self.clock.now();
        // every class is inserted in `new`
        let slot = &self.states[&class];
        let mut guard = slot.lock().await;
        let state = guard.get_or_insert_with(|| {
            info!("[{}] risk state created", class);
            RiskState::new(class, now)
        });
        f(state)
    }

    /// Records the latest NAV. The first NAV seen also opens the trading day.
    pub async fn update_nav(&self, class: StrategyClass, nav_a: Decimal, nav_b: Decimal) {
        self.with_state(class, |state| {
            state.nav_a = nav_a;
            state.nav_b = nav_b;
            state.nav_total = nav_a + nav_b;
            if state.day_start_nav.is_zero() {
                state.day_start_nav = state.class_nav();
            }
        })
        .await
    }

    pub async fn apply_nav(&self, nav: &NavSnapshot) {
        for class in StrategyClass::ALL {
            self.update_nav(class, nav.nav_a, nav.nav_b).await;
        }
    }

    /// Class PnL since the start of the trading day, in percent.
    /// `None` until a positive opening NAV is known.
    pub async fn daily_pnl_pct(&self, class: StrategyClass) -> Option<f64> {
        let guard = self.states[&class].lock().await;
        let state = guard.as_ref()?;
        if state.day_start_nav <= Decimal::ZERO {
            return None;
        }
        ((state.class_nav() - state.day_start_nav) / state.day_start_nav * Decimal::ONE_HUNDRED)
            .to_f64()
    }

    /// Pauses the class when `pnl_pct` is at or below `threshold`
    pub async fn check_daily_stop(&self, class: StrategyClass, pnl_pct: f64, threshold: f64) -> bool {
        if !(pnl_pct <= threshold) {
            return false;
        }
        let now = self.clock.now();
        let until = now + self.config.pause_window;
        self.with_state(class, |state| state.pause(now, until, PauseReason::DailyStop))
            .await;
        warn!(
            "[{}] daily stop hit ({:.2}% <= {:.2}%), paused until {}",
            class, pnl_pct, threshold, until
        );
        true
    }

    /// Counts a loss; reaching the streak limit pauses the class at once
    pub async fn register_loss(&self, class: StrategyClass) -> RiskStatus {
        let now = self.clock.now();
        let limit = self.config.loss_streak_limit;
        let until = now + self.config.pause_window;

        let (streak, status) = self
            .with_state(class, |state| {
                state.loss_streak += 1;
                if state.loss_streak >= limit {
                    state.pause(now, until, PauseReason::LossStreak);
                }
                (state.loss_streak, state.refresh(now, limit))
            })
            .await;

        if status.is_paused() && streak == limit {
            warn!("[{}] {} consecutive losses, paused until {}", class, streak, until);
        }
        status
    }

    /// Clears the streak and any streak pause. A daily-stop pause remains.
    pub async fn register_win(&self, class: StrategyClass) -> RiskStatus {
        let now = self.clock.now();
        let limit = self.config.loss_streak_limit;
        self.with_state(class, |state| {
            state.loss_streak = 0;
            if state.pause_reason == Some(PauseReason::LossStreak) {
                state.clear_pause();
            }
            state.refresh(now, limit)
        })
        .await
    }

    /// Manual release. Lifts the pause but keeps the streak.
    pub async fn release_pause(&self, class: StrategyClass) -> RiskStatus {
        let now = self.clock.now();
        let limit = self.config.loss_streak_limit;
        let status = self
            .with_state(class, |state| {
                state.clear_pause();
                state.refresh(now, limit)
            })
            .await;
        info!("[{}] pause released manually, now {:?}", class, status);
        status
    }

    /// Current status. An expired pause is cleared on the way.
    pub async fn status(&self, class: StrategyClass) -> RiskStatus {
        let now = self.clock.now();
        let mut guard = self.states[&class].lock().await;
        match guard.as_mut() {
            Some(state) => state.refresh(now, self.config.loss_streak_limit),
            None => RiskStatus::Active,
        }
    }

    pub async fn cooldown_multiplier(&self, class: StrategyClass) -> Decimal {
        if self.status(class).await.is_penalized() {
            self.config.cooldown_factor
        } else {
            Decimal::ONE
        }
    }

    /// Daily reset sweep: every state whose last reset is at least
    /// `reset_interval` old gets a zero streak, no pause, a fresh day-start
    /// NAV and a new `last_reset`. Returns the classes that were reset.
    pub async fn reset_expired(&self) -> Vec<StrategyClass> {
        let now = self.clock.now();
        let mut reset = Vec::new();
        for class in StrategyClass::ALL {
            let mut guard = self.states[&class].lock().await;
            if let Some(state) = guard.as_mut() {
                if now - state.last_reset >= self.config.reset_interval {
                    state.loss_streak = 0;
                    state.clear_pause();
                    state.day_start_nav = state.class_nav();
                    state.last_reset = now;
                    reset.push(class);
                }
            }
        }
        if !reset.is_empty() {
            info!("Daily risk reset for {:?}", reset);
        }
        reset
    }

    pub async fn snapshot(&self, class: StrategyClass) -> Option<RiskState> {
        self.states[&class].lock().await.clone()
    }

    pub async fn snapshots(&self) -> Vec<RiskState> {
        let mut all = Vec::new();
        for class in StrategyClass::ALL {
            if let Some(state) = self.snapshot(class).await {
                all.push(state);
            }
        }
        all
    }

    /// Notional to commit:
    /// `nav × max_fraction × clip(confidence) / max(atr_pct / 100, min_atr) × leverage`.
    ///
    /// Non-finite inputs and non-positive NAV or leverage size to zero.
    pub fn compute_position_size(
        &self,
        nav: Decimal,
        atr_pct: f64,
        confidence: f64,
        leverage: Decimal,
    ) -> Decimal {
        let (Some(confidence), Some(atr_pct)) = (Decimal::from_f64(confidence), Decimal::from_f64(atr_pct)) else {
            return Decimal::ZERO;
        };
        if nav <= Decimal::ZERO || leverage <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let confidence = confidence.clamp(self.config.min_confidence, self.config.max_confidence);
        let atr_fraction = (atr_pct / Decimal::ONE_HUNDRED).max(self.config.min_atr_fraction);
        nav * self.config.max_position_fraction * confidence / atr_fraction * leverage
    }

    /// Stop-loss and take-profit around `price`, mirrored for shorts,
    /// never below zero.
    pub fn atr_sl_tp(&self, price: Price, atr_value: Price, side: OrderSide) -> (Price, Price) {
        let stop_distance = atr_value * self.config.atr_sl_mult;
        let target_distance = atr_value * self.config.atr_tp_mult;
        match side {
            OrderSide::Buy => ((price - stop_distance).floor_zero(), price + target_distance),
            OrderSide::Sell => (price + stop_distance, (price - target_distance).floor_zero()),
        }
    }
}

impl std::fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskEngine")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use chrono::{DateTime, Utc};

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn engine() -> (RiskEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        (RiskEngine::new(RiskConfig::default(), clock.clone()), clock)
    }

    #[test]
    fn test_position_size_scenario() {
        let (engine, _) = engine();
        let size = engine.compute_position_size(dec!(100000), 2.0, 1.0, Decimal::ONE);
        assert_eq!(size, dec!(1000000));
        assert_eq!(size * dec!(0.5), dec!(500000));
    }

    #[test]
    fn test_position_size_clamps() {
        let (engine, _) = engine();
        // confidence below the floor counts as 0.2, ATR below 1% counts as 1%
        let size = engine.compute_position_size(dec!(1000), 0.1, 0.05, dec!(2));
        assert_eq!(size, dec!(1000) * dec!(0.2) * dec!(0.2) / dec!(0.01) * dec!(2));

        assert_eq!(engine.compute_position_size(dec!(1000), f64::NAN, 1.0, Decimal::ONE), Decimal::ZERO);
        assert_eq!(engine.compute_position_size(Decimal::ZERO, 2.0, 1.0, Decimal::ONE), Decimal::ZERO);
    }

    #[test]
    fn test_sl_tp_long_and_short() {
        let (engine, _) = engine();
        let price = Price::new(dec!(100));
        let atr = Price::new(dec!(2));

        let (sl, tp) = engine.atr_sl_tp(price, atr, OrderSide::Buy);
        assert_eq!((sl.value(), tp.value()), (dec!(97.5), dec!(105)));

        let (sl, tp) = engine.atr_sl_tp(price, atr, OrderSide::Sell);
        assert_eq!((sl.value(), tp.value()), (dec!(102.5), dec!(95)));

        let (_, tp) = engine.atr_sl_tp(price, Price::new(dec!(80)), OrderSide::Sell);
        assert_eq!(tp, Price::ZERO);
    }

    #[tokio::test]
    async fn test_third_loss_pauses() {
        let (engine, _) = engine();
        assert_eq!(engine.register_loss(StrategyClass::Spot).await, RiskStatus::Active);
        assert_eq!(engine.register_loss(StrategyClass::Spot).await, RiskStatus::Active);
        assert_eq!(engine.cooldown_multiplier(StrategyClass::Spot).await, Decimal::ONE);

        let status = engine.register_loss(StrategyClass::Spot).await;
        assert_eq!(status, RiskStatus::Paused { until: start() + Duration::hours(24) });
        assert_eq!(engine.cooldown_multiplier(StrategyClass::Spot).await, dec!(0.5));

        // other class untouched
        assert_eq!(engine.status(StrategyClass::Futures).await, RiskStatus::Active);
    }

    #[tokio::test]
    async fn test_pause_expires_into_cooling() {
        let (engine, clock) = engine();
        for _ in 0..3 {
            engine.register_loss(StrategyClass::Futures).await;
        }
        clock.advance(Duration::hours(24));

        assert_eq!(engine.status(StrategyClass::Futures).await, RiskStatus::Cooling);
        assert_eq!(engine.cooldown_multiplier(StrategyClass::Futures).await, dec!(0.5));
        let state = engine.snapshot(StrategyClass::Futures).await.unwrap();
        assert!(state.paused_until.is_none());
    }

    #[tokio::test]
    async fn test_win_restores_full_size() {
        let (engine, _) = engine();
        for _ in 0..3 {
            engine.register_loss(StrategyClass::Spot).await;
        }
        assert_eq!(engine.register_win(StrategyClass::Spot).await, RiskStatus::Active);
        assert_eq!(engine.cooldown_multiplier(StrategyClass::Spot).await, Decimal::ONE);
        assert_eq!(engine.snapshot(StrategyClass::Spot).await.unwrap().loss_streak, 0);
    }

    #[tokio::test]
    async fn test_daily_stop_survives_win() {
        let (engine, _) = engine();
        engine.update_nav(StrategyClass::Spot, dec!(60000), dec!(40000)).await;
        engine.update_nav(StrategyClass::Spot, dec!(58000), dec!(40000)).await;

        let pnl = engine.daily_pnl_pct(StrategyClass::Spot).await.unwrap();
        assert!((pnl - (-3.3333333333)).abs() < 1e-6);
        assert!(engine.check_daily_stop(StrategyClass::Spot, pnl, -3.0).await);

        assert!(engine.register_win(StrategyClass::Spot).await.is_paused());
        assert_eq!(engine.cooldown_multiplier(StrategyClass::Spot).await, dec!(0.5));

        assert_eq!(engine.release_pause(StrategyClass::Spot).await, RiskStatus::Active);
    }

    #[tokio::test]
    async fn test_daily_stop_not_hit() {
        let (engine, _) = engine();
        assert!(!engine.check_daily_stop(StrategyClass::Futures, -4.9, -5.0).await);
        assert!(engine.snapshot(StrategyClass::Futures).await.is_none());
    }

    #[tokio::test]
    async fn test_reset_sweep() {
        let (engine, clock) = engine();
        engine.update_nav(StrategyClass::Futures, dec!(60000), dec!(40000)).await;
        for _ in 0..3 {
            engine.register_loss(StrategyClass::Futures).await;
        }

        clock.advance(Duration::hours(23));
        assert!(engine.reset_expired().await.is_empty());

        clock.advance(Duration::hours(1));
        engine.update_nav(StrategyClass::Futures, dec!(60000), dec!(41000)).await;
        assert_eq!(engine.reset_expired().await, vec![StrategyClass::Futures]);

        let state = engine.snapshot(StrategyClass::Futures).await.unwrap();
        assert_eq!(state.loss_streak, 0);
        assert!(state.paused_until.is_none());
        assert_eq!(state.day_start_nav, dec!(41000));
        assert_eq!(state.last_reset, clock.now());
    }

    #[tokio::test]
    async fn test_lazy_creation() {
        let (engine, _) = engine();
        assert!(engine.snapshots().await.is_empty());

        engine.update_nav(StrategyClass::Spot, dec!(1), dec!(2)).await;
        let state = engine.snapshot(StrategyClass::Spot).await.unwrap();
        assert_eq!(state.nav_total, dec!(3));
        assert_eq!(state.day_start_nav, dec!(1));
        assert_eq!(engine.snapshots().await.len(), 1);
    }
}
