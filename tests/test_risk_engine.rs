//! Risk engine state machine: streaks, pauses, daily stop, reset sweep
//! and sizing bounds.

mod common;

use chrono::Duration;
use crypto_autotrader::core::{Clock, ManualClock, NavSnapshot, OrderSide, StrategyClass};
use crypto_autotrader::risk::{PauseReason, RiskConfig, RiskEngine, RiskStatus};
use crypto_autotrader::types::Price;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn engine() -> (RiskEngine, Arc<ManualClock>) {
    let clock = common::manual_clock();
    (RiskEngine::new(RiskConfig::default(), clock.clone()), clock)
}

// =============================================================================
// Loss streak and pause window
// =============================================================================

#[tokio::test]
async fn test_third_loss_pauses_for_a_day() {
    let (risk, clock) = engine();

    assert_eq!(risk.register_loss(StrategyClass::Spot).await, RiskStatus::Active);
    assert_eq!(risk.register_loss(StrategyClass::Spot).await, RiskStatus::Active);
    let status = risk.register_loss(StrategyClass::Spot).await;
    assert_eq!(
        status,
        RiskStatus::Paused {
            until: common::start_time() + Duration::hours(24)
        }
    );

    // Other class untouched
    assert_eq!(risk.status(StrategyClass::Futures).await, RiskStatus::Active);

    clock.advance(Duration::hours(24));
    // Pause over, streak still at the limit
    assert_eq!(risk.status(StrategyClass::Spot).await, RiskStatus::Cooling);
    assert_eq!(risk.cooldown_multiplier(StrategyClass::Spot).await, dec!(0.5));
}

#[tokio::test]
async fn test_win_clears_streak_pause() {
    let (risk, _) = engine();
    for _ in 0..3 {
        risk.register_loss(StrategyClass::Futures).await;
    }
    assert!(risk.status(StrategyClass::Futures).await.is_paused());

    assert_eq!(risk.register_win(StrategyClass::Futures).await, RiskStatus::Active);
    assert_eq!(risk.cooldown_multiplier(StrategyClass::Futures).await, Decimal::ONE);
}

#[tokio::test]
async fn test_daily_stop_survives_wins() {
    let (risk, _) = engine();
    risk.apply_nav(&NavSnapshot::new(dec!(1000), dec!(1000))).await;
    risk.apply_nav(&NavSnapshot::new(dec!(960), dec!(1000))).await;

    let pnl = risk.daily_pnl_pct(StrategyClass::Spot).await.unwrap();
    assert!((pnl + 4.0).abs() < 1e-9);
    assert!(risk.check_daily_stop(StrategyClass::Spot, pnl, -3.0).await);
    assert!(!risk
        .check_daily_stop(StrategyClass::Futures, 0.0, -3.0)
        .await);

    assert!(risk.register_win(StrategyClass::Spot).await.is_paused());
    let state = risk.snapshot(StrategyClass::Spot).await.unwrap();
    assert_eq!(state.pause_reason, Some(PauseReason::DailyStop));

    // Manual release lifts it
    assert_eq!(risk.release_pause(StrategyClass::Spot).await, RiskStatus::Active);
}

#[tokio::test]
async fn test_streak_pause_after_expired_daily_stop_is_cleared_by_win() {
    let (risk, clock) = engine();
    risk.register_loss(StrategyClass::Spot).await;
    risk.register_loss(StrategyClass::Spot).await;
    assert!(risk.check_daily_stop(StrategyClass::Spot, -4.0, -3.0).await);

    // Daily stop window passes without anyone reading the status
    clock.advance(Duration::hours(25));
    assert!(risk.register_loss(StrategyClass::Spot).await.is_paused());
    let state = risk.snapshot(StrategyClass::Spot).await.unwrap();
    assert_eq!(state.pause_reason, Some(PauseReason::LossStreak));

    assert_eq!(risk.register_win(StrategyClass::Spot).await, RiskStatus::Active);
    assert_eq!(risk.cooldown_multiplier(StrategyClass::Spot).await, Decimal::ONE);
}

#[tokio::test]
async fn test_reset_sweep_after_a_day() {
    let (risk, clock) = engine();
    risk.apply_nav(&NavSnapshot::new(dec!(1000), dec!(500))).await;
    for _ in 0..3 {
        risk.register_loss(StrategyClass::Spot).await;
    }

    clock.advance(Duration::hours(23));
    assert!(risk.reset_expired().await.is_empty());

    risk.apply_nav(&NavSnapshot::new(dec!(900), dec!(500))).await;
    clock.advance(Duration::hours(1));
    let reset = risk.reset_expired().await;
    assert_eq!(reset, vec![StrategyClass::Spot, StrategyClass::Futures]);

    let state = risk.snapshot(StrategyClass::Spot).await.unwrap();
    assert_eq!(state.loss_streak, 0);
    assert!(state.paused_until.is_none());
    assert_eq!(state.day_start_nav, dec!(900));
    assert_eq!(state.last_reset, clock.now());
}

// =============================================================================
// Sizing and brackets
// =============================================================================

#[test]
fn test_position_size_formula() {
    let (risk, _) = engine();
    // 10_000 * 0.2 * 0.8 / 0.02 * 2
    let size = risk.compute_position_size(dec!(10000), 2.0, 0.8, dec!(2));
    assert_eq!(size, dec!(160000));

    // ATR floor of 1% and confidence floor of 0.2
    let floored = risk.compute_position_size(dec!(10000), 0.1, 0.05, Decimal::ONE);
    assert_eq!(floored, dec!(40000));
}

#[test]
fn test_sell_brackets_are_mirrored() {
    let (risk, _) = engine();
    let (sl, tp) = risk.atr_sl_tp(Price::new(dec!(100)), Price::new(dec!(4)), OrderSide::Sell);
    assert_eq!(sl, Price::new(dec!(105)));
    assert_eq!(tp, Price::new(dec!(90)));
}

proptest! {
    #[test]
    fn prop_position_size_is_never_negative(
        nav in -1_000_000i64..10_000_000i64,
        atr_pct in prop::num::f64::ANY,
        confidence in prop::num::f64::ANY,
        leverage in 0u32..20,
    ) {
        let (risk, _) = engine();
        let size = risk.compute_position_size(
            Decimal::from(nav),
            atr_pct,
            confidence,
            Decimal::from(leverage),
        );
        prop_assert!(size >= Decimal::ZERO);
        if nav <= 0 || leverage == 0 {
            prop_assert_eq!(size, Decimal::ZERO);
        }
    }

    #[test]
    fn prop_position_size_shrinks_with_volatility(
        nav in 1i64..10_000_000i64,
        low_atr in 0u32..5_000,
        extra_atr in 0u32..5_000,
        confidence in 0u32..=100,
    ) {
        let (risk, _) = engine();
        let confidence = confidence as f64 / 100.0;
        let calm = risk.compute_position_size(Decimal::from(nav), low_atr as f64 / 100.0, confidence, Decimal::ONE);
        let wild = risk.compute_position_size(
            Decimal::from(nav),
            (low_atr + extra_atr) as f64 / 100.0,
            confidence,
            Decimal::ONE,
        );
        prop_assert!(wild <= calm);
    }

    #[test]
    fn prop_position_size_grows_with_confidence(
        nav in 1i64..10_000_000i64,
        atr in 0u32..10_000,
        low in 20u32..=100,
        extra in 0u32..=80,
    ) {
        let (risk, _) = engine();
        let high = (low + extra).min(100);
        let atr_pct = atr as f64 / 100.0;
        let unsure = risk.compute_position_size(Decimal::from(nav), atr_pct, low as f64 / 100.0, dec!(2));
        let sure = risk.compute_position_size(Decimal::from(nav), atr_pct, high as f64 / 100.0, dec!(2));
        prop_assert!(sure >= unsure);
    }

    #[test]
    fn prop_long_brackets_straddle_price(
        price in 1u32..1_000_000,
        atr in 1u32..10_000,
    ) {
        let (risk, _) = engine();
        let price = Price::new(Decimal::from(price));
        let atr = Price::new(Decimal::from(atr) / dec!(100));
        let (sl, tp) = risk.atr_sl_tp(price, atr, OrderSide::Buy);
        prop_assert!(sl < price);
        prop_assert!(price < tp);
        prop_assert!(sl >= Price::ZERO);
    }

    #[test]
    fn prop_short_brackets_straddle_price(
        price in 1u32..1_000_000,
        atr in 1u32..10_000,
    ) {
        let (risk, _) = engine();
        let price = Price::new(Decimal::from(price));
        let atr = Price::new(Decimal::from(atr) / dec!(100));
        let (sl, tp) = risk.atr_sl_tp(price, atr, OrderSide::Sell);
        prop_assert!(tp < price);
        prop_assert!(price < sl);
        prop_assert!(tp >= Price::ZERO);
    }

    #[test]
    fn prop_paused_iff_trailing_losses_reach_limit(outcomes in prop::collection::vec(any::<bool>(), 0..20)) {
        let (risk, _) = engine();
        let mut trailing_losses = 0u32;
        tokio_test::block_on(async {
            for win in &outcomes {
                if *win {
                    risk.register_win(StrategyClass::Spot).await;
                    trailing_losses = 0;
                } else {
                    risk.register_loss(StrategyClass::Spot).await;
                    trailing_losses += 1;
                }
            }
        });
        let status = tokio_test::block_on(risk.status(StrategyClass::Spot));
        prop_assert_eq!(status.is_paused(), trailing_losses >= 3);
    }
}
