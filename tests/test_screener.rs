//! Ranking across a universe: liquidity floor, data gaps, top-N.

mod common;

use crypto_autotrader::core::{Action, Candle, StrategyClass};
use crypto_autotrader::strategies::{Screener, ScreenerConfig};
use crypto_autotrader::types::Symbol;

fn universe() -> Vec<(Symbol, Vec<Candle>)> {
    vec![
        (Symbol::new("SLOWUSDT"), common::candles(&common::path(10.0, 0.003, 120), 5e7)),
        (Symbol::new("FASTUSDT"), common::candles(&common::path(10.0, 0.008, 120), 5e7)),
        (Symbol::new("DOWNUSDT"), common::candles(&common::path(10.0, -0.01, 120), 5e7)),
        (Symbol::new("THINUSDT"), common::candles(&common::path(10.0, 0.008, 120), 1e3)),
        (Symbol::new("NEWUSDT"), common::candles(&common::path(10.0, 0.008, 8), 5e7)),
    ]
}

fn pairs(series: &[(Symbol, Vec<Candle>)]) -> impl Iterator<Item = (&Symbol, &[Candle])> {
    series.iter().map(|(s, c)| (s, c.as_slice()))
}

#[test]
fn test_ranking_and_filters() {
    let series = universe();
    let ranked = Screener::default().score(StrategyClass::Spot, pairs(&series), 0.001);

    let symbols: Vec<&str> = ranked.iter().map(|c| c.symbol.as_str()).collect();
    // Thin and short histories are skipped, the downtrend scores negative
    assert_eq!(symbols, vec!["FASTUSDT", "SLOWUSDT"]);
    assert!(ranked[0].score >= ranked[1].score);
    assert_eq!(ranked[0].action, Action::Buy);
}

#[test]
fn test_top_n_truncates() {
    let series = universe();
    let screener = Screener::new(ScreenerConfig {
        top_n: 1,
        ..ScreenerConfig::default()
    });
    let ranked = screener.score(StrategyClass::Futures, pairs(&series), 0.0004);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].symbol.as_str(), "FASTUSDT");
}

#[test]
fn test_features_follow_candidate() {
    let series = universe();
    let ranked = Screener::default().score(StrategyClass::Spot, pairs(&series), 0.001);
    let best = &ranked[0];

    let features = best.features();
    assert_eq!(features[0], best.expected_return);
    assert_eq!(features[1], best.atr_pct / 100.0);
    assert_eq!(features[4], best.risk_reward_ratio);
}
