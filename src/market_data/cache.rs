use crate::core::model::{MarketSnapshot, StrategyClass};
use dashmap::DashMap;

fn make_key(class: StrategyClass, symbol: &str, interval: &str) -> String {
    format!(
        "md:{}:{}:{}",
        class.as_str().to_lowercase(),
        symbol.to_uppercase(),
        interval
    )
}

/// Latest snapshot per class, symbol and interval, readable from outside the
/// cycle. Writes replace the previous value.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    map: DashMap<String, MarketSnapshot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_for(snapshot: &MarketSnapshot) -> String {
        make_key(snapshot.class, snapshot.symbol.as_str(), &snapshot.interval)
    }

    pub fn put(&self, snapshot: MarketSnapshot) {
        self.map.insert(Self::key_for(&snapshot), snapshot);
    }

    pub fn get(&self, class: StrategyClass, symbol: &str, interval: &str) -> Option<MarketSnapshot> {
        self.map
            .get(&make_key(class, symbol, interval))
            .map(|entry| entry.value().clone())
    }

    /// Most recently fetched snapshot of a symbol across intervals
    pub fn latest_for(&self, class: StrategyClass, symbol: &str) -> Option<MarketSnapshot> {
        let prefix = format!(
            "md:{}:{}:",
            class.as_str().to_lowercase(),
            symbol.to_uppercase()
        );
        self.map
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .max_by_key(|entry| entry.value().fetched_at)
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Symbol;
    use chrono::{Duration, Utc};

    fn snapshot(class: StrategyClass, symbol: &str, interval: &str, funding: Option<f64>) -> MarketSnapshot {
        MarketSnapshot {
            symbol: Symbol::new(symbol),
            class,
            interval: interval.to_string(),
            candles: Vec::new(),
            funding_rate: funding,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_key_format() {
        let snap = snapshot(StrategyClass::Futures, "BTCUSDT", "1h", None);
        assert_eq!(SnapshotCache::key_for(&snap), "md:fut:BTCUSDT:1h");
    }

    #[test]
    fn test_last_value_wins() {
        let cache = SnapshotCache::new();
        cache.put(snapshot(StrategyClass::Futures, "BTCUSDT", "1h", Some(0.0001)));
        cache.put(snapshot(StrategyClass::Futures, "BTCUSDT", "1h", Some(0.0002)));

        assert_eq!(cache.len(), 1);
        let cached = cache.get(StrategyClass::Futures, "btcusdt", "1h").unwrap();
        assert_eq!(cached.funding_rate, Some(0.0002));
        assert!(cache.get(StrategyClass::Spot, "BTCUSDT", "1h").is_none());
    }

    #[test]
    fn test_latest_for_picks_newest_interval() {
        let cache = SnapshotCache::new();
        let mut older = snapshot(StrategyClass::Spot, "ETHUSDT", "4h", None);
        older.fetched_at = Utc::now() - Duration::hours(1);
        cache.put(older);
        cache.put(snapshot(StrategyClass::Spot, "ETHUSDT", "1h", None));

        let latest = cache.latest_for(StrategyClass::Spot, "ETHUSDT").unwrap();
        assert_eq!(latest.interval, "1h");
    }
}
