use crate::core::clock::Clock;
use crate::core::model::{MarketSnapshot, StrategyClass};
use crate::market_data::cache::SnapshotCache;
use crate::oms::{Gateway, GatewayError};
use crate::types::Symbol;
use futures_util::future::join_all;
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Symbols to collect, per strategy class, in configured order
pub type Universe = BTreeMap<StrategyClass, Vec<Symbol>>;

/// Snapshots of one cycle, keyed by class and symbol
pub type SnapshotMap = BTreeMap<(StrategyClass, Symbol), MarketSnapshot>;

/// Fetches candles (and funding for derivatives) for the whole universe.
///
/// All symbols are requested at once; the per-class gateways decide how the
/// physical calls are spaced. A failing symbol is logged and left out.
pub struct MarketDataCollector {
    spot: Arc<Gateway>,
    futures: Arc<Gateway>,
    cache: Arc<SnapshotCache>,
    clock: Arc<dyn Clock>,
    interval: String,
    limit: u32,
}

impl MarketDataCollector {
    pub fn new(
        spot: Arc<Gateway>,
        futures: Arc<Gateway>,
        cache: Arc<SnapshotCache>,
        clock: Arc<dyn Clock>,
        interval: impl Into<String>,
        limit: u32,
    ) -> Self {
        Self {
            spot,
            futures,
            cache,
            clock,
            interval: interval.into(),
            limit,
        }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    fn gateway(&self, class: StrategyClass) -> &Gateway {
        match class {
            StrategyClass::Spot => &self.spot,
            StrategyClass::Futures => &self.futures,
        }
    }

    /// One cycle's snapshots. Never fails as a whole.
    pub async fn collect_all(&self, universe: &Universe) -> SnapshotMap {
        let requests = universe
            .iter()
            .flat_map(|(class, symbols)| symbols.iter().map(move |symbol| (*class, symbol)));

        let results = join_all(requests.map(|(class, symbol)| async move {
            (class, symbol, self.collect_symbol(class, symbol).await)
        }))
        .await;

        let requested = results.len();
        let mut snapshots = SnapshotMap::new();
        for (class, symbol, result) in results {
            match result {
                Ok(snapshot) => {
                    self.cache.put(snapshot.clone());
                    snapshots.insert((class, symbol.clone()), snapshot);
                }
                Err(err) => warn!("[{}] market data for {} failed: {}", class, symbol, err),
            }
        }

        info!(
            "Collected {}/{} snapshots ({})",
            snapshots.len(),
            requested,
            self.interval
        );
        snapshots
    }

    /// Candles plus, for derivatives, the funding rate. A funding failure
    /// does not lose the candles; the rate is reported as unknown.
    pub async fn collect_symbol(
        &self,
        class: StrategyClass,
        symbol: &Symbol,
    ) -> Result<MarketSnapshot, GatewayError> {
        let gateway = self.gateway(class);
        let candles = gateway
            .klines(symbol.as_str(), &self.interval, self.limit)
            .await?;

        let funding_rate = if class.is_derivatives() {
            match gateway.funding_rate(symbol.as_str()).await {
                Ok(rate) => rate,
                Err(err) => {
                    warn!("[{}] funding rate for {} unavailable: {}", class, symbol, err);
                    None
                }
            }
        } else {
            None
        };

        Ok(MarketSnapshot {
            symbol: symbol.clone(),
            class,
            interval: self.interval.clone(),
            candles,
            funding_rate,
            fetched_at: self.clock.now(),
        })
    }
}
