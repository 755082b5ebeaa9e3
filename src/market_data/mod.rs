pub mod cache;
pub mod collector;

pub use cache::SnapshotCache;
pub use collector::{MarketDataCollector, SnapshotMap, Universe};
