pub mod policy;
pub mod screener;

pub use policy::{LinearPolicy, PolicyRegistry};
pub use screener::{DataGapError, Screener, ScreenerConfig};
