pub mod statistics;
pub mod volatility;

pub use statistics::{mean, sample_std, sharpe, simple_returns, sortino, tail};
pub use volatility::{atr, true_range, WilderAtr};
