pub mod settings;

pub use settings::{ClassProfile, ConfigError, Settings, TradingMode};
