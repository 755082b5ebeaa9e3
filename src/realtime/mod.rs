pub mod event_loop;
pub mod order_executor;
pub mod signal_generator;

pub use event_loop::{ClassReport, CycleReport, SchedulerConfig, SchedulerParts, TradingScheduler};
pub use order_executor::{ExecutorStats, TradeExecutor};
pub use signal_generator::{SignalError, SignalGenerator};
