pub mod health;
pub mod journal;

pub use health::{HealthStatus, HeartbeatMonitor};
pub use journal::{FanoutSink, JournalSink, MemorySink, JOURNAL_TARGET};
