use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Liveness derived from the age of the last heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    /// Last beat older than the allowed age
    Stale,
    /// No beat yet
    Unknown,
}

/// Last heartbeat of the trading loop, readable from any task
#[derive(Debug)]
pub struct HeartbeatMonitor {
    last_beat_millis: AtomicI64,
    beats: AtomicU64,
    max_age: Duration,
}

impl HeartbeatMonitor {
    const NEVER: i64 = i64::MIN;

    pub fn new(max_age: Duration) -> Self {
        Self {
            last_beat_millis: AtomicI64::new(Self::NEVER),
            beats: AtomicU64::new(0),
            max_age,
        }
    }

    pub fn beat(&self, at: DateTime<Utc>) {
        self.last_beat_millis
            .store(at.timestamp_millis(), Ordering::SeqCst);
        self.beats.fetch_add(1, Ordering::Relaxed);
    }

    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }

    pub fn last_beat(&self) -> Option<DateTime<Utc>> {
        match self.last_beat_millis.load(Ordering::SeqCst) {
            Self::NEVER => None,
            millis => DateTime::from_timestamp_millis(millis),
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> HealthStatus {
        match self.last_beat() {
            None => HealthStatus::Unknown,
            Some(last) if now - last > self.max_age => HealthStatus::Stale,
            Some(_) => HealthStatus::Healthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_beat_age() {
        let start = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let monitor = HeartbeatMonitor::new(Duration::seconds(90));
        assert_eq!(monitor.status(start), HealthStatus::Unknown);

        monitor.beat(start);
        assert_eq!(monitor.status(start + Duration::seconds(90)), HealthStatus::Healthy);
        assert_eq!(monitor.status(start + Duration::seconds(91)), HealthStatus::Stale);
        assert_eq!(monitor.beats(), 1);
        assert_eq!(monitor.last_beat(), Some(start));
    }
}
