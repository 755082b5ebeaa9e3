use crate::core::clock::Clock;
use crate::core::events::TradingEvent;
use crate::traits::EventSink;
use log::{info, warn};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

/// Log target the journal lines are written under. Route it with the
/// logger configuration to get a separate event stream.
pub const JOURNAL_TARGET: &str = "journal";

/// Writes every event as one JSON line
/// `{"type": .., "payload": .., "timestamp": ..}` through `log`.
#[derive(Debug)]
pub struct JournalSink {
    clock: Arc<dyn Clock>,
}

impl JournalSink {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn record(&self, event: &TradingEvent) -> Option<Value> {
        let mut line = match serde_json::to_value(event) {
            Ok(line) => line,
            Err(err) => {
                warn!("Dropping {} event: {}", event.kind(), err);
                return None;
            }
        };
        if let Some(fields) = line.as_object_mut() {
            fields.insert("timestamp".into(), json!(self.clock.now().to_rfc3339()));
        }
        Some(line)
    }
}

impl EventSink for JournalSink {
    fn emit(&self, event: TradingEvent) {
        if let Some(line) = self.record(&event) {
            info!(target: JOURNAL_TARGET, "{}", line);
        }
    }
}

/// Keeps events in memory, for tests and status dumps
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<TradingEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TradingEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(TradingEvent::kind).collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: TradingEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Fans one event out to several sinks
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: TradingEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}
