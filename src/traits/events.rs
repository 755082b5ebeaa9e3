use crate::core::events::TradingEvent;

/// Fire-and-forget destination for structured events. Implementations must
/// not fail the caller; delivery problems are theirs to log.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TradingEvent);
}
