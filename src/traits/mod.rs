pub mod account;
pub mod decision;
pub mod events;
pub mod venue;

pub use account::{NavError, NavSource};
pub use decision::{DecisionError, DecisionFunction};
pub use events::EventSink;
pub use venue::VenueClient;

#[cfg(test)]
pub use decision::MockDecisionFunction;
