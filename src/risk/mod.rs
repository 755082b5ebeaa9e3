pub mod engine;
pub mod state;

pub use engine::{RiskConfig, RiskEngine};
pub use state::{PauseReason, RiskState, RiskStatus};
