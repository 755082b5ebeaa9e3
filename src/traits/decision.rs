use crate::core::model::{FeatureVector, StrategyClass};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecisionError {
    #[error("no decision model loaded for {0}")]
    NoModel(StrategyClass),

    #[error("model produced a non-finite output")]
    NonFinite,
}

/// Black-box signal source. The sign of the output selects the side and
/// its magnitude feeds position sizing.
#[cfg_attr(test, mockall::automock)]
pub trait DecisionFunction: Send + Sync {
    fn predict(&self, class: StrategyClass, features: &FeatureVector) -> Result<f64, DecisionError>;
}
