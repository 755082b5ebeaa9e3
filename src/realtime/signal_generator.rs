use crate::config::ClassProfile;
use crate::core::events::OrderSide;
use crate::core::model::{OrderRequest, ScoredCandidate, StrategyClass};
use crate::traits::{DecisionError, DecisionFunction};
use crate::types::Price;
use log::debug;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error("candidate {field} is not a usable price")]
    InvalidPrice { field: &'static str },
}

/// Turns scored candidates into order requests by asking the decision
/// function for a signed confidence.
pub struct SignalGenerator {
    decision: Arc<dyn DecisionFunction>,
}

impl SignalGenerator {
    pub fn new(decision: Arc<dyn DecisionFunction>) -> Self {
        Self { decision }
    }

    /// Side comes from the sign of the model output, sizing confidence from
    /// its magnitude.
    pub fn build_request(
        &self,
        class: StrategyClass,
        candidate: &ScoredCandidate,
        profile: &ClassProfile,
    ) -> Result<OrderRequest, SignalError> {
        let raw = self.decision.predict(class, &candidate.features())?;
        if !raw.is_finite() {
            return Err(DecisionError::NonFinite.into());
        }

        let price = Price::from_f64(candidate.last_price)
            .filter(Price::is_positive)
            .ok_or(SignalError::InvalidPrice { field: "last_price" })?;
        let atr_value = Price::from_f64(candidate.atr_value)
            .ok_or(SignalError::InvalidPrice { field: "atr_value" })?;

        let side = OrderSide::from_confidence(raw);
        debug!(
            "[{}] {} decision {:.4} -> {}",
            class,
            candidate.symbol,
            raw,
            side.as_str()
        );

        Ok(OrderRequest {
            symbol: candidate.symbol.clone(),
            side,
            class,
            price,
            atr_value,
            atr_pct: candidate.atr_pct,
            confidence: raw.abs(),
            expected_return: candidate.expected_return,
            fee_rate: profile.fee_rate,
            leverage: profile.leverage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Action;
    use crate::traits::MockDecisionFunction;
    use crate::types::Symbol;
    use rust_decimal_macros::dec;
    use std::path::PathBuf;
    use std::time::Duration;

    fn profile() -> ClassProfile {
        ClassProfile {
            class: StrategyClass::Futures,
            fee_rate: 0.0004,
            leverage: dec!(3),
            daily_stop_pct: -0.05,
            qty_step: dec!(0.001),
            min_interval: Duration::from_millis(100),
            policy_path: PathBuf::from("fut.json"),
            default_nav: dec!(1000),
        }
    }

    fn candidate(last_price: f64) -> ScoredCandidate {
        ScoredCandidate {
            symbol: Symbol::new("ETHUSDT"),
            score: 1.2,
            expected_return: 0.01,
            atr_value: 30.0,
            atr_pct: 1.5,
            sharpe: 0.8,
            sortino: 1.1,
            risk_reward_ratio: 2.0,
            last_price,
            action: Action::Buy,
        }
    }

    #[test]
    fn test_negative_output_sells() {
        let mut decision = MockDecisionFunction::new();
        decision
            .expect_predict()
            .withf(|class, _| *class == StrategyClass::Futures)
            .returning(|_, _| Ok(-0.6));

        let generator = SignalGenerator::new(Arc::new(decision));
        let request = generator
            .build_request(StrategyClass::Futures, &candidate(2000.0), &profile())
            .unwrap();

        assert_eq!(request.side, OrderSide::Sell);
        assert!((request.confidence - 0.6).abs() < 1e-12);
        assert_eq!(request.leverage, dec!(3));
        assert_eq!(request.price, Price::new(dec!(2000)));
    }

    #[test]
    fn test_model_error_propagates() {
        let mut decision = MockDecisionFunction::new();
        decision
            .expect_predict()
            .returning(|class, _| Err(DecisionError::NoModel(class)));

        let generator = SignalGenerator::new(Arc::new(decision));
        let err = generator
            .build_request(StrategyClass::Spot, &candidate(2000.0), &profile())
            .unwrap_err();
        assert_eq!(err, SignalError::Decision(DecisionError::NoModel(StrategyClass::Spot)));
    }

    #[test]
    fn test_zero_price_is_refused() {
        let mut decision = MockDecisionFunction::new();
        decision.expect_predict().returning(|_, _| Ok(0.5));

        let generator = SignalGenerator::new(Arc::new(decision));
        let err = generator
            .build_request(StrategyClass::Spot, &candidate(0.0), &profile())
            .unwrap_err();
        assert_eq!(err, SignalError::InvalidPrice { field: "last_price" });
    }
}
