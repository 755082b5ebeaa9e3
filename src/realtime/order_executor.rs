use crate::config::ClassProfile;
use crate::core::events::{NewOrder, OrderRef};
use crate::core::model::{ExecutionResult, OrderRequest, OrderResponse, StrategyClass};
use crate::oms::{Gateway, GatewayError};
use crate::risk::RiskEngine;
use crate::types::Size;
use futures_util::future::join_all;
use log::{info, warn};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const REASON_BELOW_FEE: &str = "return below fee";
pub const REASON_NON_POSITIVE_SIZE: &str = "non-positive size";
pub const REASON_BELOW_STEP: &str = "quantity below minimum increment";

/// Accepted / rejected counts since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorStats {
    pub accepted: u64,
    pub rejected: u64,
}

/// Sizes, brackets and submits order requests through the class gateway.
///
/// Rejections are values, never errors: the caller reads
/// [`ExecutionResult::reason`].
pub struct TradeExecutor {
    risk: Arc<RiskEngine>,
    spot: Arc<Gateway>,
    futures: Arc<Gateway>,
    spot_profile: ClassProfile,
    futures_profile: ClassProfile,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl TradeExecutor {
    pub fn new(
        risk: Arc<RiskEngine>,
        spot: Arc<Gateway>,
        futures: Arc<Gateway>,
        spot_profile: ClassProfile,
        futures_profile: ClassProfile,
    ) -> Self {
        Self {
            risk,
            spot,
            futures,
            spot_profile,
            futures_profile,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    fn gateway(&self, class: StrategyClass) -> &Gateway {
        match class {
            StrategyClass::Spot => &self.spot,
            StrategyClass::Futures => &self.futures,
        }
    }

    fn profile(&self, class: StrategyClass) -> &ClassProfile {
        match class {
            StrategyClass::Spot => &self.spot_profile,
            StrategyClass::Futures => &self.futures_profile,
        }
    }

    /// Execute one request against `nav`, the NAV of the request's class.
    pub async fn execute(&self, nav: Decimal, request: &OrderRequest) -> ExecutionResult {
        let result = self.try_execute(nav, request).await;
        if result.accepted {
            self.accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                "[{}] {} {} rejected: {}",
                request.class,
                request.side.as_str(),
                request.symbol,
                result.reason.as_deref().unwrap_or("unknown")
            );
        }
        result
    }

    async fn try_execute(&self, nav: Decimal, request: &OrderRequest) -> ExecutionResult {
        let edge = request.expected_return - request.fee_rate;
        if !(edge > 0.0) {
            return ExecutionResult::rejected(REASON_BELOW_FEE);
        }

        let multiplier = self.risk.cooldown_multiplier(request.class).await;
        let notional = self.risk.compute_position_size(
            nav,
            request.atr_pct,
            request.confidence,
            request.leverage,
        ) * multiplier;
        if notional <= Decimal::ZERO || !request.price.is_positive() {
            return ExecutionResult::rejected(REASON_NON_POSITIVE_SIZE);
        }

        let (stop_loss, take_profit) =
            self.risk
                .atr_sl_tp(request.price, request.atr_value, request.side);

        let quantity = Size::new(notional / request.price.value())
            .round_down_to_step(self.profile(request.class).qty_step);
        if !quantity.is_positive() {
            return ExecutionResult::rejected(REASON_BELOW_STEP);
        }

        let order = NewOrder::market(request.symbol.clone(), request.side, quantity)
            .with_client_order_id(format!("at-{}", uuid::Uuid::new_v4().simple()));

        match self.gateway(request.class).place_order(&order).await {
            Ok(mut response) => {
                response.insert("sl".into(), json!(stop_loss.value().normalize().to_string()));
                response.insert("tp".into(), json!(take_profit.value().normalize().to_string()));
                response.insert("size".into(), json!(notional.round_dp(8).normalize().to_string()));
                response.insert("quantity".into(), json!(quantity.to_string()));
                response.insert(
                    "confidence".into(),
                    json!(Decimal::from_f64(request.confidence)
                        .map(|c| c.round_dp(6).to_string())),
                );
                info!(
                    "[{}] {} {} qty {} notional {:.2} sl {} tp {}",
                    request.class,
                    request.side.as_str(),
                    request.symbol,
                    quantity,
                    notional,
                    stop_loss,
                    take_profit
                );
                ExecutionResult::accepted(response)
            }
            Err(err) => ExecutionResult::rejected(err.to_string()),
        }
    }

    /// One cancel per reference. Each outcome stands on its own.
    pub async fn cancel_orders(
        &self,
        class: StrategyClass,
        symbol: &str,
        orders: &[OrderRef],
    ) -> Vec<(OrderRef, Result<OrderResponse, GatewayError>)> {
        let gateway = self.gateway(class);
        let results = join_all(
            orders
                .iter()
                .map(|order| async move { (order.clone(), gateway.cancel_order(symbol, order).await) }),
        )
        .await;

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            warn!(
                "[{}] {} of {} cancels for {} failed",
                class,
                failed,
                results.len(),
                symbol
            );
        }
        results
    }
}
