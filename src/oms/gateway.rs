use crate::core::events::{NewOrder, OrderRef};
use crate::core::model::{Candle, OrderResponse};
use crate::exchanges::error::VenueError;
use crate::oms::rate_limiter::RateLimiter;
use crate::oms::retry::RetryPolicy;
use crate::traits::VenueClient;
use log::{debug, error, warn};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Outcome of a gateway call that did not succeed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// The venue refused the request. Never retried.
    #[error("{operation} rejected: {source}")]
    Rejected {
        operation: String,
        source: VenueError,
    },

    /// Transient failures used up the retry budget
    #[error("gateway unavailable: {operation} failed after {attempts} attempts: {source}")]
    Unavailable {
        operation: String,
        attempts: u32,
        source: VenueError,
    },
}

impl GatewayError {
    pub fn venue_error(&self) -> &VenueError {
        match self {
            GatewayError::Rejected { source, .. } | GatewayError::Unavailable { source, .. } => {
                source
            }
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, GatewayError::Unavailable { .. })
    }
}

/// Counters for calls that went through one gateway
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    pub physical_calls: u64,
    pub retries: u64,
    pub rejected: u64,
    pub unavailable: u64,
}

#[derive(Debug, Default)]
struct Counters {
    physical_calls: AtomicU64,
    retries: AtomicU64,
    rejected: AtomicU64,
    unavailable: AtomicU64,
}

/// Rate-limited, retrying wrapper around one venue.
///
/// Every attempt, including retries, first claims a limiter slot, so the
/// spacing holds across all callers sharing this instance. Business errors
/// surface immediately as [`GatewayError::Rejected`]; transient ones are
/// retried per the [`RetryPolicy`] and end as [`GatewayError::Unavailable`].
pub struct Gateway {
    name: String,
    venue: Arc<dyn VenueClient>,
    limiter: RateLimiter,
    policy: RetryPolicy,
    counters: Counters,
}

impl Gateway {
    pub fn new(
        name: impl Into<String>,
        venue: Arc<dyn VenueClient>,
        min_interval: Duration,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            venue,
            limiter: RateLimiter::new(min_interval),
            policy,
            counters: Counters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            physical_calls: self.counters.physical_calls.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            unavailable: self.counters.unavailable.load(Ordering::Relaxed),
        }
    }

    /// Runs `attempt` under the limiter and retry policy.
    /// `operation` only labels logs and errors.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, VenueError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            self.limiter.acquire().await;
            self.counters.physical_calls.fetch_add(1, Ordering::Relaxed);

            let err = match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!("[{}] {} rejected: {}", self.name, operation, err);
                return Err(GatewayError::Rejected {
                    operation: operation.to_string(),
                    source: err,
                });
            }

            if attempts >= max_attempts {
                self.counters.unavailable.fetch_add(1, Ordering::Relaxed);
                error!(
                    "[{}] {} failed after {} attempts: {}",
                    self.name, operation, attempts, err
                );
                return Err(GatewayError::Unavailable {
                    operation: operation.to_string(),
                    attempts,
                    source: err,
                });
            }

            let mut delay = self.policy.delay_for(attempts - 1);
            if let VenueError::RateLimited { retry_after_ms } = err {
                delay = delay.max(Duration::from_millis(retry_after_ms));
            }
            self.counters.retries.fetch_add(1, Ordering::Relaxed);
            warn!(
                "[{}] {} failed (attempt {}/{}), retrying in {:?}: {}",
                self.name, operation, attempts, max_attempts, delay, err
            );
            tokio::time::sleep(delay).await;
        }
    }

    pub async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>, GatewayError> {
        debug!("[{}] klines {} {} x{}", self.name, symbol, interval, limit);
        self.call("klines", || self.venue.klines(symbol, interval, limit))
            .await
    }

    pub async fn funding_rate(&self, symbol: &str) -> Result<Option<f64>, GatewayError> {
        self.call("funding_rate", || self.venue.funding_rate(symbol))
            .await
    }

    pub async fn place_order(&self, order: &NewOrder) -> Result<OrderResponse, GatewayError> {
        self.call("place_order", || self.venue.place_order(order))
            .await
    }

    pub async fn cancel_order(
        &self,
        symbol: &str,
        order: &OrderRef,
    ) -> Result<OrderResponse, GatewayError> {
        self.call("cancel_order", || self.venue.cancel_order(symbol, order))
            .await
    }

    pub async fn account_equity(&self) -> Result<Decimal, GatewayError> {
        self.call("account_equity", || self.venue.account_equity())
            .await
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("name", &self.name)
            .field("limiter", &self.limiter)
            .field("policy", &self.policy)
            .finish()
    }
}
