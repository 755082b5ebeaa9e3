use crate::core::model::NavSnapshot;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavError {
    #[error("no account snapshot available")]
    Unavailable,

    #[error("account source failed: {0}")]
    Source(String),
}

/// Read-only account equity, polled once per cycle
#[async_trait]
pub trait NavSource: Send + Sync {
    async fn latest(&self) -> Result<NavSnapshot, NavError>;
}
