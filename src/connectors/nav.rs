use crate::core::model::NavSnapshot;
use crate::oms::Gateway;
use crate::traits::{NavError, NavSource};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use tokio::sync::RwLock;

/// NAV source holding the latest account snapshot pushed by an external writer
#[derive(Debug, Default)]
pub struct SharedNavSource {
    latest: RwLock<Option<NavSnapshot>>,
}

impl SharedNavSource {
    pub fn new(initial: Option<NavSnapshot>) -> Self {
        Self {
            latest: RwLock::new(initial),
        }
    }

    pub async fn set(&self, snapshot: NavSnapshot) {
        *self.latest.write().await = Some(snapshot);
    }

    pub async fn clear(&self) {
        *self.latest.write().await = None;
    }
}

#[async_trait]
impl NavSource for SharedNavSource {
    async fn latest(&self) -> Result<NavSnapshot, NavError> {
        (*self.latest.read().await).ok_or(NavError::Unavailable)
    }
}

/// NAV read from the venues' accounts on every poll, through the same
/// gateways as orders. Spot equity is `nav_a`, futures margin balance `nav_b`.
#[derive(Debug)]
pub struct GatewayNavSource {
    spot: Arc<Gateway>,
    futures: Arc<Gateway>,
}

impl GatewayNavSource {
    pub fn new(spot: Arc<Gateway>, futures: Arc<Gateway>) -> Self {
        Self { spot, futures }
    }
}

#[async_trait]
impl NavSource for GatewayNavSource {
    async fn latest(&self) -> Result<NavSnapshot, NavError> {
        let (nav_a, nav_b) = tokio::try_join!(self.spot.account_equity(), self.futures.account_equity())
            .map_err(|e| NavError::Source(e.to_string()))?;
        debug!("account NAV spot={} futures={}", nav_a, nav_b);
        Ok(NavSnapshot::new(nav_a, nav_b))
    }
}
