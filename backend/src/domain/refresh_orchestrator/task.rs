//! Scheduler task that runs refreshes on a fixed interval.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::RefreshOrchestrator;
use crate::domain::scheduler::ScheduledTask;

pub const REFRESH_TASK_NAME: &str = "shipment_refresh";

/// Runs one refresh immediately, then one per configured interval.
pub struct ShipmentRefreshTask {
    orchestrator: Arc<RefreshOrchestrator>,
}

impl ShipmentRefreshTask {
    pub fn new(orchestrator: Arc<RefreshOrchestrator>) -> Self {
        Self { orchestrator }
    }

    async fn run_once(&self, cancel: &CancellationToken) {
        if let Err(error) = self.orchestrator.refresh_all(cancel).await {
            warn!(%error, "refresh run could not list shipments");
        }
    }
}

#[async_trait]
impl ScheduledTask for ShipmentRefreshTask {
    fn name(&self) -> &str {
        REFRESH_TASK_NAME
    }

    async fn start(&self, cancel: CancellationToken) {
        self.run_once(&cancel).await;
        loop {
            let interval = self.orchestrator.config().interval;
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => self.run_once(&cancel).await,
            }
        }
        info!(task = REFRESH_TASK_NAME, "refresh loop exited");
    }
}
