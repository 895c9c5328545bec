//! Background refresh of every non-delivered shipment.
//!
//! A run lists candidates, pre-fills a closed queue with them and drains it
//! with a fixed number of workers. Each worker waits on admission control
//! before calling the sync engine, so the provider never sees more than the
//! configured rate. Per-shipment failures are collected into the
//! [`RunSummary`] and never stop the batch.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::future::join_all;
use mockable::Clock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::Shipment;
use crate::domain::ports::{AdmissionControl, ShipmentRepository, ShipmentRepositoryError};
use crate::domain::sync_engine::{SyncEngine, SyncOutcome};

mod task;

pub use task::{REFRESH_TASK_NAME, ShipmentRefreshTask};

/// Tunables for refresh runs. Adjustable between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Delay between runs after the immediate startup run.
    pub interval: Duration,
    /// Concurrent workers per run.
    pub workers: usize,
    /// Batch cap; `None` refreshes every candidate.
    pub max_shipments_per_run: Option<usize>,
    /// Shipments updated more recently than this are left alone.
    pub freshness_window: Option<Duration>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3 * 60 * 60),
            workers: 5,
            max_shipments_per_run: None,
            freshness_window: Some(Duration::from_secs(30 * 60)),
        }
    }
}

/// Outcome of one shipment within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshStatus {
    Succeeded,
    Failed { message: String },
    Skipped,
}

/// One shipment's result and how long it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentRefreshResult {
    pub shipment_id: Uuid,
    pub shipment_number: String,
    pub status: RefreshStatus,
    pub elapsed: Duration,
    pub finished_at: DateTime<Utc>,
}

/// A failed shipment as reported in the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshFailure {
    pub shipment_id: Uuid,
    pub shipment_number: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

/// Aggregated result of one refresh run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<RefreshFailure>,
}

impl RunSummary {
    fn collect(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        results: &[ShipmentRefreshResult],
    ) -> Self {
        let mut summary = Self {
            started_at,
            finished_at,
            total: results.len(),
            succeeded: 0,
            failed: 0,
            skipped: 0,
            errors: Vec::new(),
        };
        for result in results {
            match &result.status {
                RefreshStatus::Succeeded => summary.succeeded += 1,
                RefreshStatus::Skipped => summary.skipped += 1,
                RefreshStatus::Failed { message } => {
                    summary.failed += 1;
                    summary.errors.push(RefreshFailure {
                        shipment_id: result.shipment_id,
                        shipment_number: result.shipment_number.clone(),
                        message: message.clone(),
                        occurred_at: result.finished_at,
                    });
                }
            }
        }
        summary
    }
}

/// Collaborators a refresh run drives.
#[derive(Clone)]
pub struct RefreshOrchestratorPorts {
    pub engine: Arc<SyncEngine>,
    pub repository: Arc<dyn ShipmentRepository>,
    pub admission: Arc<dyn AdmissionControl>,
}

impl RefreshOrchestratorPorts {
    pub fn new(
        engine: Arc<SyncEngine>,
        repository: Arc<dyn ShipmentRepository>,
        admission: Arc<dyn AdmissionControl>,
    ) -> Self {
        Self {
            engine,
            repository,
            admission,
        }
    }
}

/// Selects stale shipments and refreshes them through a worker pool.
pub struct RefreshOrchestrator {
    ports: RefreshOrchestratorPorts,
    clock: Arc<dyn Clock>,
    config: Mutex<RefreshConfig>,
    last_summary: Mutex<Option<RunSummary>>,
}

type Queue = tokio::sync::Mutex<mpsc::UnboundedReceiver<Shipment>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RefreshOrchestrator {
    pub fn new(
        ports: RefreshOrchestratorPorts,
        clock: Arc<dyn Clock>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            ports,
            clock,
            config: Mutex::new(config),
            last_summary: Mutex::new(None),
        }
    }

    pub fn config(&self) -> RefreshConfig {
        lock(&self.config).clone()
    }

    /// Replace the configuration. Takes effect from the next run.
    pub fn update_config(&self, config: RefreshConfig) {
        info!(?config, "refresh configuration updated");
        *lock(&self.config) = config;
    }

    /// Summary of the most recent completed run.
    pub fn last_summary(&self) -> Option<RunSummary> {
        lock(&self.last_summary).clone()
    }

    /// Refresh every eligible shipment once.
    ///
    /// Cancellation stops workers at their next admission wait; the current
    /// and remaining shipments are reported as skipped.
    ///
    /// # Errors
    ///
    /// Only listing the candidates can fail the run as a whole.
    pub async fn refresh_all(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, ShipmentRepositoryError> {
        let config = self.config();
        let started_at = self.clock.utc();
        let updated_before = config
            .freshness_window
            .and_then(|window| TimeDelta::from_std(window).ok())
            .map(|window| started_at - window);

        let candidates = self
            .ports
            .repository
            .list_refresh_candidates(updated_before, config.max_shipments_per_run)
            .await?;
        let workers = config.workers.max(1).min(candidates.len().max(1));
        info!(
            candidates = candidates.len(),
            workers,
            ?updated_before,
            "refresh run started"
        );

        let (sender, receiver) = mpsc::unbounded_channel();
        for shipment in candidates {
            if sender.send(shipment).is_err() {
                break;
            }
        }
        drop(sender);
        let queue: Queue = tokio::sync::Mutex::new(receiver);

        let results: Vec<ShipmentRefreshResult> =
            join_all((0..workers).map(|worker| self.work(worker, &queue, cancel)))
                .await
                .into_iter()
                .flatten()
                .collect();

        let summary = RunSummary::collect(started_at, self.clock.utc(), &results);
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            available_tokens = self.ports.admission.available_tokens(),
            "refresh run finished"
        );
        *lock(&self.last_summary) = Some(summary.clone());
        Ok(summary)
    }

    async fn work(
        &self,
        worker: usize,
        queue: &Queue,
        cancel: &CancellationToken,
    ) -> Vec<ShipmentRefreshResult> {
        let mut results = Vec::new();
        loop {
            let next = queue.lock().await.recv().await;
            let Some(shipment) = next else { break };
            let started = Instant::now();

            let status = if cancel.is_cancelled()
                || self.ports.admission.wait(cancel).await.is_err()
            {
                debug!(worker, shipment_id = %shipment.id, "refresh skipped: cancelled");
                RefreshStatus::Skipped
            } else {
                self.refresh_one(worker, &shipment).await
            };

            results.push(ShipmentRefreshResult {
                shipment_id: shipment.id,
                shipment_number: shipment.shipment_number,
                status,
                elapsed: started.elapsed(),
                finished_at: self.clock.utc(),
            });
        }
        results
    }

    async fn refresh_one(&self, worker: usize, shipment: &Shipment) -> RefreshStatus {
        match self.ports.engine.system_sync(shipment.id).await {
            Ok(SyncOutcome::Synced { .. }) => RefreshStatus::Succeeded,
            Ok(SyncOutcome::SkippedDelivered { .. }) => RefreshStatus::Skipped,
            Err(error) => {
                warn!(
                    worker,
                    shipment_id = %shipment.id,
                    shipment_number = %shipment.shipment_number,
                    %error,
                    "shipment refresh failed"
                );
                RefreshStatus::Failed {
                    message: error.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
