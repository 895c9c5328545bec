//! Shipment synchronisation engine.
//!
//! A sync fetches a fresh provider snapshot first and only then opens a
//! transaction that deletes the shipment's owned graph, updates its scalars
//! and recreates the graph from the snapshot. Provider failures therefore
//! never touch stored data, and storage failures roll the whole rewrite back.
//! Syncs of the same shipment are serialised in-process.

use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt as _;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::Error;
use crate::domain::Shipment;
use crate::domain::ports::{
    GraphWork, GraphWriteOutcome, ShipmentRepository, ShipmentRepositoryError, SyncStats,
    TrackingProvider, TrackingProviderError,
};

mod graph;
mod locks;

pub(crate) use graph::write_snapshot_graph;
use locks::ShipmentLocks;

/// Message shown for shipments that are missing or owned by someone else.
pub const ACCESS_DENIED_MESSAGE: &str = "shipment not found or access denied";

/// Failures raised while syncing one shipment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The shipment does not exist.
    #[error("shipment {shipment_id} not found")]
    NotFound { shipment_id: Uuid },
    /// The caller does not track the shipment.
    #[error("{ACCESS_DENIED_MESSAGE}")]
    AccessDenied { user_id: Uuid, shipment_id: Uuid },
    /// The provider call failed; nothing was written.
    #[error(transparent)]
    Provider(#[from] TrackingProviderError),
    /// Persistence failed; the transaction was rolled back.
    #[error(transparent)]
    Storage(#[from] ShipmentRepositoryError),
}

impl From<SyncError> for Error {
    fn from(value: SyncError) -> Self {
        match value {
            SyncError::NotFound { .. } | SyncError::AccessDenied { .. } => {
                Error::not_found(ACCESS_DENIED_MESSAGE)
            }
            SyncError::Provider(err) => Error::service_unavailable(err.to_string()),
            SyncError::Storage(err) => Error::service_unavailable(err.to_string()),
        }
    }
}

/// Result of a system-initiated sync.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The graph was replaced.
    Synced { shipment: Shipment, stats: SyncStats },
    /// The shipment is delivered and was left untouched.
    SkippedDelivered { shipment: Shipment },
}

/// Replaces shipment graphs with fresh provider snapshots.
pub struct SyncEngine {
    repository: Arc<dyn ShipmentRepository>,
    provider: Arc<dyn TrackingProvider>,
    locks: ShipmentLocks,
}

impl SyncEngine {
    /// Build an engine over the given ports.
    pub fn new(
        repository: Arc<dyn ShipmentRepository>,
        provider: Arc<dyn TrackingProvider>,
    ) -> Self {
        Self {
            repository,
            provider,
            locks: ShipmentLocks::default(),
        }
    }

    /// Sync a shipment without an ownership check.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] for unknown shipments and
    /// [`SyncError::Provider`] / [`SyncError::Storage`] when the rewrite fails.
    pub async fn sync(&self, shipment_id: Uuid) -> Result<Shipment, SyncError> {
        let _guard = self.locks.lock(shipment_id).await;
        let shipment = self.load(shipment_id).await?;
        let outcome = self.replace_graph(shipment).await?;
        Ok(outcome.shipment)
    }

    /// Sync a shipment on behalf of a user who must track it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::AccessDenied`] when the user does not track the
    /// shipment, whether or not it exists.
    pub async fn refresh(&self, user_id: Uuid, shipment_id: Uuid) -> Result<Shipment, SyncError> {
        if !self
            .repository
            .user_owns_shipment(user_id, shipment_id)
            .await?
        {
            debug!(%user_id, %shipment_id, "refresh rejected: not owner");
            return Err(SyncError::AccessDenied {
                user_id,
                shipment_id,
            });
        }
        self.sync(shipment_id).await
    }

    /// Background variant: no ownership check, delivered shipments are skipped.
    ///
    /// # Errors
    ///
    /// Same as [`Self::sync`].
    pub async fn system_sync(&self, shipment_id: Uuid) -> Result<SyncOutcome, SyncError> {
        let _guard = self.locks.lock(shipment_id).await;
        let shipment = self.load(shipment_id).await?;
        if shipment.is_delivered() {
            debug!(%shipment_id, "skipping delivered shipment");
            return Ok(SyncOutcome::SkippedDelivered { shipment });
        }
        let GraphWriteOutcome { shipment, stats } = self.replace_graph(shipment).await?;
        Ok(SyncOutcome::Synced { shipment, stats })
    }

    /// Refresh only the shipment's scalar fields, leaving its graph alone.
    ///
    /// # Errors
    ///
    /// Same as [`Self::sync`].
    pub async fn resync_scalars(&self, shipment_id: Uuid) -> Result<Shipment, SyncError> {
        let _guard = self.locks.lock(shipment_id).await;
        let shipment = self.load(shipment_id).await?;
        let snapshot = self
            .provider
            .fetch_shipment(&shipment.tracking_request())
            .await?;
        let scalars = snapshot.metadata.scalars();

        let work = GraphWork::new(move |writer| {
            async move {
                let shipment = writer
                    .update_shipment_scalars(shipment_id, &scalars)
                    .await?;
                Ok::<_, ShipmentRepositoryError>(GraphWriteOutcome {
                    shipment,
                    stats: SyncStats::default(),
                })
            }
            .boxed()
        });
        let outcome = self.repository.run_in_transaction(work).await?;
        Ok(outcome.shipment)
    }

    async fn load(&self, shipment_id: Uuid) -> Result<Shipment, SyncError> {
        self.repository
            .find_shipment(shipment_id)
            .await?
            .ok_or(SyncError::NotFound { shipment_id })
    }

    async fn replace_graph(&self, shipment: Shipment) -> Result<GraphWriteOutcome, SyncError> {
        let started = Instant::now();
        let shipment_id = shipment.id;
        info!(
            %shipment_id,
            shipment_number = %shipment.shipment_number,
            "shipment sync started"
        );

        let snapshot = match self
            .provider
            .fetch_shipment(&shipment.tracking_request())
            .await
        {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%shipment_id, kind = error.kind(), %error, "provider fetch failed; sync aborted");
                return Err(error.into());
            }
        };

        let work = GraphWork::new(move |writer| {
            async move {
                writer.delete_all_related(shipment_id).await?;
                let shipment = writer
                    .update_shipment_scalars(shipment_id, &snapshot.metadata.scalars())
                    .await?;
                let stats = write_snapshot_graph(writer, shipment_id, &snapshot).await?;
                Ok::<_, ShipmentRepositoryError>(GraphWriteOutcome { shipment, stats })
            }
            .boxed()
        });

        match self.repository.run_in_transaction(work).await {
            Ok(outcome) => {
                info!(
                    %shipment_id,
                    status = %outcome.shipment.shipping_status,
                    containers = outcome.stats.containers,
                    container_events = outcome.stats.container_events,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "shipment sync finished"
                );
                Ok(outcome)
            }
            Err(error) => {
                warn!(%shipment_id, kind = error.kind(), %error, "shipment sync rolled back");
                Err(error.into())
            }
        }
    }
}

#[cfg(test)]
mod tests;
