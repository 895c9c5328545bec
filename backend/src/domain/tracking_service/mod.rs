//! User-facing shipment tracking operations.
//!
//! Adding a shipment either links the caller to an existing row and resyncs
//! it, or fetches a first snapshot and creates the shipment, the user link
//! and the whole graph in one transaction.

use std::sync::Arc;

use futures_util::FutureExt as _;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::ports::{
    GraphWork, GraphWriteOutcome, ShipmentRepository, ShipmentRepositoryError, TrackingProvider,
    TrackingProviderError, TrackingRequest,
};
use crate::domain::sync_engine::{ACCESS_DENIED_MESSAGE, SyncEngine, write_snapshot_graph};
use crate::domain::{Error, NewShipment, Shipment, ShipmentDetails, ShipmentSnapshot};

mod validation;

pub use validation::{AddShipmentRequest, ShipmentValidationError};
use validation::ValidatedRequest;

/// Adds shipments for users and serves their detail views.
#[derive(Clone)]
pub struct ShipmentTrackingService {
    repository: Arc<dyn ShipmentRepository>,
    provider: Arc<dyn TrackingProvider>,
    engine: Arc<SyncEngine>,
}

fn fallback(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_owned()
    } else {
        value.to_owned()
    }
}

fn new_shipment(request: &ValidatedRequest, snapshot: &ShipmentSnapshot) -> NewShipment {
    let metadata = &snapshot.metadata;
    NewShipment {
        shipment_number: fallback(&metadata.shipment_number, &request.shipment_number),
        shipment_type: fallback(&metadata.shipment_type, &request.shipment_type),
        sealine_code: fallback(&metadata.sealine, &request.sealine_code),
        sealine_name: metadata.sealine_name.clone(),
        shipping_status: metadata.shipping_status.clone(),
        warnings: metadata.warnings.clone(),
    }
}

impl ShipmentTrackingService {
    pub fn new(
        repository: Arc<dyn ShipmentRepository>,
        provider: Arc<dyn TrackingProvider>,
        engine: Arc<SyncEngine>,
    ) -> Self {
        Self {
            repository,
            provider,
            engine,
        }
    }

    fn map_repository_error(error: ShipmentRepositoryError) -> Error {
        match error {
            ShipmentRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("shipment repository unavailable: {message}"))
            }
            ShipmentRepositoryError::Conflict { message } => Error::conflict(message),
            other => Error::internal(other.to_string()),
        }
    }

    fn map_provider_error(error: TrackingProviderError) -> Error {
        Error::service_unavailable(error.to_string())
    }

    /// Start tracking a shipment for `user_id`.
    ///
    /// # Errors
    ///
    /// `invalid_request` for malformed input, `conflict` when the user already
    /// tracks the number and `service_unavailable` when the provider or the
    /// store fails.
    pub async fn add_shipment(
        &self,
        user_id: Uuid,
        request: AddShipmentRequest,
    ) -> Result<Shipment, Error> {
        let request = request.validate()?;
        if self
            .repository
            .user_tracks_number(user_id, &request.shipment_number)
            .await
            .map_err(Self::map_repository_error)?
        {
            return Err(Error::conflict(format!(
                "shipment {} is already tracked",
                request.shipment_number
            )));
        }

        let existing = self
            .repository
            .find_shipment_by_number(&request.shipment_number)
            .await
            .map_err(Self::map_repository_error)?;
        match existing {
            Some(shipment) => self.link_existing(user_id, shipment, request).await,
            None => self.create_tracked(user_id, request).await,
        }
    }

    async fn link_existing(
        &self,
        user_id: Uuid,
        shipment: Shipment,
        request: ValidatedRequest,
    ) -> Result<Shipment, Error> {
        let shipment_id = shipment.id;
        let annotations = request.annotations;
        let work = GraphWork::new(move |writer| {
            async move {
                writer.link_user(user_id, shipment_id, &annotations).await?;
                Ok::<_, ShipmentRepositoryError>(GraphWriteOutcome {
                    shipment,
                    stats: Default::default(),
                })
            }
            .boxed()
        });
        self.repository
            .run_in_transaction(work)
            .await
            .map_err(Self::map_repository_error)?;
        debug!(%user_id, %shipment_id, "user linked to existing shipment");

        Ok(self.engine.sync(shipment_id).await?)
    }

    async fn create_tracked(
        &self,
        user_id: Uuid,
        request: ValidatedRequest,
    ) -> Result<Shipment, Error> {
        let snapshot = self
            .provider
            .fetch_shipment(&TrackingRequest {
                shipment_number: request.shipment_number.clone(),
                shipment_type: request.shipment_type.clone(),
                sealine: request.sealine_code.clone(),
            })
            .await
            .map_err(Self::map_provider_error)?;
        let row = new_shipment(&request, &snapshot);
        let annotations = request.annotations;

        let work = GraphWork::new(move |writer| {
            async move {
                let shipment = writer.create_shipment(&row).await?;
                writer.link_user(user_id, shipment.id, &annotations).await?;
                let stats = write_snapshot_graph(writer, shipment.id, &snapshot).await?;
                Ok::<_, ShipmentRepositoryError>(GraphWriteOutcome { shipment, stats })
            }
            .boxed()
        });
        let outcome = self
            .repository
            .run_in_transaction(work)
            .await
            .map_err(Self::map_repository_error)?;
        info!(
            %user_id,
            shipment_id = %outcome.shipment.id,
            shipment_number = %outcome.shipment.shipment_number,
            containers = outcome.stats.containers,
            "shipment added"
        );
        Ok(outcome.shipment)
    }

    /// Full detail view of a shipment the user tracks.
    ///
    /// # Errors
    ///
    /// `not_found` when the shipment is missing or not tracked by the user.
    pub async fn shipment_details(
        &self,
        user_id: Uuid,
        shipment_id: Uuid,
    ) -> Result<ShipmentDetails, Error> {
        let owned = self
            .repository
            .user_owns_shipment(user_id, shipment_id)
            .await
            .map_err(Self::map_repository_error)?;
        if !owned {
            return Err(Error::not_found(ACCESS_DENIED_MESSAGE));
        }
        self.repository
            .shipment_details(user_id, shipment_id)
            .await
            .map_err(Self::map_repository_error)?
            .ok_or_else(|| Error::not_found(ACCESS_DENIED_MESSAGE))
    }
}
