//! Driven port for persisting the shipment entity graph.
//!
//! Reads run standalone against the store. Every write goes through a
//! [`ShipmentGraphWriter`], which is the explicit handle of one open
//! transaction: [`ShipmentRepository::run_in_transaction`] opens it, hands it
//! to a [`GraphWork`] unit, and commits only when the unit returns `Ok`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::Serialize;
use uuid::Uuid;

use super::define_port_error;
use crate::domain::snapshot::AisDetails;
use crate::domain::{
    ContainerRecord, FacilityRecord, GeoPoint, LocationRecord, NewShipment, RouteType, Shipment,
    ShipmentDataSummary, ShipmentDetails, ShipmentScalars, UserAnnotations, VesselKey,
    VesselRecord,
};

define_port_error! {
    /// Errors raised by shipment persistence adapters.
    pub enum ShipmentRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "shipment repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "shipment repository query failed: {message}",
        /// A reference entity the graph points at does not exist.
        MissingReference { entity: String, key: String } =>
            "{entity} not found for key {key}",
        /// A stored row could not be mapped back into the domain.
        InvalidRecord { message: String } =>
            "shipment repository returned an invalid record: {message}",
        /// A uniqueness rule rejected the write.
        Conflict { message: String } =>
            "shipment repository conflict: {message}",
    }
}

/// Stored reference entity with its surrogate identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct Identified<T> {
    pub id: Uuid,
    pub record: T,
}

/// Attaches a reference entity to a shipment at a provider-order position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTarget {
    pub shipment_id: Uuid,
    pub position: i32,
}

/// Route leg row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRoute {
    pub shipment_id: Uuid,
    pub location_id: Uuid,
    pub route_type: RouteType,
    pub date: Option<DateTime<Utc>>,
    pub is_actual: bool,
    pub predictive_eta: Option<DateTime<Utc>>,
}

/// Container event row. `event_order` records provider order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContainerEvent {
    pub shipment_id: Uuid,
    pub container_id: Uuid,
    pub location_id: Uuid,
    pub facility_id: Option<Uuid>,
    pub vessel_id: Option<Uuid>,
    pub event_order: i32,
    pub description: String,
    pub event_type: Option<String>,
    pub event_code: Option<String>,
    pub status: String,
    pub date: Option<DateTime<Utc>>,
    pub is_actual: bool,
    pub is_additional_event: bool,
    pub route_type: String,
    pub transport_type: Option<String>,
    pub voyage: Option<String>,
}

/// Route segment row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRouteSegment {
    pub shipment_id: Uuid,
    pub segment_order: i32,
    pub route_type: String,
}

/// AIS row. `details` is `None` for a status-only row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAis {
    pub shipment_id: Uuid,
    pub status: String,
    pub details: Option<AisDetails>,
    pub vessel_id: Option<Uuid>,
}

/// Rows removed by [`ShipmentGraphWriter::delete_all_related`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeletionReport {
    pub ais: u64,
    pub coordinates: u64,
    pub route_segments: u64,
    pub containers: u64,
    pub facilities: u64,
    pub vessels: u64,
    pub routes: u64,
    pub locations: u64,
}

/// Rows written while recreating a shipment graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub locations: u32,
    pub routes: u32,
    pub vessels: u32,
    pub facilities: u32,
    pub containers: u32,
    pub container_events: u32,
    pub route_segments: u32,
    pub coordinates: u32,
    pub ais: u32,
}

/// Result of a committed graph write.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphWriteOutcome {
    pub shipment: Shipment,
    pub stats: SyncStats,
}

/// Write primitives available inside one open transaction.
#[async_trait]
pub trait ShipmentGraphWriter: Send {
    /// Remove every row the shipment owns, in dependency order.
    async fn delete_all_related(
        &mut self,
        shipment_id: Uuid,
    ) -> Result<DeletionReport, ShipmentRepositoryError>;

    /// Insert a shipment row.
    async fn create_shipment(
        &mut self,
        shipment: &NewShipment,
    ) -> Result<Shipment, ShipmentRepositoryError>;

    /// Attach a user to a shipment with their annotations.
    async fn link_user(
        &mut self,
        user_id: Uuid,
        shipment_id: Uuid,
        annotations: &UserAnnotations,
    ) -> Result<(), ShipmentRepositoryError>;

    /// Overwrite provider-driven scalars and bump `updated_at`.
    async fn update_shipment_scalars(
        &mut self,
        shipment_id: Uuid,
        scalars: &ShipmentScalars,
    ) -> Result<Shipment, ShipmentRepositoryError>;

    /// Resolve a location by locode, creating it when absent.
    async fn find_or_create_location(
        &mut self,
        location: &LocationRecord,
        link: Option<LinkTarget>,
    ) -> Result<Uuid, ShipmentRepositoryError>;

    /// Resolve a vessel by `(imo, mmsi)`, creating it when absent.
    async fn find_or_create_vessel(
        &mut self,
        vessel: &VesselRecord,
        link: Option<LinkTarget>,
    ) -> Result<Uuid, ShipmentRepositoryError>;

    /// Resolve a facility by locode, creating it when absent.
    async fn find_or_create_facility(
        &mut self,
        facility: &FacilityRecord,
        link: Option<LinkTarget>,
    ) -> Result<Uuid, ShipmentRepositoryError>;

    /// Resolve a container by number, creating it when absent.
    async fn find_or_create_container(
        &mut self,
        container: &ContainerRecord,
        link: Option<LinkTarget>,
    ) -> Result<Uuid, ShipmentRepositoryError>;

    /// Look up a location id inside the transaction.
    async fn find_location_by_locode(
        &mut self,
        locode: &str,
    ) -> Result<Option<Uuid>, ShipmentRepositoryError>;

    /// Look up a facility id inside the transaction.
    async fn find_facility_by_locode(
        &mut self,
        locode: &str,
    ) -> Result<Option<Uuid>, ShipmentRepositoryError>;

    /// Look up a vessel id inside the transaction.
    async fn find_vessel(
        &mut self,
        key: VesselKey,
    ) -> Result<Option<Uuid>, ShipmentRepositoryError>;

    async fn create_route(&mut self, route: &NewRoute) -> Result<(), ShipmentRepositoryError>;

    async fn create_container_event(
        &mut self,
        event: &NewContainerEvent,
    ) -> Result<(), ShipmentRepositoryError>;

    async fn create_route_segment(
        &mut self,
        segment: &NewRouteSegment,
    ) -> Result<Uuid, ShipmentRepositoryError>;

    async fn create_route_segment_point(
        &mut self,
        segment_id: Uuid,
        point_order: i32,
        point: GeoPoint,
    ) -> Result<(), ShipmentRepositoryError>;

    async fn create_coordinate(
        &mut self,
        shipment_id: Uuid,
        point: GeoPoint,
    ) -> Result<(), ShipmentRepositoryError>;

    async fn create_ais(&mut self, ais: &NewAis) -> Result<(), ShipmentRepositoryError>;
}

type GraphWorkFn = dyn for<'w> FnOnce(
        &'w mut dyn ShipmentGraphWriter,
    ) -> BoxFuture<'w, Result<GraphWriteOutcome, ShipmentRepositoryError>>
    + Send;

/// Unit of work executed inside one transaction.
pub struct GraphWork(Box<GraphWorkFn>);

impl GraphWork {
    /// Wrap a closure borrowing the transaction's writer.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use futures_util::FutureExt as _;
    ///
    /// let work = GraphWork::new(move |writer| {
    ///     async move {
    ///         let shipment = writer.update_shipment_scalars(id, &scalars).await?;
    ///         Ok(GraphWriteOutcome { shipment, stats: SyncStats::default() })
    ///     }
    ///     .boxed()
    /// });
    /// ```
    pub fn new<F>(work: F) -> Self
    where
        F: for<'w> FnOnce(
                &'w mut dyn ShipmentGraphWriter,
            )
                -> BoxFuture<'w, Result<GraphWriteOutcome, ShipmentRepositoryError>>
            + Send
            + 'static,
    {
        Self(Box::new(work))
    }

    /// Run the unit against an open writer.
    pub fn run<'w>(
        self,
        writer: &'w mut dyn ShipmentGraphWriter,
    ) -> BoxFuture<'w, Result<GraphWriteOutcome, ShipmentRepositoryError>> {
        (self.0)(writer)
    }
}

impl std::fmt::Debug for GraphWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GraphWork")
    }
}

/// Port for reading and transactionally rewriting shipment graphs.
#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    async fn find_shipment(&self, id: Uuid) -> Result<Option<Shipment>, ShipmentRepositoryError>;

    async fn find_shipment_by_number(
        &self,
        shipment_number: &str,
    ) -> Result<Option<Shipment>, ShipmentRepositoryError>;

    /// Whether `user_id` is linked to `shipment_id`.
    async fn user_owns_shipment(
        &self,
        user_id: Uuid,
        shipment_id: Uuid,
    ) -> Result<bool, ShipmentRepositoryError>;

    /// Whether `user_id` already tracks a shipment with this number.
    async fn user_tracks_number(
        &self,
        user_id: Uuid,
        shipment_number: &str,
    ) -> Result<bool, ShipmentRepositoryError>;

    /// Non-delivered shipments, oldest update first.
    ///
    /// `updated_before` excludes anything refreshed at or after the instant;
    /// `limit` caps the batch.
    async fn list_refresh_candidates(
        &self,
        updated_before: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<Shipment>, ShipmentRepositoryError>;

    async fn find_location_by_locode(
        &self,
        locode: &str,
    ) -> Result<Option<Identified<LocationRecord>>, ShipmentRepositoryError>;

    async fn find_vessel(
        &self,
        key: VesselKey,
    ) -> Result<Option<Identified<VesselRecord>>, ShipmentRepositoryError>;

    async fn find_facility_by_locode(
        &self,
        locode: &str,
    ) -> Result<Option<Identified<FacilityRecord>>, ShipmentRepositoryError>;

    async fn find_container_by_number(
        &self,
        number: &str,
    ) -> Result<Option<Identified<ContainerRecord>>, ShipmentRepositoryError>;

    /// Assemble the full detail view, with the user's annotations when linked.
    async fn shipment_details(
        &self,
        user_id: Uuid,
        shipment_id: Uuid,
    ) -> Result<Option<ShipmentDetails>, ShipmentRepositoryError>;

    /// Count every row type the shipment owns.
    async fn data_summary(
        &self,
        shipment_id: Uuid,
    ) -> Result<ShipmentDataSummary, ShipmentRepositoryError>;

    /// Run `work` in one transaction, committing only on `Ok`.
    ///
    /// A panic inside `work` rolls the transaction back and is then resumed.
    async fn run_in_transaction(
        &self,
        work: GraphWork,
    ) -> Result<GraphWriteOutcome, ShipmentRepositoryError>;
}
