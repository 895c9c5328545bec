//! PostgreSQL-backed `ShipmentRepository` implementation using Diesel ORM.
//!
//! Reads check a connection out of the pool per call. The detail view loads
//! every table inside one read transaction so all SELECTs observe the same
//! snapshot. Writes run through [`DieselGraphWriter`] inside
//! [`ShipmentRepository::run_in_transaction`].

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, resume_unwind};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, exists};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use futures_util::FutureExt as _;
use tracing::{debug, error};
use uuid::Uuid;

use crate::domain::ports::{
    GraphWork, GraphWriteOutcome, Identified, ShipmentRepository, ShipmentRepositoryError,
};
use crate::domain::shipment::DELIVERED_STATUS;
use crate::domain::shipment_details::{
    AisView, ContainerEventView, ContainerView, RoutePointView, RouteView, SegmentView,
};
use crate::domain::{
    ContainerRecord, FacilityRecord, GeoPoint, LocationRecord, RouteType, Shipment,
    ShipmentDataSummary, ShipmentDetails, UserAnnotations, VesselKey, VesselRecord,
};

use super::diesel_graph_writer::DieselGraphWriter;
use super::diesel_helpers::{cast_count, map_diesel_error, map_pool_error};
use super::json_serializers::json_to_ais_port;
use super::models::{
    AisRow, ContainerEventRow, ContainerRow, FacilityRow, LocationRow, RouteRow,
    RouteSegmentRow, ShipmentRow, UserAnnotationsRow, VesselRow,
};
use super::pool::DbPool;
use super::schema::{
    ais_snapshots, container_events, containers, facilities, locations, route_segment_points,
    route_segments, shipment_containers, shipment_coordinates, shipment_facilities,
    shipment_locations, shipment_routes, shipment_vessels, shipments, user_shipments, vessels,
};

/// Diesel-backed implementation of the `ShipmentRepository` port.
#[derive(Clone)]
pub struct DieselShipmentRepository {
    pool: DbPool,
}

impl DieselShipmentRepository {
    /// Create a new repository with the given connection pool.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use tidewatch::outbound::persistence::{DbPool, DieselShipmentRepository, PoolConfig};
    ///
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    /// let pool = DbPool::new(PoolConfig::new("postgres://localhost/tidewatch")).await?;
    /// let repository = DieselShipmentRepository::new(pool);
    /// # let _ = repository;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Why a graph transaction was rolled back.
#[derive(Debug)]
enum Abort {
    Diesel(diesel::result::Error),
    Rejected(ShipmentRepositoryError),
    /// The payload is parked outside the transaction so a failed rollback
    /// cannot swallow it.
    Panicked,
}

type PanicPayload = Box<dyn Any + Send>;

/// Turn a finished graph transaction into the port result.
///
/// A captured panic is resumed whatever happened to the rollback.
fn settle(
    result: Result<GraphWriteOutcome, Abort>,
    panicked: Option<PanicPayload>,
) -> Result<GraphWriteOutcome, ShipmentRepositoryError> {
    if let Some(payload) = panicked {
        match &result {
            Err(Abort::Diesel(failure)) => {
                error!(error = %failure, "graph transaction panicked and rollback failed");
            }
            _ => error!("graph transaction panicked; rolled back"),
        }
        resume_unwind(payload);
    }

    match result {
        Ok(outcome) => Ok(outcome),
        Err(Abort::Rejected(rejected)) => {
            debug!(error = %rejected, "graph transaction rolled back");
            Err(rejected)
        }
        Err(Abort::Diesel(failure)) => Err(map_diesel_error(failure)),
        Err(Abort::Panicked) => Err(ShipmentRepositoryError::query(
            "graph transaction aborted without a panic payload",
        )),
    }
}

impl From<diesel::result::Error> for Abort {
    fn from(error: diesel::result::Error) -> Self {
        Self::Diesel(error)
    }
}

pub(super) fn row_to_shipment(row: ShipmentRow) -> Shipment {
    Shipment {
        id: row.id,
        shipment_number: row.shipment_number,
        shipment_type: row.shipment_type,
        sealine_code: row.sealine_code,
        sealine_name: row.sealine_name,
        shipping_status: row.shipping_status,
        warnings: row.warnings,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn point(lat: Option<f64>, lng: Option<f64>) -> Option<GeoPoint> {
    Some(GeoPoint {
        lat: lat?,
        lng: lng?,
    })
}

fn row_to_location(row: LocationRow) -> LocationRecord {
    LocationRecord {
        locode: row.locode,
        name: row.name,
        state: row.state,
        country: row.country,
        country_code: row.country_code,
        coordinates: point(row.lat, row.lng),
        timezone: row.timezone,
    }
}

fn row_to_vessel(row: VesselRow) -> VesselRecord {
    VesselRecord {
        name: row.name,
        imo: row.imo,
        mmsi: row.mmsi,
        call_sign: row.call_sign,
        flag: row.flag,
    }
}

fn row_to_facility(row: FacilityRow) -> FacilityRecord {
    FacilityRecord {
        locode: row.locode,
        name: row.name,
        country_code: row.country_code,
        bic_code: row.bic_code,
        smdg_code: row.smdg_code,
        coordinates: point(row.lat, row.lng),
    }
}

fn row_to_container(row: ContainerRow) -> ContainerRecord {
    ContainerRecord {
        number: row.number,
        iso_code: row.iso_code,
        size_type: row.size_type,
        status: row.status,
    }
}

fn row_to_annotations(row: UserAnnotationsRow) -> UserAnnotations {
    UserAnnotations {
        recipient: row.recipient,
        address: row.address,
        notes: row.notes,
    }
}

/// Raw rows of one shipment's detail view, loaded in a single transaction.
struct DetailRows {
    shipment: ShipmentRow,
    annotations: Option<UserAnnotationsRow>,
    locations: Vec<LocationRow>,
    routes: Vec<(RouteRow, LocationRow)>,
    vessels: Vec<VesselRow>,
    facilities: Vec<FacilityRow>,
    containers: Vec<ContainerRow>,
    events: Vec<ContainerEventRow>,
    event_locations: Vec<LocationRow>,
    event_facilities: Vec<FacilityRow>,
    event_vessels: Vec<VesselRow>,
    segments: Vec<RouteSegmentRow>,
    points: Vec<(Uuid, f64, f64)>,
    coordinate: Option<(f64, f64)>,
    ais: Option<AisRow>,
}

async fn load_detail_rows(
    conn: &mut diesel_async::AsyncPgConnection,
    user_id: Uuid,
    shipment_id: Uuid,
) -> Result<Option<DetailRows>, diesel::result::Error> {
    let Some(shipment) = shipments::table
        .find(shipment_id)
        .select(ShipmentRow::as_select())
        .first(conn)
        .await
        .optional()?
    else {
        return Ok(None);
    };

    let annotations = user_shipments::table
        .filter(user_shipments::user_id.eq(user_id))
        .filter(user_shipments::shipment_id.eq(shipment_id))
        .select(UserAnnotationsRow::as_select())
        .first(conn)
        .await
        .optional()?;

    let linked_locations = shipment_locations::table
        .inner_join(locations::table)
        .filter(shipment_locations::shipment_id.eq(shipment_id))
        .order_by(shipment_locations::position.asc())
        .select(LocationRow::as_select())
        .load(conn)
        .await?;

    let routes = shipment_routes::table
        .inner_join(locations::table)
        .filter(shipment_routes::shipment_id.eq(shipment_id))
        .select((RouteRow::as_select(), LocationRow::as_select()))
        .load(conn)
        .await?;

    let linked_vessels = shipment_vessels::table
        .inner_join(vessels::table)
        .filter(shipment_vessels::shipment_id.eq(shipment_id))
        .order_by(shipment_vessels::position.asc())
        .select(VesselRow::as_select())
        .load(conn)
        .await?;

    let linked_facilities = shipment_facilities::table
        .inner_join(facilities::table)
        .filter(shipment_facilities::shipment_id.eq(shipment_id))
        .order_by(shipment_facilities::position.asc())
        .select(FacilityRow::as_select())
        .load(conn)
        .await?;

    let linked_containers = shipment_containers::table
        .inner_join(containers::table)
        .filter(shipment_containers::shipment_id.eq(shipment_id))
        .order_by(shipment_containers::position.asc())
        .select(ContainerRow::as_select())
        .load(conn)
        .await?;

    let events: Vec<ContainerEventRow> = container_events::table
        .filter(container_events::shipment_id.eq(shipment_id))
        .order_by(container_events::event_order.asc())
        .select(ContainerEventRow::as_select())
        .load(conn)
        .await?;

    let location_ids: Vec<Uuid> = events.iter().map(|e| e.location_id).collect();
    let facility_ids: Vec<Uuid> = events.iter().filter_map(|e| e.facility_id).collect();
    let event_locations = locations::table
        .filter(locations::id.eq_any(&location_ids))
        .select(LocationRow::as_select())
        .load(conn)
        .await?;
    let event_facilities = facilities::table
        .filter(facilities::id.eq_any(&facility_ids))
        .select(FacilityRow::as_select())
        .load(conn)
        .await?;

    let ais = ais_snapshots::table
        .filter(ais_snapshots::shipment_id.eq(shipment_id))
        .order_by(ais_snapshots::updated_at.desc())
        .select(AisRow::as_select())
        .first(conn)
        .await
        .optional()?;

    let vessel_ids: Vec<Uuid> = events
        .iter()
        .filter_map(|e| e.vessel_id)
        .chain(ais.as_ref().and_then(|row| row.vessel_id))
        .collect();
    let event_vessels = vessels::table
        .filter(vessels::id.eq_any(&vessel_ids))
        .select(VesselRow::as_select())
        .load(conn)
        .await?;

    let segments: Vec<RouteSegmentRow> = route_segments::table
        .filter(route_segments::shipment_id.eq(shipment_id))
        .order_by(route_segments::segment_order.asc())
        .select(RouteSegmentRow::as_select())
        .load(conn)
        .await?;
    let segment_ids: Vec<Uuid> = segments.iter().map(|s| s.id).collect();
    let points = route_segment_points::table
        .filter(route_segment_points::segment_id.eq_any(&segment_ids))
        .order_by((
            route_segment_points::segment_id,
            route_segment_points::point_order.asc(),
        ))
        .select((
            route_segment_points::segment_id,
            route_segment_points::lat,
            route_segment_points::lng,
        ))
        .load(conn)
        .await?;

    let coordinate = shipment_coordinates::table
        .filter(shipment_coordinates::shipment_id.eq(shipment_id))
        .order_by(shipment_coordinates::updated_at.desc())
        .select((shipment_coordinates::lat, shipment_coordinates::lng))
        .first(conn)
        .await
        .optional()?;

    Ok(Some(DetailRows {
        shipment,
        annotations,
        locations: linked_locations,
        routes,
        vessels: linked_vessels,
        facilities: linked_facilities,
        containers: linked_containers,
        events,
        event_locations,
        event_facilities,
        event_vessels,
        segments,
        points,
        coordinate,
        ais,
    }))
}

fn index_by_id<R, T>(
    rows: Vec<R>,
    id: impl Fn(&R) -> Uuid,
    convert: impl Fn(R) -> T,
) -> HashMap<Uuid, T> {
    rows.into_iter().map(|row| (id(&row), convert(row))).collect()
}

fn assemble_route(
    rows: Vec<(RouteRow, LocationRow)>,
) -> Result<RouteView, ShipmentRepositoryError> {
    let mut route = RouteView::default();
    for (row, location) in rows {
        let route_type = RouteType::from_str(&row.route_type)
            .map_err(|err| ShipmentRepositoryError::invalid_record(err.to_string()))?;
        let view = Some(RoutePointView {
            location: row_to_location(location),
            date: row.date,
            is_actual: row.is_actual,
            predictive_eta: row.predictive_eta,
        });
        match route_type {
            RouteType::Prepol => route.prepol = view,
            RouteType::Pol => route.pol = view,
            RouteType::Pod => route.pod = view,
            RouteType::Postpod => route.postpod = view,
        }
    }
    Ok(route)
}

fn assemble_ais(
    row: AisRow,
    vessels: &HashMap<Uuid, VesselRecord>,
) -> Result<AisView, ShipmentRepositoryError> {
    let departure = json_to_ais_port(row.departure_port.as_ref())
        .map_err(ShipmentRepositoryError::invalid_record)?;
    let discharge = json_to_ais_port(row.discharge_port.as_ref())
        .map_err(ShipmentRepositoryError::invalid_record)?;
    let arrival = json_to_ais_port(row.arrival_port.as_ref())
        .map_err(ShipmentRepositoryError::invalid_record)?;
    Ok(AisView {
        status: row.status,
        last_event_description: row.last_event_description,
        last_event_date: row.last_event_date,
        last_event_voyage: row.last_event_voyage,
        discharge_port_name: discharge.name,
        departure_port_name: departure.name,
        arrival_port_name: arrival.name,
        arrival_port_date: arrival.date,
        vessel: row.vessel_id.and_then(|id| vessels.get(&id).cloned()),
        last_vessel_position: point(row.last_vessel_lat, row.last_vessel_lng),
        updated_at: row.updated_at,
    })
}

fn assemble_details(rows: DetailRows) -> Result<ShipmentDetails, ShipmentRepositoryError> {
    let event_locations = index_by_id(rows.event_locations, |r| r.id, row_to_location);
    let event_facilities = index_by_id(rows.event_facilities, |r| r.id, row_to_facility);
    let event_vessels = index_by_id(rows.event_vessels, |r| r.id, row_to_vessel);

    let mut events_by_container: HashMap<Uuid, Vec<ContainerEventView>> = HashMap::new();
    for event in rows.events {
        let location = event_locations.get(&event.location_id).cloned().ok_or_else(|| {
            ShipmentRepositoryError::invalid_record(format!(
                "event references unknown location {}",
                event.location_id
            ))
        })?;
        events_by_container
            .entry(event.container_id)
            .or_default()
            .push(ContainerEventView {
                location,
                facility: event.facility_id.and_then(|id| event_facilities.get(&id).cloned()),
                vessel: event.vessel_id.and_then(|id| event_vessels.get(&id).cloned()),
                description: event.description,
                event_type: event.event_type,
                event_code: event.event_code,
                status: event.status,
                date: event.date,
                is_actual: event.is_actual,
                is_additional_event: event.is_additional_event,
                route_type: event.route_type,
                transport_type: event.transport_type,
                voyage: event.voyage,
            });
    }
    let containers = rows
        .containers
        .into_iter()
        .map(|row| ContainerView {
            events: events_by_container.remove(&row.id).unwrap_or_default(),
            container: row_to_container(row),
        })
        .collect();

    let mut points_by_segment: HashMap<Uuid, Vec<GeoPoint>> = HashMap::new();
    for (segment_id, lat, lng) in rows.points {
        points_by_segment
            .entry(segment_id)
            .or_default()
            .push(GeoPoint { lat, lng });
    }
    let segments = rows
        .segments
        .into_iter()
        .map(|row| SegmentView {
            points: points_by_segment.remove(&row.id).unwrap_or_default(),
            route_type: row.route_type,
        })
        .collect();

    let ais = rows
        .ais
        .map(|row| assemble_ais(row, &event_vessels))
        .transpose()?;

    Ok(ShipmentDetails {
        shipment: row_to_shipment(rows.shipment),
        annotations: rows.annotations.map(row_to_annotations),
        locations: rows.locations.into_iter().map(row_to_location).collect(),
        route: assemble_route(rows.routes)?,
        vessels: rows.vessels.into_iter().map(row_to_vessel).collect(),
        facilities: rows.facilities.into_iter().map(row_to_facility).collect(),
        containers,
        segments,
        coordinate: rows.coordinate.map(|(lat, lng)| GeoPoint { lat, lng }),
        ais,
    })
}

#[async_trait]
impl ShipmentRepository for DieselShipmentRepository {
    async fn find_shipment(&self, id: Uuid) -> Result<Option<Shipment>, ShipmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = shipments::table
            .find(id)
            .select(ShipmentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(row_to_shipment))
    }

    async fn find_shipment_by_number(
        &self,
        shipment_number: &str,
    ) -> Result<Option<Shipment>, ShipmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = shipments::table
            .filter(shipments::shipment_number.eq(shipment_number))
            .select(ShipmentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(row_to_shipment))
    }

    async fn user_owns_shipment(
        &self,
        user_id: Uuid,
        shipment_id: Uuid,
    ) -> Result<bool, ShipmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::select(exists(
            user_shipments::table
                .filter(user_shipments::user_id.eq(user_id))
                .filter(user_shipments::shipment_id.eq(shipment_id)),
        ))
        .get_result(&mut conn)
        .await
        .map_err(map_diesel_error)
    }

    async fn user_tracks_number(
        &self,
        user_id: Uuid,
        shipment_number: &str,
    ) -> Result<bool, ShipmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::select(exists(
            user_shipments::table
                .inner_join(shipments::table)
                .filter(user_shipments::user_id.eq(user_id))
                .filter(shipments::shipment_number.eq(shipment_number)),
        ))
        .get_result(&mut conn)
        .await
        .map_err(map_diesel_error)
    }

    async fn list_refresh_candidates(
        &self,
        updated_before: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<Shipment>, ShipmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let mut query = shipments::table
            .filter(shipments::shipping_status.not_ilike(DELIVERED_STATUS))
            .order_by(shipments::updated_at.asc())
            .select(ShipmentRow::as_select())
            .into_boxed();
        if let Some(cutoff) = updated_before {
            query = query.filter(shipments::updated_at.lt(cutoff));
        }
        if let Some(limit) = limit {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            query = query.limit(limit);
        }
        let rows = query.load(&mut conn).await.map_err(map_diesel_error)?;
        debug!(candidates = rows.len(), "loaded refresh candidates");
        Ok(rows.into_iter().map(row_to_shipment).collect())
    }

    async fn find_location_by_locode(
        &self,
        locode: &str,
    ) -> Result<Option<Identified<LocationRecord>>, ShipmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = locations::table
            .filter(locations::locode.eq(locode))
            .select(LocationRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(|row| Identified {
            id: row.id,
            record: row_to_location(row),
        }))
    }

    async fn find_vessel(
        &self,
        key: VesselKey,
    ) -> Result<Option<Identified<VesselRecord>>, ShipmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = vessels::table
            .filter(vessels::imo.eq(key.imo))
            .filter(vessels::mmsi.eq(key.mmsi))
            .select(VesselRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(|row| Identified {
            id: row.id,
            record: row_to_vessel(row),
        }))
    }

    async fn find_facility_by_locode(
        &self,
        locode: &str,
    ) -> Result<Option<Identified<FacilityRecord>>, ShipmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = facilities::table
            .filter(facilities::locode.eq(locode))
            .select(FacilityRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(|row| Identified {
            id: row.id,
            record: row_to_facility(row),
        }))
    }

    async fn find_container_by_number(
        &self,
        number: &str,
    ) -> Result<Option<Identified<ContainerRecord>>, ShipmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = containers::table
            .filter(containers::number.eq(number))
            .select(ContainerRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(|row| Identified {
            id: row.id,
            record: row_to_container(row),
        }))
    }

    async fn shipment_details(
        &self,
        user_id: Uuid,
        shipment_id: Uuid,
    ) -> Result<Option<ShipmentDetails>, ShipmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows = conn
            .transaction(|conn| {
                async move { load_detail_rows(conn, user_id, shipment_id).await }.scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        rows.map(assemble_details).transpose()
    }

    async fn data_summary(
        &self,
        shipment_id: Uuid,
    ) -> Result<ShipmentDataSummary, ShipmentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let summary = conn
            .transaction(|conn| {
                async move {
                    macro_rules! owned_rows {
                        ($table:ident) => {
                            $table::table
                                .filter($table::shipment_id.eq(shipment_id))
                                .select(count_star())
                                .get_result::<i64>(conn)
                                .await
                                .map(cast_count)?
                        };
                    }

                    let route_segment_points = route_segment_points::table
                        .inner_join(route_segments::table)
                        .filter(route_segments::shipment_id.eq(shipment_id))
                        .select(count_star())
                        .get_result::<i64>(conn)
                        .await
                        .map(cast_count)?;

                    Ok::<_, diesel::result::Error>(ShipmentDataSummary {
                        shipment_id,
                        locations: owned_rows!(shipment_locations),
                        routes: owned_rows!(shipment_routes),
                        vessels: owned_rows!(shipment_vessels),
                        facilities: owned_rows!(shipment_facilities),
                        containers: owned_rows!(shipment_containers),
                        container_events: owned_rows!(container_events),
                        route_segments: owned_rows!(route_segments),
                        route_segment_points,
                        coordinates: owned_rows!(shipment_coordinates),
                        ais: owned_rows!(ais_snapshots),
                    })
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;
        Ok(summary)
    }

    async fn run_in_transaction(
        &self,
        work: GraphWork,
    ) -> Result<GraphWriteOutcome, ShipmentRepositoryError> {
        let mut panicked: Option<PanicPayload> = None;
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let slot = &mut panicked;
        let result: Result<GraphWriteOutcome, Abort> = conn
            .transaction(|conn| {
                async move {
                    let mut writer = DieselGraphWriter::new(conn);
                    match AssertUnwindSafe(work.run(&mut writer)).catch_unwind().await {
                        Ok(Ok(outcome)) => Ok(outcome),
                        Ok(Err(rejected)) => Err(Abort::Rejected(rejected)),
                        Err(payload) => {
                            *slot = Some(payload);
                            Err(Abort::Panicked)
                        }
                    }
                }
                .scope_boxed()
            })
            .await;
        drop(conn);

        settle(result, panicked)
    }
}
