//! Transaction-scoped [`ShipmentGraphWriter`] over one Diesel connection.
//!
//! The writer borrows the connection of an open transaction, so every
//! statement it issues commits or rolls back with that transaction. Reference
//! rows are find-or-created with `INSERT ... ON CONFLICT DO NOTHING RETURNING`
//! followed by a reload, which never aborts the transaction on a natural-key
//! race.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{
    DeletionReport, LinkTarget, NewAis, NewContainerEvent, NewRoute, NewRouteSegment,
    ShipmentGraphWriter, ShipmentRepositoryError,
};
use crate::domain::{
    ContainerRecord, FacilityRecord, GeoPoint, LocationRecord, NewShipment, Shipment,
    ShipmentScalars, UserAnnotations, VesselKey, VesselRecord,
};

use super::diesel_helpers::map_diesel_error;
use super::diesel_shipment_repository::row_to_shipment;
use super::json_serializers::ais_port_to_json;
use super::models::{
    NewAisRow, NewContainerEventRow, NewContainerRow, NewFacilityRow, NewLocationRow,
    NewRouteRow, NewRouteSegmentRow, NewShipmentRow, NewUserShipmentRow, NewVesselRow,
    ShipmentRow, ShipmentScalarsUpdate,
};
use super::schema::{
    ais_snapshots, container_events, containers, facilities, locations, route_segment_points,
    route_segments, shipment_containers, shipment_coordinates, shipment_facilities,
    shipment_locations, shipment_routes, shipment_vessels, shipments, user_shipments, vessels,
};

/// Writer bound to the connection of one open transaction.
pub(super) struct DieselGraphWriter<'c> {
    conn: &'c mut AsyncPgConnection,
}

impl<'c> DieselGraphWriter<'c> {
    pub(super) fn new(conn: &'c mut AsyncPgConnection) -> Self {
        Self { conn }
    }
}

/// Delete matching rows and log the count under `step`.
macro_rules! delete_step {
    ($conn:expr, $table:ident, $shipment_id:expr, $step:literal) => {{
        let rows = diesel::delete($table::table.filter($table::shipment_id.eq($shipment_id)))
            .execute($conn)
            .await
            .map_err(map_diesel_error)?;
        debug!(shipment_id = %$shipment_id, rows, step = $step, "deleted shipment rows");
        rows as u64
    }};
}

/// Attach a reference row to a shipment once, keeping the first position.
macro_rules! link_step {
    ($conn:expr, $table:ident, $ref_column:ident, $ref_id:expr, $link:expr) => {{
        if let Some(link) = $link {
            diesel::insert_into($table::table)
                .values((
                    $table::shipment_id.eq(link.shipment_id),
                    $table::$ref_column.eq($ref_id),
                    $table::position.eq(link.position),
                ))
                .on_conflict(($table::shipment_id, $table::$ref_column))
                .do_nothing()
                .execute($conn)
                .await
                .map_err(map_diesel_error)?;
        }
    }};
}

#[async_trait]
impl ShipmentGraphWriter for DieselGraphWriter<'_> {
    async fn delete_all_related(
        &mut self,
        shipment_id: Uuid,
    ) -> Result<DeletionReport, ShipmentRepositoryError> {
        let conn = &mut *self.conn;
        let ais = delete_step!(&mut *conn, ais_snapshots, shipment_id, "ais");
        let coordinates = delete_step!(&mut *conn, shipment_coordinates, shipment_id, "coordinates");
        let route_segments = delete_step!(&mut *conn, route_segments, shipment_id, "route_segments");
        let containers = delete_step!(&mut *conn, shipment_containers, shipment_id, "containers");
        let facilities = delete_step!(&mut *conn, shipment_facilities, shipment_id, "facilities");
        let vessels = delete_step!(&mut *conn, shipment_vessels, shipment_id, "vessels");
        let routes = delete_step!(&mut *conn, shipment_routes, shipment_id, "routes");
        let locations = delete_step!(&mut *conn, shipment_locations, shipment_id, "locations");

        Ok(DeletionReport {
            ais,
            coordinates,
            route_segments,
            containers,
            facilities,
            vessels,
            routes,
            locations,
        })
    }

    async fn create_shipment(
        &mut self,
        shipment: &NewShipment,
    ) -> Result<Shipment, ShipmentRepositoryError> {
        let row: ShipmentRow = diesel::insert_into(shipments::table)
            .values(&NewShipmentRow {
                shipment_number: &shipment.shipment_number,
                shipment_type: &shipment.shipment_type,
                sealine_code: &shipment.sealine_code,
                sealine_name: &shipment.sealine_name,
                shipping_status: &shipment.shipping_status,
                warnings: &shipment.warnings,
            })
            .returning(ShipmentRow::as_returning())
            .get_result(&mut *self.conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(row_to_shipment(row))
    }

    async fn link_user(
        &mut self,
        user_id: Uuid,
        shipment_id: Uuid,
        annotations: &UserAnnotations,
    ) -> Result<(), ShipmentRepositoryError> {
        diesel::insert_into(user_shipments::table)
            .values(&NewUserShipmentRow {
                user_id,
                shipment_id,
                recipient: annotations.recipient.as_deref(),
                address: annotations.address.as_deref(),
                notes: annotations.notes.as_deref(),
            })
            .on_conflict((user_shipments::user_id, user_shipments::shipment_id))
            .do_update()
            .set((
                user_shipments::recipient.eq(excluded(user_shipments::recipient)),
                user_shipments::address.eq(excluded(user_shipments::address)),
                user_shipments::notes.eq(excluded(user_shipments::notes)),
            ))
            .execute(&mut *self.conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn update_shipment_scalars(
        &mut self,
        shipment_id: Uuid,
        scalars: &ShipmentScalars,
    ) -> Result<Shipment, ShipmentRepositoryError> {
        let row: Option<ShipmentRow> = diesel::update(shipments::table.find(shipment_id))
            .set(&ShipmentScalarsUpdate {
                sealine_name: &scalars.sealine_name,
                shipping_status: &scalars.shipping_status,
                warnings: &scalars.warnings,
                updated_at: Utc::now(),
            })
            .returning(ShipmentRow::as_returning())
            .get_result(&mut *self.conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_shipment).ok_or_else(|| {
            ShipmentRepositoryError::missing_reference("shipment", shipment_id.to_string())
        })
    }

    async fn find_or_create_location(
        &mut self,
        location: &LocationRecord,
        link: Option<LinkTarget>,
    ) -> Result<Uuid, ShipmentRepositoryError> {
        let inserted: Option<Uuid> = diesel::insert_into(locations::table)
            .values(&NewLocationRow {
                locode: &location.locode,
                name: &location.name,
                state: location.state.as_deref(),
                country: &location.country,
                country_code: &location.country_code,
                lat: location.coordinates.map(|point| point.lat),
                lng: location.coordinates.map(|point| point.lng),
                timezone: &location.timezone,
            })
            .on_conflict(locations::locode)
            .do_nothing()
            .returning(locations::id)
            .get_result(&mut *self.conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        let id = match inserted {
            Some(id) => id,
            None => self
                .find_location_by_locode(&location.locode)
                .await?
                .ok_or_else(|| {
                    ShipmentRepositoryError::missing_reference("location", location.locode.clone())
                })?,
        };
        link_step!(&mut *self.conn, shipment_locations, location_id, id, link);
        Ok(id)
    }

    async fn find_or_create_vessel(
        &mut self,
        vessel: &VesselRecord,
        link: Option<LinkTarget>,
    ) -> Result<Uuid, ShipmentRepositoryError> {
        let inserted: Option<Uuid> = diesel::insert_into(vessels::table)
            .values(&NewVesselRow {
                name: &vessel.name,
                imo: vessel.imo,
                mmsi: vessel.mmsi,
                call_sign: &vessel.call_sign,
                flag: &vessel.flag,
            })
            .on_conflict((vessels::imo, vessels::mmsi))
            .do_nothing()
            .returning(vessels::id)
            .get_result(&mut *self.conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        let id = match inserted {
            Some(id) => id,
            None => self.find_vessel(vessel.key()).await?.ok_or_else(|| {
                ShipmentRepositoryError::missing_reference(
                    "vessel",
                    format!("{}/{}", vessel.imo, vessel.mmsi),
                )
            })?,
        };
        link_step!(&mut *self.conn, shipment_vessels, vessel_id, id, link);
        Ok(id)
    }

    async fn find_or_create_facility(
        &mut self,
        facility: &FacilityRecord,
        link: Option<LinkTarget>,
    ) -> Result<Uuid, ShipmentRepositoryError> {
        let inserted: Option<Uuid> = diesel::insert_into(facilities::table)
            .values(&NewFacilityRow {
                locode: &facility.locode,
                name: &facility.name,
                country_code: &facility.country_code,
                bic_code: facility.bic_code.as_deref(),
                smdg_code: facility.smdg_code.as_deref(),
                lat: facility.coordinates.map(|point| point.lat),
                lng: facility.coordinates.map(|point| point.lng),
            })
            .on_conflict(facilities::locode)
            .do_nothing()
            .returning(facilities::id)
            .get_result(&mut *self.conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        let id = match inserted {
            Some(id) => id,
            None => self
                .find_facility_by_locode(&facility.locode)
                .await?
                .ok_or_else(|| {
                    ShipmentRepositoryError::missing_reference("facility", facility.locode.clone())
                })?,
        };
        link_step!(&mut *self.conn, shipment_facilities, facility_id, id, link);
        Ok(id)
    }

    async fn find_or_create_container(
        &mut self,
        container: &ContainerRecord,
        link: Option<LinkTarget>,
    ) -> Result<Uuid, ShipmentRepositoryError> {
        let inserted: Option<Uuid> = diesel::insert_into(containers::table)
            .values(&NewContainerRow {
                number: &container.number,
                iso_code: &container.iso_code,
                size_type: &container.size_type,
                status: &container.status,
            })
            .on_conflict(containers::number)
            .do_nothing()
            .returning(containers::id)
            .get_result(&mut *self.conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        let id = match inserted {
            Some(id) => id,
            None => containers::table
                .filter(containers::number.eq(&container.number))
                .select(containers::id)
                .first(&mut *self.conn)
                .await
                .map_err(map_diesel_error)?,
        };
        link_step!(&mut *self.conn, shipment_containers, container_id, id, link);
        Ok(id)
    }

    async fn find_location_by_locode(
        &mut self,
        locode: &str,
    ) -> Result<Option<Uuid>, ShipmentRepositoryError> {
        locations::table
            .filter(locations::locode.eq(locode))
            .select(locations::id)
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(map_diesel_error)
    }

    async fn find_facility_by_locode(
        &mut self,
        locode: &str,
    ) -> Result<Option<Uuid>, ShipmentRepositoryError> {
        facilities::table
            .filter(facilities::locode.eq(locode))
            .select(facilities::id)
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(map_diesel_error)
    }

    async fn find_vessel(
        &mut self,
        key: VesselKey,
    ) -> Result<Option<Uuid>, ShipmentRepositoryError> {
        vessels::table
            .filter(vessels::imo.eq(key.imo).and(vessels::mmsi.eq(key.mmsi)))
            .select(vessels::id)
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(map_diesel_error)
    }

    async fn create_route(&mut self, route: &NewRoute) -> Result<(), ShipmentRepositoryError> {
        diesel::insert_into(shipment_routes::table)
            .values(&NewRouteRow {
                shipment_id: route.shipment_id,
                location_id: route.location_id,
                route_type: route.route_type.as_str(),
                date: route.date,
                is_actual: route.is_actual,
                predictive_eta: route.predictive_eta,
            })
            .execute(&mut *self.conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn create_container_event(
        &mut self,
        event: &NewContainerEvent,
    ) -> Result<(), ShipmentRepositoryError> {
        diesel::insert_into(container_events::table)
            .values(&NewContainerEventRow {
                shipment_id: event.shipment_id,
                container_id: event.container_id,
                location_id: event.location_id,
                facility_id: event.facility_id,
                vessel_id: event.vessel_id,
                event_order: event.event_order,
                description: &event.description,
                event_type: event.event_type.as_deref(),
                event_code: event.event_code.as_deref(),
                status: &event.status,
                date: event.date,
                is_actual: event.is_actual,
                is_additional_event: event.is_additional_event,
                route_type: &event.route_type,
                transport_type: event.transport_type.as_deref(),
                voyage: event.voyage.as_deref(),
            })
            .execute(&mut *self.conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn create_route_segment(
        &mut self,
        segment: &NewRouteSegment,
    ) -> Result<Uuid, ShipmentRepositoryError> {
        diesel::insert_into(route_segments::table)
            .values(&NewRouteSegmentRow {
                shipment_id: segment.shipment_id,
                segment_order: segment.segment_order,
                route_type: &segment.route_type,
            })
            .returning(route_segments::id)
            .get_result(&mut *self.conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn create_route_segment_point(
        &mut self,
        segment_id: Uuid,
        point_order: i32,
        point: GeoPoint,
    ) -> Result<(), ShipmentRepositoryError> {
        diesel::insert_into(route_segment_points::table)
            .values((
                route_segment_points::segment_id.eq(segment_id),
                route_segment_points::point_order.eq(point_order),
                route_segment_points::lat.eq(point.lat),
                route_segment_points::lng.eq(point.lng),
            ))
            .execute(&mut *self.conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn create_coordinate(
        &mut self,
        shipment_id: Uuid,
        point: GeoPoint,
    ) -> Result<(), ShipmentRepositoryError> {
        diesel::insert_into(shipment_coordinates::table)
            .values((
                shipment_coordinates::shipment_id.eq(shipment_id),
                shipment_coordinates::lat.eq(point.lat),
                shipment_coordinates::lng.eq(point.lng),
                shipment_coordinates::updated_at.eq(Utc::now()),
            ))
            .execute(&mut *self.conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn create_ais(&mut self, ais: &NewAis) -> Result<(), ShipmentRepositoryError> {
        let details = ais.details.as_ref();
        let position = details.and_then(|d| d.last_vessel_position.as_ref());
        diesel::insert_into(ais_snapshots::table)
            .values(&NewAisRow {
                shipment_id: ais.shipment_id,
                vessel_id: ais.vessel_id,
                status: &ais.status,
                last_event_description: details.map(|d| d.last_event.description.as_str()),
                last_event_date: details.and_then(|d| d.last_event.date),
                last_event_voyage: details.map(|d| d.last_event.voyage.as_str()),
                discharge_port: details.and_then(|d| ais_port_to_json(&d.discharge_port)),
                departure_port: details.and_then(|d| ais_port_to_json(&d.departure_port)),
                arrival_port: details.and_then(|d| ais_port_to_json(&d.arrival_port)),
                last_vessel_lat: position.map(|p| p.point.lat),
                last_vessel_lng: position.map(|p| p.point.lng),
                last_vessel_position_at: position.and_then(|p| p.updated_at),
                provider_updated_at: details.and_then(|d| d.updated_at),
                updated_at: Utc::now(),
            })
            .execute(&mut *self.conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }
}
