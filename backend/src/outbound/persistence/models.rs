//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. They exist solely to satisfy Diesel's
//! type requirements for queries and mutations.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use super::schema::{
    ais_snapshots, container_events, containers, facilities, locations, route_segments,
    shipment_routes, shipments, user_shipments, vessels,
};

// ---------------------------------------------------------------------------
// Shipment models
// ---------------------------------------------------------------------------

/// Row struct for reading from the shipments table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = shipments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ShipmentRow {
    pub id: Uuid,
    pub shipment_number: String,
    pub shipment_type: String,
    pub sealine_code: String,
    pub sealine_name: String,
    pub shipping_status: String,
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for creating shipments.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = shipments)]
pub(crate) struct NewShipmentRow<'a> {
    pub shipment_number: &'a str,
    pub shipment_type: &'a str,
    pub sealine_code: &'a str,
    pub sealine_name: &'a str,
    pub shipping_status: &'a str,
    pub warnings: &'a [String],
}

/// Changeset for provider-driven shipment scalars.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = shipments)]
pub(crate) struct ShipmentScalarsUpdate<'a> {
    pub sealine_name: &'a str,
    pub shipping_status: &'a str,
    pub warnings: &'a [String],
    pub updated_at: DateTime<Utc>,
}

/// Insertable struct for user links.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_shipments)]
pub(crate) struct NewUserShipmentRow<'a> {
    pub user_id: Uuid,
    pub shipment_id: Uuid,
    pub recipient: Option<&'a str>,
    pub address: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Annotation columns of a user link.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_shipments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserAnnotationsRow {
    pub recipient: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Reference data models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = locations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct LocationRow {
    pub id: Uuid,
    pub locode: String,
    pub name: String,
    pub state: Option<String>,
    pub country: String,
    pub country_code: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub timezone: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = locations)]
pub(crate) struct NewLocationRow<'a> {
    pub locode: &'a str,
    pub name: &'a str,
    pub state: Option<&'a str>,
    pub country: &'a str,
    pub country_code: &'a str,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub timezone: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = vessels)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct VesselRow {
    pub id: Uuid,
    pub name: String,
    pub imo: i64,
    pub mmsi: i64,
    pub call_sign: String,
    pub flag: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = vessels)]
pub(crate) struct NewVesselRow<'a> {
    pub name: &'a str,
    pub imo: i64,
    pub mmsi: i64,
    pub call_sign: &'a str,
    pub flag: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = facilities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct FacilityRow {
    pub id: Uuid,
    pub locode: String,
    pub name: String,
    pub country_code: String,
    pub bic_code: Option<String>,
    pub smdg_code: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = facilities)]
pub(crate) struct NewFacilityRow<'a> {
    pub locode: &'a str,
    pub name: &'a str,
    pub country_code: &'a str,
    pub bic_code: Option<&'a str>,
    pub smdg_code: Option<&'a str>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = containers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ContainerRow {
    pub id: Uuid,
    pub number: String,
    pub iso_code: String,
    pub size_type: String,
    pub status: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = containers)]
pub(crate) struct NewContainerRow<'a> {
    pub number: &'a str,
    pub iso_code: &'a str,
    pub size_type: &'a str,
    pub status: &'a str,
}

// ---------------------------------------------------------------------------
// Shipment-owned graph models
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = shipment_routes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RouteRow {
    pub location_id: Uuid,
    pub route_type: String,
    pub date: Option<DateTime<Utc>>,
    pub is_actual: bool,
    pub predictive_eta: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = shipment_routes)]
pub(crate) struct NewRouteRow<'a> {
    pub shipment_id: Uuid,
    pub location_id: Uuid,
    pub route_type: &'a str,
    pub date: Option<DateTime<Utc>>,
    pub is_actual: bool,
    pub predictive_eta: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = container_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ContainerEventRow {
    pub container_id: Uuid,
    pub location_id: Uuid,
    pub facility_id: Option<Uuid>,
    pub vessel_id: Option<Uuid>,
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

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = container_events)]
pub(crate) struct NewContainerEventRow<'a> {
    pub shipment_id: Uuid,
    pub container_id: Uuid,
    pub location_id: Uuid,
    pub facility_id: Option<Uuid>,
    pub vessel_id: Option<Uuid>,
    pub event_order: i32,
    pub description: &'a str,
    pub event_type: Option<&'a str>,
    pub event_code: Option<&'a str>,
    pub status: &'a str,
    pub date: Option<DateTime<Utc>>,
    pub is_actual: bool,
    pub is_additional_event: bool,
    pub route_type: &'a str,
    pub transport_type: Option<&'a str>,
    pub voyage: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = route_segments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RouteSegmentRow {
    pub id: Uuid,
    pub route_type: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = route_segments)]
pub(crate) struct NewRouteSegmentRow<'a> {
    pub shipment_id: Uuid,
    pub segment_order: i32,
    pub route_type: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ais_snapshots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct AisRow {
    pub vessel_id: Option<Uuid>,
    pub status: String,
    pub last_event_description: Option<String>,
    pub last_event_date: Option<DateTime<Utc>>,
    pub last_event_voyage: Option<String>,
    pub discharge_port: Option<serde_json::Value>,
    pub departure_port: Option<serde_json::Value>,
    pub arrival_port: Option<serde_json::Value>,
    pub last_vessel_lat: Option<f64>,
    pub last_vessel_lng: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ais_snapshots)]
pub(crate) struct NewAisRow<'a> {
    pub shipment_id: Uuid,
    pub vessel_id: Option<Uuid>,
    pub status: &'a str,
    pub last_event_description: Option<&'a str>,
    pub last_event_date: Option<DateTime<Utc>>,
    pub last_event_voyage: Option<&'a str>,
    pub discharge_port: Option<serde_json::Value>,
    pub departure_port: Option<serde_json::Value>,
    pub arrival_port: Option<serde_json::Value>,
    pub last_vessel_lat: Option<f64>,
    pub last_vessel_lng: Option<f64>,
    pub last_vessel_position_at: Option<DateTime<Utc>>,
    pub provider_updated_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
