//! Read model assembled for a user viewing one shipment.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::shipment::{
    ContainerRecord, FacilityRecord, GeoPoint, LocationRecord, Shipment, UserAnnotations,
    VesselRecord,
};

/// One populated route slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePointView {
    pub location: LocationRecord,
    pub date: Option<DateTime<Utc>>,
    pub is_actual: bool,
    pub predictive_eta: Option<DateTime<Utc>>,
}

/// Four-slot route view.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteView {
    pub prepol: Option<RoutePointView>,
    pub pol: Option<RoutePointView>,
    pub pod: Option<RoutePointView>,
    pub postpod: Option<RoutePointView>,
}

/// Container event with its references resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerEventView {
    pub location: LocationRecord,
    pub facility: Option<FacilityRecord>,
    pub vessel: Option<VesselRecord>,
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

/// Container with events in provider order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerView {
    pub container: ContainerRecord,
    pub events: Vec<ContainerEventView>,
}

/// Route segment with ordered points.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentView {
    pub route_type: String,
    pub points: Vec<GeoPoint>,
}

/// Current AIS summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AisView {
    pub status: String,
    pub last_event_description: Option<String>,
    pub last_event_date: Option<DateTime<Utc>>,
    pub last_event_voyage: Option<String>,
    pub discharge_port_name: Option<String>,
    pub departure_port_name: Option<String>,
    pub arrival_port_name: Option<String>,
    pub arrival_port_date: Option<DateTime<Utc>>,
    pub vessel: Option<VesselRecord>,
    pub last_vessel_position: Option<GeoPoint>,
    pub updated_at: DateTime<Utc>,
}

/// Full detail view of one shipment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentDetails {
    pub shipment: Shipment,
    pub annotations: Option<UserAnnotations>,
    pub locations: Vec<LocationRecord>,
    pub route: RouteView,
    pub vessels: Vec<VesselRecord>,
    pub facilities: Vec<FacilityRecord>,
    pub containers: Vec<ContainerView>,
    pub segments: Vec<SegmentView>,
    pub coordinate: Option<GeoPoint>,
    pub ais: Option<AisView>,
}

/// Row counts of everything a shipment owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentDataSummary {
    pub shipment_id: Uuid,
    pub locations: u64,
    pub routes: u64,
    pub vessels: u64,
    pub facilities: u64,
    pub containers: u64,
    pub container_events: u64,
    pub route_segments: u64,
    pub route_segment_points: u64,
    pub coordinates: u64,
    pub ais: u64,
}
