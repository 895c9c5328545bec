//! Normalised provider snapshot.
//!
//! A [`ShipmentSnapshot`] is everything the tracking provider knows about one
//! shipment at one point in time. The sync engine replaces a shipment's owned
//! graph with the contents of a snapshot wholesale.

use chrono::{DateTime, Utc};

use super::shipment::{
    ContainerRecord, FacilityRecord, GeoPoint, LocationRecord, RouteType, ShipmentScalars,
    VesselKey, VesselRecord,
};

/// Shipment-level metadata reported by the provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotMetadata {
    pub shipment_type: String,
    pub shipment_number: String,
    pub sealine: String,
    pub sealine_name: String,
    pub shipping_status: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub warnings: Vec<String>,
}

impl SnapshotMetadata {
    /// Scalar fields copied onto the stored shipment during a sync.
    pub fn scalars(&self) -> ShipmentScalars {
        ShipmentScalars {
            sealine_name: self.sealine_name.clone(),
            shipping_status: self.shipping_status.clone(),
            warnings: self.warnings.clone(),
        }
    }
}

/// One populated route leg.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteLeg {
    pub location: LocationRecord,
    pub date: Option<DateTime<Utc>>,
    pub is_actual: bool,
    pub predictive_eta: Option<DateTime<Utc>>,
}

/// Four-slot route. Absent legs are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotRoute {
    pub prepol: Option<RouteLeg>,
    pub pol: Option<RouteLeg>,
    pub pod: Option<RouteLeg>,
    pub postpod: Option<RouteLeg>,
}

impl SnapshotRoute {
    /// Populated legs in travel order.
    pub fn legs(&self) -> impl Iterator<Item = (RouteType, &RouteLeg)> {
        [
            (RouteType::Prepol, self.prepol.as_ref()),
            (RouteType::Pol, self.pol.as_ref()),
            (RouteType::Pod, self.pod.as_ref()),
            (RouteType::Postpod, self.postpod.as_ref()),
        ]
        .into_iter()
        .filter_map(|(route_type, leg)| leg.map(|leg| (route_type, leg)))
    }
}

/// Container movement event as reported by the provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotEvent {
    pub location_locode: String,
    pub facility_locode: Option<String>,
    pub vessel: Option<VesselKey>,
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

/// Container plus its ordered events.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotContainer {
    pub container: ContainerRecord,
    pub events: Vec<SnapshotEvent>,
}

/// One polyline segment of the travelled or predicted path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotSegment {
    pub route_type: String,
    pub path: Vec<GeoPoint>,
}

/// Port detail inside an AIS block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AisPort {
    pub name: Option<String>,
    pub country_code: Option<String>,
    pub code: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub date_label: Option<String>,
}

/// Last AIS event reported for the carrying vessel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AisLastEvent {
    pub description: String,
    pub date: Option<DateTime<Utc>>,
    pub voyage: String,
}

/// Last known AIS vessel position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AisPosition {
    pub point: GeoPoint,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Detailed AIS payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AisDetails {
    pub last_event: AisLastEvent,
    pub discharge_port: AisPort,
    pub departure_port: AisPort,
    pub arrival_port: AisPort,
    pub vessel: Option<VesselKey>,
    pub last_vessel_position: Option<AisPosition>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// AIS block. `details` is absent when the provider only reports a status.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotAis {
    pub status: String,
    pub details: Option<AisDetails>,
}

/// Route and tracking data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotRouteData {
    pub segments: Vec<SnapshotSegment>,
    pub coordinate: Option<GeoPoint>,
    pub ais: SnapshotAis,
}

/// Full normalised provider payload for one shipment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShipmentSnapshot {
    pub metadata: SnapshotMetadata,
    pub locations: Vec<LocationRecord>,
    pub route: SnapshotRoute,
    pub vessels: Vec<VesselRecord>,
    pub facilities: Vec<FacilityRecord>,
    pub containers: Vec<SnapshotContainer>,
    pub route_data: SnapshotRouteData,
}
