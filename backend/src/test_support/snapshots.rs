//! Provider snapshot builders shared by unit and integration tests.

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::snapshot::{
    AisDetails, AisLastEvent, AisPort, AisPosition, RouteLeg, SnapshotAis, SnapshotContainer,
    SnapshotEvent, SnapshotMetadata, SnapshotRoute, SnapshotRouteData, SnapshotSegment,
};
use crate::domain::{
    ContainerRecord, FacilityRecord, GeoPoint, LocationRecord, NewShipment, ShipmentSnapshot,
    VesselKey, VesselRecord,
};

pub const SHANGHAI: &str = "CNSHA";
pub const ROTTERDAM: &str = "NLRTM";
pub const VESSEL_IMO: i64 = 9_778_791;
pub const VESSEL_MMSI: i64 = 219_018_000;
pub const CONTAINER_NUMBER: &str = "MSKU1234565";

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).single() {
        Some(instant) => instant,
        None => panic!("fixture date out of range"),
    }
}

pub fn location(locode: &str, name: &str, country_code: &str) -> LocationRecord {
    LocationRecord {
        locode: locode.to_owned(),
        name: name.to_owned(),
        state: None,
        country: name.to_owned(),
        country_code: country_code.to_owned(),
        coordinates: Some(GeoPoint { lat: 31.2, lng: 121.5 }),
        timezone: "UTC".to_owned(),
    }
}

pub fn vessel() -> VesselRecord {
    VesselRecord {
        name: "MAERSK EMDEN".to_owned(),
        imo: VESSEL_IMO,
        mmsi: VESSEL_MMSI,
        call_sign: "OZDT2".to_owned(),
        flag: "DK".to_owned(),
    }
}

pub fn vessel_key() -> VesselKey {
    vessel().key()
}

pub fn facility(locode: &str) -> FacilityRecord {
    FacilityRecord {
        locode: locode.to_owned(),
        name: format!("{locode} terminal"),
        country_code: locode.get(..2).unwrap_or_default().to_owned(),
        bic_code: None,
        smdg_code: Some("APMT".to_owned()),
        coordinates: None,
    }
}

pub fn container(number: &str) -> ContainerRecord {
    ContainerRecord {
        number: number.to_owned(),
        iso_code: "45G1".to_owned(),
        size_type: "40' High Cube Dry".to_owned(),
        status: "IN_TRANSIT".to_owned(),
    }
}

pub fn event(locode: &str, description: &str, day: u32) -> SnapshotEvent {
    SnapshotEvent {
        location_locode: locode.to_owned(),
        facility_locode: None,
        vessel: None,
        description: description.to_owned(),
        event_type: Some("EQUIPMENT".to_owned()),
        event_code: None,
        status: "CEP".to_owned(),
        date: Some(at(day, 8)),
        is_actual: true,
        is_additional_event: false,
        route_type: "SEA".to_owned(),
        transport_type: None,
        voyage: None,
    }
}

fn leg(locode: &str, name: &str, country_code: &str, day: u32, is_actual: bool) -> RouteLeg {
    RouteLeg {
        location: location(locode, name, country_code),
        date: Some(at(day, 12)),
        is_actual,
        predictive_eta: None,
    }
}

/// Snapshot with two locations, a POL/POD route, one vessel, one container
/// carrying two events, a route segment, a coordinate and a detailed AIS block.
pub fn sample_snapshot(shipment_number: &str) -> ShipmentSnapshot {
    let mut loading = event(SHANGHAI, "Gate in", 1);
    loading.facility_locode = Some(SHANGHAI.to_owned());
    let mut departure = event(SHANGHAI, "Vessel departure", 3);
    departure.vessel = Some(vessel_key());
    departure.voyage = Some("412W".to_owned());
    departure.transport_type = Some("VESSEL".to_owned());

    ShipmentSnapshot {
        metadata: SnapshotMetadata {
            shipment_type: "BK".to_owned(),
            shipment_number: shipment_number.to_owned(),
            sealine: "MAEU".to_owned(),
            sealine_name: "Maersk".to_owned(),
            shipping_status: "IN_TRANSIT".to_owned(),
            updated_at: Some(at(4, 0)),
            warnings: Vec::new(),
        },
        locations: vec![
            location(SHANGHAI, "Shanghai", "CN"),
            location(ROTTERDAM, "Rotterdam", "NL"),
        ],
        route: SnapshotRoute {
            prepol: None,
            pol: Some(leg(SHANGHAI, "Shanghai", "CN", 3, true)),
            pod: Some(leg(ROTTERDAM, "Rotterdam", "NL", 28, false)),
            postpod: None,
        },
        vessels: vec![vessel()],
        facilities: vec![facility(SHANGHAI)],
        containers: vec![SnapshotContainer {
            container: container(CONTAINER_NUMBER),
            events: vec![loading, departure],
        }],
        route_data: SnapshotRouteData {
            segments: vec![SnapshotSegment {
                route_type: "SEA".to_owned(),
                path: vec![
                    GeoPoint { lat: 31.2, lng: 121.5 },
                    GeoPoint { lat: 1.3, lng: 103.8 },
                    GeoPoint { lat: 51.9, lng: 4.1 },
                ],
            }],
            coordinate: Some(GeoPoint { lat: 1.3, lng: 103.8 }),
            ais: SnapshotAis {
                status: "OK".to_owned(),
                details: Some(AisDetails {
                    last_event: AisLastEvent {
                        description: "Vessel departure".to_owned(),
                        date: Some(at(3, 12)),
                        voyage: "412W".to_owned(),
                    },
                    discharge_port: AisPort {
                        name: Some("Rotterdam".to_owned()),
                        country_code: Some("NL".to_owned()),
                        code: Some(ROTTERDAM.to_owned()),
                        date: Some(at(28, 12)),
                        date_label: Some("ETA".to_owned()),
                    },
                    departure_port: AisPort {
                        name: Some("Shanghai".to_owned()),
                        ..AisPort::default()
                    },
                    arrival_port: AisPort {
                        name: Some("Singapore".to_owned()),
                        ..AisPort::default()
                    },
                    vessel: Some(vessel_key()),
                    last_vessel_position: Some(AisPosition {
                        point: GeoPoint { lat: 1.3, lng: 103.8 },
                        updated_at: Some(at(4, 0)),
                    }),
                    updated_at: Some(at(4, 0)),
                }),
            },
        },
    }
}

/// Snapshot carrying only metadata and a status-only AIS block.
pub fn status_only_snapshot(shipment_number: &str, status: &str) -> ShipmentSnapshot {
    ShipmentSnapshot {
        metadata: SnapshotMetadata {
            shipment_type: "BK".to_owned(),
            shipment_number: shipment_number.to_owned(),
            sealine: "MAEU".to_owned(),
            sealine_name: "Maersk".to_owned(),
            shipping_status: status.to_owned(),
            updated_at: None,
            warnings: vec!["provider is still collecting data".to_owned()],
        },
        route_data: SnapshotRouteData {
            ais: SnapshotAis {
                status: "NOT_ON_BOARD".to_owned(),
                details: None,
            },
            ..SnapshotRouteData::default()
        },
        ..ShipmentSnapshot::default()
    }
}

/// Shipment row fields for seeding a repository.
pub fn new_shipment(shipment_number: &str, status: &str) -> NewShipment {
    NewShipment {
        shipment_number: shipment_number.to_owned(),
        shipment_type: "BK".to_owned(),
        sealine_code: "MAEU".to_owned(),
        sealine_name: "Maersk".to_owned(),
        shipping_status: status.to_owned(),
        warnings: Vec::new(),
    }
}
