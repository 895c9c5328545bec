//! DTOs for decoding tracking provider JSON responses.
//!
//! The adapter decodes into these transport DTOs first, then maps into the
//! domain [`ShipmentSnapshot`] in one pass. References from events and the
//! AIS block collapse to natural keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::domain::snapshot::{
    AisDetails, AisLastEvent, AisPort, AisPosition, RouteLeg, SnapshotAis, SnapshotContainer,
    SnapshotEvent, SnapshotMetadata, SnapshotRoute, SnapshotRouteData, SnapshotSegment,
};
use crate::domain::{
    ContainerRecord, FacilityRecord, GeoPoint, LocationRecord, ShipmentSnapshot, VesselKey,
    VesselRecord,
};

/// Decode an explicit `null` as the field's empty value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ShipmentResponseDto {
    pub(super) metadata: MetadataDto,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) locations: Vec<LocationDto>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) route: RouteDto,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) vessels: Vec<VesselDto>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) facilities: Vec<FacilityDto>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) containers: Vec<ContainerDto>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) route_data: RouteDataDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct MetadataDto {
    #[serde(deserialize_with = "null_as_default")]
    pub(super) shipment_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub(super) shipment_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub(super) sealine: String,
    #[serde(deserialize_with = "null_as_default")]
    pub(super) sealine_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub(super) shipping_status: String,
    pub(super) updated_at: Option<DateTime<Utc>>,
    pub(super) warnings: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(super) struct CoordinatesDto {
    pub(super) lat: f64,
    pub(super) lng: f64,
}

impl From<CoordinatesDto> for GeoPoint {
    fn from(value: CoordinatesDto) -> Self {
        GeoPoint {
            lat: value.lat,
            lng: value.lng,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LocationDto {
    pub(super) locode: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) name: String,
    pub(super) state: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) country: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) country_code: String,
    pub(super) coordinates: Option<CoordinatesDto>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) timezone: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct RouteDto {
    pub(super) prepol: Option<RoutePointDto>,
    pub(super) pol: Option<RoutePointDto>,
    pub(super) pod: Option<RoutePointDto>,
    pub(super) postpod: Option<RoutePointDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RoutePointDto {
    pub(super) location: LocationDto,
    pub(super) date: Option<DateTime<Utc>>,
    pub(super) actual: Option<bool>,
    pub(super) predictive_eta: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VesselDto {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) name: String,
    pub(super) imo: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) call_sign: String,
    pub(super) mmsi: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) flag: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FacilityDto {
    pub(super) locode: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) country_code: String,
    pub(super) bic_code: Option<String>,
    pub(super) smdg_code: Option<String>,
    pub(super) coordinates: Option<CoordinatesDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ContainerDto {
    pub(super) number: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) iso_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) size_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) events: Vec<EventDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct EventDto {
    pub(super) location: LocationDto,
    pub(super) facility: Option<FacilityDto>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) description: String,
    pub(super) event_type: Option<String>,
    pub(super) event_code: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) status: String,
    pub(super) date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) is_actual: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) is_additional_event: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) route_type: String,
    pub(super) transport_type: Option<String>,
    pub(super) vessel: Option<VesselDto>,
    pub(super) voyage: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct RouteDataDto {
    #[serde(deserialize_with = "null_as_default")]
    pub(super) route_segments: Vec<RouteSegmentDto>,
    pub(super) coordinates: Option<CoordinatesDto>,
    pub(super) ais: Option<AisDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RouteSegmentDto {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) path: Vec<CoordinatesDto>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) route_type: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct AisDto {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) status: String,
    pub(super) data: Option<AisDataDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AisDataDto {
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) last_event: AisLastEventDto,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) discharge_port: AisPortDto,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) departure_port: AisPortDto,
    #[serde(default, deserialize_with = "null_as_default")]
    pub(super) arrival_port: AisPortDto,
    pub(super) vessel: Option<VesselDto>,
    pub(super) last_vessel_position: Option<VesselPositionDto>,
    pub(super) updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct AisLastEventDto {
    #[serde(deserialize_with = "null_as_default")]
    pub(super) description: String,
    pub(super) date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub(super) voyage: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct AisPortDto {
    pub(super) name: Option<String>,
    pub(super) country_code: Option<String>,
    pub(super) code: Option<String>,
    pub(super) date: Option<DateTime<Utc>>,
    pub(super) date_label: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VesselPositionDto {
    pub(super) lat: f64,
    pub(super) lng: f64,
    pub(super) updated_at: Option<DateTime<Utc>>,
}

impl LocationDto {
    fn into_domain(self) -> LocationRecord {
        LocationRecord {
            locode: self.locode,
            name: self.name,
            state: self.state,
            country: self.country,
            country_code: self.country_code,
            coordinates: self.coordinates.map(GeoPoint::from),
            timezone: self.timezone,
        }
    }
}

impl VesselDto {
    fn key(&self) -> VesselKey {
        VesselKey {
            imo: self.imo,
            mmsi: self.mmsi,
        }
    }

    fn into_domain(self) -> VesselRecord {
        VesselRecord {
            name: self.name,
            imo: self.imo,
            mmsi: self.mmsi,
            call_sign: self.call_sign,
            flag: self.flag,
        }
    }
}

impl FacilityDto {
    fn into_domain(self) -> FacilityRecord {
        FacilityRecord {
            locode: self.locode,
            name: self.name,
            country_code: self.country_code,
            bic_code: self.bic_code,
            smdg_code: self.smdg_code,
            coordinates: self.coordinates.map(GeoPoint::from),
        }
    }
}

impl RoutePointDto {
    fn into_domain(self) -> RouteLeg {
        RouteLeg {
            location: self.location.into_domain(),
            date: self.date,
            is_actual: self.actual.unwrap_or(false),
            predictive_eta: self.predictive_eta,
        }
    }
}

impl EventDto {
    fn into_domain(self) -> SnapshotEvent {
        SnapshotEvent {
            location_locode: self.location.locode,
            facility_locode: self.facility.map(|facility| facility.locode),
            vessel: self.vessel.as_ref().map(VesselDto::key),
            description: self.description,
            event_type: self.event_type,
            event_code: self.event_code,
            status: self.status,
            date: self.date,
            is_actual: self.is_actual,
            is_additional_event: self.is_additional_event,
            route_type: self.route_type,
            transport_type: self.transport_type,
            voyage: self.voyage,
        }
    }
}

impl AisPortDto {
    fn into_domain(self) -> AisPort {
        AisPort {
            name: self.name,
            country_code: self.country_code,
            code: self.code,
            date: self.date,
            date_label: self.date_label,
        }
    }
}

impl AisDataDto {
    fn into_domain(self) -> AisDetails {
        AisDetails {
            last_event: AisLastEvent {
                description: self.last_event.description,
                date: self.last_event.date,
                voyage: self.last_event.voyage,
            },
            discharge_port: self.discharge_port.into_domain(),
            departure_port: self.departure_port.into_domain(),
            arrival_port: self.arrival_port.into_domain(),
            vessel: self.vessel.as_ref().map(VesselDto::key),
            last_vessel_position: self.last_vessel_position.map(|position| AisPosition {
                point: GeoPoint {
                    lat: position.lat,
                    lng: position.lng,
                },
                updated_at: position.updated_at,
            }),
            updated_at: self.updated_at,
        }
    }
}

impl ShipmentResponseDto {
    pub(super) fn into_domain(self) -> ShipmentSnapshot {
        let metadata = self.metadata;
        let route = self.route;
        let ais = self.route_data.ais;

        ShipmentSnapshot {
            metadata: SnapshotMetadata {
                shipment_type: metadata.shipment_type,
                shipment_number: metadata.shipment_number,
                sealine: metadata.sealine,
                sealine_name: metadata.sealine_name,
                shipping_status: metadata.shipping_status,
                updated_at: metadata.updated_at,
                warnings: metadata.warnings.unwrap_or_default(),
            },
            locations: self
                .locations
                .into_iter()
                .map(LocationDto::into_domain)
                .collect(),
            route: SnapshotRoute {
                prepol: route.prepol.map(RoutePointDto::into_domain),
                pol: route.pol.map(RoutePointDto::into_domain),
                pod: route.pod.map(RoutePointDto::into_domain),
                postpod: route.postpod.map(RoutePointDto::into_domain),
            },
            vessels: self.vessels.into_iter().map(VesselDto::into_domain).collect(),
            facilities: self
                .facilities
                .into_iter()
                .map(FacilityDto::into_domain)
                .collect(),
            containers: self
                .containers
                .into_iter()
                .map(|container| SnapshotContainer {
                    container: ContainerRecord {
                        number: container.number,
                        iso_code: container.iso_code,
                        size_type: container.size_type,
                        status: container.status,
                    },
                    events: container
                        .events
                        .into_iter()
                        .map(EventDto::into_domain)
                        .collect(),
                })
                .collect(),
            route_data: SnapshotRouteData {
                segments: self
                    .route_data
                    .route_segments
                    .into_iter()
                    .map(|segment| SnapshotSegment {
                        route_type: segment.route_type,
                        path: segment.path.into_iter().map(GeoPoint::from).collect(),
                    })
                    .collect(),
                coordinate: self.route_data.coordinates.map(GeoPoint::from),
                ais: ais.map_or_else(SnapshotAis::default, |ais| SnapshotAis {
                    status: ais.status,
                    details: ais.data.map(AisDataDto::into_domain),
                }),
            },
        }
    }
}
