//! Shipment aggregate and shared reference records.
//!
//! A [`Shipment`] is the root of the tracked graph. Reference records
//! ([`LocationRecord`], [`VesselRecord`], [`FacilityRecord`],
//! [`ContainerRecord`]) are deduplicated by natural key and shared between
//! shipments.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ports::TrackingRequest;

/// Status reported by the provider once a shipment has reached its consignee.
pub const DELIVERED_STATUS: &str = "DELIVERED";

/// Root shipment aggregate as persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
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

impl Shipment {
    /// Whether the shipment is in the terminal delivered state.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use tidewatch::domain::Shipment;
    /// use uuid::Uuid;
    ///
    /// let shipment = Shipment {
    ///     id: Uuid::new_v4(),
    ///     shipment_number: "MAEU1234567".into(),
    ///     shipment_type: "BK".into(),
    ///     sealine_code: "MAEU".into(),
    ///     sealine_name: "Maersk".into(),
    ///     shipping_status: "delivered".into(),
    ///     warnings: Vec::new(),
    ///     created_at: Utc::now(),
    ///     updated_at: Utc::now(),
    /// };
    /// assert!(shipment.is_delivered());
    /// ```
    pub fn is_delivered(&self) -> bool {
        self.shipping_status.eq_ignore_ascii_case(DELIVERED_STATUS)
    }

    /// Build the provider lookup for this shipment's stored identity.
    pub fn tracking_request(&self) -> TrackingRequest {
        TrackingRequest {
            shipment_number: self.shipment_number.clone(),
            shipment_type: self.shipment_type.clone(),
            sealine: self.sealine_code.clone(),
        }
    }
}

/// Scalar fields refreshed from a provider snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentScalars {
    pub sealine_name: String,
    pub shipping_status: String,
    pub warnings: Vec<String>,
}

/// Fields used to create a shipment row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShipment {
    pub shipment_number: String,
    pub shipment_type: String,
    pub sealine_code: String,
    pub sealine_name: String,
    pub shipping_status: String,
    pub warnings: Vec<String>,
}

/// Per-user annotations stored on the ownership link.
///
/// These survive every resync untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnnotations {
    pub recipient: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

/// Route leg kinds, in travel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteType {
    Prepol,
    Pol,
    Pod,
    Postpod,
}

impl RouteType {
    /// Every leg kind, in travel order.
    pub const ALL: [Self; 4] = [Self::Prepol, Self::Pol, Self::Pod, Self::Postpod];

    /// Stored representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prepol => "PREPOL",
            Self::Pol => "POL",
            Self::Pod => "POD",
            Self::Postpod => "POSTPOD",
        }
    }
}

impl fmt::Display for RouteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a stored route type is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown route type: {0}")]
pub struct UnknownRouteType(pub String);

impl FromStr for RouteType {
    type Err = UnknownRouteType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_uppercase().as_str() {
            "PREPOL" => Ok(Self::Prepol),
            "POL" => Ok(Self::Pol),
            "POD" => Ok(Self::Pod),
            "POSTPOD" => Ok(Self::Postpod),
            _ => Err(UnknownRouteType(raw.to_owned())),
        }
    }
}

/// WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Location reference data, keyed by `locode`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub locode: String,
    pub name: String,
    pub state: Option<String>,
    pub country: String,
    pub country_code: String,
    pub coordinates: Option<GeoPoint>,
    pub timezone: String,
}

/// Natural key of a vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VesselKey {
    pub imo: i64,
    pub mmsi: i64,
}

/// Vessel reference data, keyed by `(imo, mmsi)`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselRecord {
    pub name: String,
    pub imo: i64,
    pub mmsi: i64,
    pub call_sign: String,
    pub flag: String,
}

impl VesselRecord {
    /// Natural key for deduplication.
    pub fn key(&self) -> VesselKey {
        VesselKey {
            imo: self.imo,
            mmsi: self.mmsi,
        }
    }
}

/// Facility reference data, keyed by `locode`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityRecord {
    pub locode: String,
    pub name: String,
    pub country_code: String,
    pub bic_code: Option<String>,
    pub smdg_code: Option<String>,
    pub coordinates: Option<GeoPoint>,
}

/// Container reference data, keyed by `number`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub number: String,
    pub iso_code: String,
    pub size_type: String,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::upper("DELIVERED", true)]
    #[case::lower("delivered", true)]
    #[case::in_transit("IN_TRANSIT", false)]
    #[case::empty("", false)]
    fn delivered_status_ignores_case(#[case] status: &str, #[case] expected: bool) {
        let now = Utc::now();
        let shipment = Shipment {
            id: Uuid::new_v4(),
            shipment_number: "MAEU1234567".into(),
            shipment_type: "BK".into(),
            sealine_code: "MAEU".into(),
            sealine_name: String::new(),
            shipping_status: status.into(),
            warnings: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        assert_eq!(shipment.is_delivered(), expected);
    }

    #[rstest]
    #[case("PREPOL", RouteType::Prepol)]
    #[case("pol", RouteType::Pol)]
    #[case("POD", RouteType::Pod)]
    #[case("PostPod", RouteType::Postpod)]
    fn parses_route_types(#[case] raw: &str, #[case] expected: RouteType) {
        assert_eq!(raw.parse::<RouteType>(), Ok(expected));
        assert_eq!(expected.as_str().parse::<RouteType>(), Ok(expected));
    }

    #[rstest]
    fn rejects_unknown_route_type() {
        assert!("TRANSSHIPMENT".parse::<RouteType>().is_err());
    }
}
