//! Validation of add-shipment requests.

use serde::Deserialize;

use crate::domain::{Error, UserAnnotations};

pub const SHIPMENT_NUMBER_MIN: usize = 3;
pub const SHIPMENT_NUMBER_MAX: usize = 50;
pub const RECIPIENT_MAX: usize = 255;
pub const ADDRESS_MAX: usize = 1000;
pub const NOTES_MAX: usize = 2000;

/// Accepted type codes; empty lets the provider infer the type.
pub const SHIPMENT_TYPES: [&str; 4] = ["", "CT", "BK", "BL"];

/// Request to start tracking a shipment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddShipmentRequest {
    pub shipment_number: String,
    #[serde(default)]
    pub shipment_type: String,
    #[serde(default)]
    pub sealine_code: String,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Reasons an add-shipment request is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShipmentValidationError {
    #[error("shipment number must be between 3 and 50 characters, got {length}")]
    NumberLength { length: usize },
    #[error("unknown shipment type {0:?}; expected CT, BK or BL")]
    UnknownType(String),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
}

impl From<ShipmentValidationError> for Error {
    fn from(value: ShipmentValidationError) -> Self {
        Error::invalid_request(value.to_string())
    }
}

/// Request after trimming and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ValidatedRequest {
    pub shipment_number: String,
    pub shipment_type: String,
    pub sealine_code: String,
    pub annotations: UserAnnotations,
}

fn annotation(
    value: Option<&str>,
    field: &'static str,
    max: usize,
) -> Result<Option<String>, ShipmentValidationError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max {
        return Err(ShipmentValidationError::TooLong { field, max });
    }
    Ok(Some(value.to_owned()))
}

impl AddShipmentRequest {
    pub(super) fn validate(&self) -> Result<ValidatedRequest, ShipmentValidationError> {
        let shipment_number = self.shipment_number.trim();
        let length = shipment_number.chars().count();
        if !(SHIPMENT_NUMBER_MIN..=SHIPMENT_NUMBER_MAX).contains(&length) {
            return Err(ShipmentValidationError::NumberLength { length });
        }

        let shipment_type = self.shipment_type.trim().to_ascii_uppercase();
        if !SHIPMENT_TYPES.contains(&shipment_type.as_str()) {
            return Err(ShipmentValidationError::UnknownType(shipment_type));
        }

        Ok(ValidatedRequest {
            shipment_number: shipment_number.to_owned(),
            shipment_type,
            sealine_code: self.sealine_code.trim().to_ascii_uppercase(),
            annotations: UserAnnotations {
                recipient: annotation(self.recipient.as_deref(), "recipient", RECIPIENT_MAX)?,
                address: annotation(self.address.as_deref(), "address", ADDRESS_MAX)?,
                notes: annotation(self.notes.as_deref(), "notes", NOTES_MAX)?,
            },
        })
    }
}
