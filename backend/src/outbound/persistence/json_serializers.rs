//! JSONB encoding for AIS port details.
//!
//! Ports are stored as sparse objects: absent fields are omitted on write and
//! read back as `None`. A port with no populated field is stored as SQL
//! `NULL`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::domain::snapshot::AisPort;

fn insert_opt(object: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        object.insert(key.to_owned(), Value::String(value.to_owned()));
    }
}

/// Encode a port, returning `None` when every field is empty.
pub(super) fn ais_port_to_json(port: &AisPort) -> Option<Value> {
    let mut object = Map::with_capacity(5);
    insert_opt(&mut object, "name", port.name.as_deref());
    insert_opt(&mut object, "countryCode", port.country_code.as_deref());
    insert_opt(&mut object, "code", port.code.as_deref());
    if let Some(date) = port.date {
        object.insert("date".to_owned(), Value::String(date.to_rfc3339()));
    }
    insert_opt(&mut object, "dateLabel", port.date_label.as_deref());
    (!object.is_empty()).then_some(Value::Object(object))
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Decode a stored port.
///
/// # Errors
///
/// Returns a message when the value is not an object or the date is not
/// RFC 3339.
pub(super) fn json_to_ais_port(value: Option<&Value>) -> Result<AisPort, String> {
    let Some(value) = value else {
        return Ok(AisPort::default());
    };
    let object = value
        .as_object()
        .ok_or_else(|| "ais port: expected JSON object".to_owned())?;
    let date = object
        .get("date")
        .and_then(Value::as_str)
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|date| date.with_timezone(&Utc))
                .map_err(|e| format!("ais port date: {e}"))
        })
        .transpose()?;
    Ok(AisPort {
        name: string_field(object, "name"),
        country_code: string_field(object, "countryCode"),
        code: string_field(object, "code"),
        date,
        date_label: string_field(object, "dateLabel"),
    })
}
