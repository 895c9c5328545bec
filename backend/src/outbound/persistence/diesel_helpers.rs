//! Shared helpers for the Diesel shipment adapters.
//!
//! Maps pool and Diesel failures onto [`ShipmentRepositoryError`] and
//! converts row counts into domain counters.

use tracing::debug;

use crate::domain::ports::ShipmentRepositoryError;

use super::pool::PoolError;

/// Map pool errors to repository connection errors.
pub fn map_pool_error(error: PoolError) -> ShipmentRepositoryError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            ShipmentRepositoryError::connection(message)
        }
    }
}

/// Map Diesel errors to repository errors.
///
/// Unique violations surface as conflicts so callers can tell a duplicate
/// shipment number from a storage fault.
pub fn map_diesel_error(error: diesel::result::Error) -> ShipmentRepositoryError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => ShipmentRepositoryError::query("record not found"),
        DieselError::QueryBuilderError(_) => ShipmentRepositoryError::query("database query error"),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            ShipmentRepositoryError::conflict(info.message().to_owned())
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            ShipmentRepositoryError::query(format!(
                "foreign key violation: {}",
                info.constraint_name().unwrap_or("unknown constraint")
            ))
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            ShipmentRepositoryError::connection("database connection error")
        }
        DieselError::DatabaseError(_, info) => {
            ShipmentRepositoryError::query(info.message().to_owned())
        }
        other => ShipmentRepositoryError::query(other.to_string()),
    }
}

/// Cast a database row count to the domain's unsigned counter.
#[expect(
    clippy::cast_sign_loss,
    reason = "COUNT(*) is never negative"
)]
pub fn cast_count(count: i64) -> u64 {
    count as u64
}
