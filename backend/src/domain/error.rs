//! Transport-neutral failure type shared by every tidewatch service.
//!
//! Components keep their own error enums (`SyncError`, `SchedulerError`,
//! `ShipmentValidationError`) and convert into [`Error`] where a caller needs
//! one shape to report, such as the HTTP adapter or a refresh run summary.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Failure category, serialised in snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Input failed validation.
    InvalidRequest,
    /// The caller may not act on this resource.
    Forbidden,
    /// Missing, or owned by someone else.
    NotFound,
    /// The shipment is already tracked or a uniqueness rule fired.
    Conflict,
    /// The tracking provider or the database could not be reached.
    ServiceUnavailable,
    InternalError,
}

impl ErrorCode {
    /// Wire name of the code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::ServiceUnavailable => "service_unavailable",
            Self::InternalError => "internal_error",
        }
    }

    /// Whether repeating the same call later may succeed.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::ServiceUnavailable)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised when an [`Error`] would carry a blank message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorValidationError {
    #[error("error message must not be empty")]
    EmptyMessage,
}

pub(crate) const FALLBACK_MESSAGE: &str = "unspecified error";

/// A categorised failure with a human-readable message.
///
/// The message is never blank. Deserialising a payload with a blank message
/// fails instead of producing an empty error.
///
/// ```
/// use tidewatch::domain::{Error, ErrorCode};
///
/// let err = Error::conflict("shipment MAEU1234567 is already tracked");
/// assert_eq!(err.code(), ErrorCode::Conflict);
/// assert!(!err.code().is_transient());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "UncheckedError")]
pub struct Error {
    #[schema(example = "not_found")]
    code: ErrorCode,
    #[schema(example = "shipment not found or access denied")]
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Deserialize)]
struct UncheckedError {
    code: ErrorCode,
    message: String,
    #[serde(default)]
    details: Option<Value>,
}

impl TryFrom<UncheckedError> for Error {
    type Error = ErrorValidationError;

    fn try_from(raw: UncheckedError) -> Result<Self, Self::Error> {
        Self::try_new(raw.code, raw.message).map(|error| Self {
            details: raw.details,
            ..error
        })
    }
}

impl Error {
    /// Build an error, substituting a generic message for a blank one.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::try_new(code, message).unwrap_or_else(|_| Self {
            code,
            message: FALLBACK_MESSAGE.to_owned(),
            details: None,
        })
    }

    /// # Errors
    ///
    /// [`ErrorValidationError::EmptyMessage`] when `message` is blank.
    pub fn try_new(code: ErrorCode, message: impl Into<String>) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            details: None,
        })
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Attach structured context, e.g. the offending field.
    ///
    /// ```
    /// use serde_json::json;
    /// use tidewatch::domain::Error;
    ///
    /// let err = Error::invalid_request("shipment number too short")
    ///     .with_details(json!({ "field": "shipmentNumber" }));
    /// assert!(err.details().is_some());
    /// ```
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests;
