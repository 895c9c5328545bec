//! Background shipment tracking sync engine.
//!
//! Layout follows a hexagonal split: `domain` holds the sync machinery and
//! its ports, `outbound` the provider and PostgreSQL adapters, and `inbound`
//! the operational HTTP endpoints.

pub mod config;
pub mod doc;
pub mod domain;
pub mod inbound;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI.
pub use doc::ApiDoc;
