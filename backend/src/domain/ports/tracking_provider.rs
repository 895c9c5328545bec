//! Driven port for the external shipment tracking provider.
//!
//! The domain owns the lookup shape and the snapshot contract so the sync
//! engine stays adapter-agnostic. Implementations issue exactly one outbound
//! call per lookup and never rate-limit on their own; callers gate calls
//! through [`super::AdmissionControl`].

use async_trait::async_trait;

use super::define_port_error;
use crate::domain::ShipmentSnapshot;

/// Provider lookup triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingRequest {
    /// Tracking number (container, booking or bill of lading).
    pub shipment_number: String,
    /// Optional type code (`CT`, `BK`, `BL`); empty when unknown.
    pub shipment_type: String,
    /// Optional carrier SCAC; empty when unknown.
    pub sealine: String,
}

define_port_error! {
    /// Errors surfaced while calling the tracking provider.
    pub enum TrackingProviderError {
        /// The provider answered with a non-success status.
        Provider { status: u16, body: String } =>
            "tracking provider returned status {status}: {body}",
        /// The response body did not match the expected schema.
        Decode { message: String } =>
            "tracking provider response decode failed: {message}",
        /// Network transport failed before a response was received.
        Transport { message: String } =>
            "tracking provider transport failed: {message}",
        /// The call exceeded its timeout.
        Timeout { message: String } =>
            "tracking provider timeout: {message}",
    }
}

/// Port for fetching a fresh snapshot of one shipment.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackingProvider: Send + Sync {
    /// Fetch the provider's current view of a shipment.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use tidewatch::domain::ports::{
    ///     FixtureTrackingProvider, TrackingProvider, TrackingRequest,
    /// };
    ///
    /// let provider = FixtureTrackingProvider;
    /// let snapshot = provider
    ///     .fetch_shipment(&TrackingRequest {
    ///         shipment_number: "MAEU1234567".into(),
    ///         shipment_type: "BK".into(),
    ///         sealine: "MAEU".into(),
    ///     })
    ///     .await?;
    /// assert_eq!(snapshot.metadata.shipment_number, "MAEU1234567");
    /// # Ok::<(), tidewatch::domain::ports::TrackingProviderError>(())
    /// ```
    async fn fetch_shipment(
        &self,
        request: &TrackingRequest,
    ) -> Result<ShipmentSnapshot, TrackingProviderError>;
}

/// Fixture implementation echoing the request as an empty snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureTrackingProvider;

#[async_trait]
impl TrackingProvider for FixtureTrackingProvider {
    async fn fetch_shipment(
        &self,
        request: &TrackingRequest,
    ) -> Result<ShipmentSnapshot, TrackingProviderError> {
        let mut snapshot = ShipmentSnapshot::default();
        snapshot.metadata.shipment_number = request.shipment_number.clone();
        snapshot.metadata.shipment_type = request.shipment_type.clone();
        snapshot.metadata.sealine = request.sealine.clone();
        Ok(snapshot)
    }
}
