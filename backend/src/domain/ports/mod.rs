//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod admission_control;
mod shipment_repository;
mod tracking_provider;

#[cfg(test)]
pub use admission_control::MockAdmissionControl;
pub use admission_control::{AdmissionControl, AdmissionError, FixtureAdmissionControl};
pub use shipment_repository::{
    DeletionReport, GraphWork, GraphWriteOutcome, Identified, LinkTarget, NewAis,
    NewContainerEvent, NewRoute, NewRouteSegment, ShipmentGraphWriter, ShipmentRepository,
    ShipmentRepositoryError, SyncStats,
};
#[cfg(test)]
pub use tracking_provider::MockTrackingProvider;
pub use tracking_provider::{
    FixtureTrackingProvider, TrackingProvider, TrackingProviderError, TrackingRequest,
};
