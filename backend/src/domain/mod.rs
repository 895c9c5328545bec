//! Domain primitives, ports and services.
//!
//! Purpose: model shipments and their provider snapshots, and host the
//! background sync machinery (admission control, sync engine, refresh
//! orchestrator and task scheduler) behind ports implemented in `outbound`.
//!
//! Public surface:
//! - Error / ErrorCode: transport-neutral error payload.
//! - Shipment and reference records (`shipment`), provider snapshots
//!   (`snapshot`) and read models (`shipment_details`).
//! - TokenBucket, SyncEngine, RefreshOrchestrator, TaskScheduler and
//!   ShipmentTrackingService.

pub mod error;
pub mod ports;
pub mod rate_limiter;
pub mod refresh_orchestrator;
pub mod scheduler;
pub mod shipment;
pub mod shipment_details;
pub mod snapshot;
pub mod sync_engine;
pub mod tracking_service;

pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::rate_limiter::TokenBucket;
pub use self::refresh_orchestrator::{
    RefreshConfig, RefreshFailure, RefreshOrchestrator, RefreshOrchestratorPorts, RunSummary,
    ShipmentRefreshTask,
};
pub use self::scheduler::{ScheduledTask, SchedulerError, TaskScheduler};
pub use self::shipment::{
    ContainerRecord, FacilityRecord, GeoPoint, LocationRecord, NewShipment, RouteType, Shipment,
    ShipmentScalars, UserAnnotations, VesselKey, VesselRecord,
};
pub use self::shipment_details::{ShipmentDataSummary, ShipmentDetails};
pub use self::snapshot::ShipmentSnapshot;
pub use self::sync_engine::{SyncEngine, SyncError, SyncOutcome};
pub use self::tracking_service::{
    AddShipmentRequest, ShipmentTrackingService, ShipmentValidationError,
};

