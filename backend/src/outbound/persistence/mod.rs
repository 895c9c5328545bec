//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! [`DieselShipmentRepository`] implements the domain's
//! [`ShipmentRepository`](crate::domain::ports::ShipmentRepository) port on
//! top of `diesel-async` and a `bb8` pool.
//!
//! - Diesel row structs (`models.rs`) and table definitions (`schema.rs`)
//!   stay private to this module.
//! - Graph writes run through a writer bound to one open transaction; the
//!   transaction rolls back on any error or panic in the unit of work.
//! - Database errors are mapped to `ShipmentRepositoryError` variants.
//!
//! # Example
//!
//! ```ignore
//! use tidewatch::outbound::persistence::{DbPool, DieselShipmentRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/tidewatch")).await?;
//! let repository = DieselShipmentRepository::new(pool);
//! ```

pub(crate) mod diesel_helpers;
mod diesel_graph_writer;
mod diesel_shipment_repository;
mod json_serializers;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_shipment_repository::DieselShipmentRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError, PoolStatus};
