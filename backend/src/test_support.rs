//! Test utilities for the tidewatch crate.
//!
//! Shared by unit tests in `src/` and integration suites in `tests/`. Only
//! compiled for tests or with the `test-support` feature.

pub mod clock;
pub mod in_memory_repository;
pub mod snapshots;

pub use clock::MutableClock;
pub use in_memory_repository::{Fault, InMemoryShipmentRepository, WriteStep};
