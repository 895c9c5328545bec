//! Tracking provider adapters.
//!
//! `HttpTrackingProvider` implements [`crate::domain::ports::TrackingProvider`]
//! against the provider's REST lookup endpoint.

mod dto;
mod http_provider;

pub use http_provider::{DEFAULT_PROVIDER_TIMEOUT, HttpTrackingProvider};
