//! HTTP inbound adapter: orchestration probes and job status endpoints.

pub mod error;
pub mod health;
pub mod jobs;

pub use error::ApiResult;
