//! OpenAPI document for the operational HTTP surface.
//!
//! Covers the orchestration probes and the background job endpoints. Served
//! through Swagger UI in debug builds.

use utoipa::OpenApi;

use crate::domain::{Error, ErrorCode};
use crate::inbound::http::jobs::{
    JobsHealthResponse, JobsStatusResponse, LastRunResponse, SchedulerStatus,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tidewatch API",
        description = "Health probes and background shipment sync status."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
        crate::inbound::http::jobs::status,
        crate::inbound::http::jobs::health,
    ),
    components(schemas(
        Error,
        ErrorCode,
        JobsStatusResponse,
        SchedulerStatus,
        LastRunResponse,
        JobsHealthResponse
    )),
    tags(
        (name = "health", description = "Orchestration probes"),
        (name = "jobs", description = "Background refresh scheduler status")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use utoipa::openapi::RefOr;
    use utoipa::openapi::schema::Schema;

    #[rstest]
    #[case("/health/ready")]
    #[case("/health/live")]
    #[case("/jobs/status")]
    #[case("/jobs/health")]
    fn document_lists_operational_paths(#[case] path: &str) {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key(path), "missing path {path}");
    }

    #[rstest]
    #[case("SchedulerStatus", "uptime_seconds")]
    #[case("JobsHealthResponse", "scheduler_running")]
    #[case("Error", "message")]
    fn schemas_expose_fields(#[case] schema: &str, #[case] field: &str) {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.as_ref().expect("components").schemas;
        match schemas.get(schema).expect("schema registered") {
            RefOr::T(Schema::Object(obj)) => {
                assert!(obj.properties.contains_key(field), "{schema} lacks {field}");
            }
            _ => panic!("expected object schema for {schema}"),
        }
    }
}
