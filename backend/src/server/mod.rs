//! HTTP server construction.
//!
//! The server only exposes operational endpoints; shipment work happens in
//! the background scheduler. Actix signal handling is disabled so the
//! binary controls the shutdown order.

mod config;

pub use config::ServerConfig;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

#[cfg(debug_assertions)]
use tidewatch::doc::ApiDoc;
use tidewatch::inbound::http::health::{HealthState, live, ready};
use tidewatch::inbound::http::jobs::{self, JobsState};

#[derive(Clone)]
struct AppDependencies {
    health_state: web::Data<HealthState>,
    jobs_state: web::Data<JobsState>,
}

fn build_app(
    deps: AppDependencies,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let AppDependencies {
        health_state,
        jobs_state,
    } = deps;

    let app = App::new()
        .app_data(health_state)
        .app_data(jobs_state)
        .service(ready)
        .service(live)
        .service(jobs::status)
        .service(jobs::health);

    #[cfg(debug_assertions)]
    let app = app.service(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    app
}

/// Bind the HTTP server and mark the process ready.
///
/// The returned [`Server`] must be spawned or awaited to accept connections.
///
/// # Errors
///
/// Propagates [`std::io::Error`] when binding the socket fails.
pub fn create_server(
    health_state: web::Data<HealthState>,
    jobs_state: JobsState,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let deps = AppDependencies {
        health_state: health_state.clone(),
        jobs_state: web::Data::new(jobs_state),
    };
    let ServerConfig { bind_addr, workers } = config;

    let mut server = HttpServer::new(move || build_app(deps.clone())).disable_signals();
    if let Some(workers) = workers {
        server = server.workers(workers);
    }
    let server = server.bind(bind_addr)?.run();

    health_state.mark_ready();
    Ok(server)
}
