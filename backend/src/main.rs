//! Tidewatch entry point: migrations, adapters, background scheduler and the
//! operational HTTP server.

mod server;

use std::sync::Arc;

use actix_web::web;
use color_eyre::eyre::{Result, WrapErr, eyre};
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use tidewatch::config::AppSettings;
use tidewatch::domain::{
    RefreshOrchestrator, RefreshOrchestratorPorts, SchedulerError, ShipmentRefreshTask,
    SyncEngine, TaskScheduler, TokenBucket,
};
use tidewatch::inbound::http::health::HealthState;
use tidewatch::inbound::http::jobs::JobsState;
use tidewatch::outbound::persistence::{DbPool, DieselShipmentRepository, run_pending_migrations};
use tidewatch::outbound::tracking::HttpTrackingProvider;

use crate::server::{ServerConfig, create_server};

#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings =
        AppSettings::load().map_err(|err| eyre!("failed to load configuration: {err}"))?;
    let base_url = settings.provider_base_url()?;
    let api_key = settings.provider_api_key()?.to_owned();

    let database_url = settings.database_url().to_owned();
    let applied = tokio::task::spawn_blocking(move || run_pending_migrations(&database_url))
        .await
        .wrap_err("migration task failed")??;
    info!(applied, "database schema up to date");

    let pool_config = settings.pool_config();
    info!(
        database = %pool_config.redacted_url(),
        max_size = pool_config.max_size(),
        "connecting to database"
    );
    let pool = DbPool::new(pool_config).await?;
    let status = pool.status();
    info!(
        connections = status.connections,
        idle = status.idle_connections,
        "database pool ready"
    );
    let repository = Arc::new(DieselShipmentRepository::new(pool));
    let provider = Arc::new(
        HttpTrackingProvider::new(base_url, api_key, settings.provider_timeout())
            .wrap_err("failed to build tracking provider client")?,
    );
    let admission = Arc::new(TokenBucket::new(
        settings.rate_limit_burst(),
        settings.rate_limit_refill(),
    ));
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);

    let engine = Arc::new(SyncEngine::new(repository.clone(), provider));
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        RefreshOrchestratorPorts::new(engine, repository, admission),
        clock.clone(),
        settings.refresh_config(),
    ));
    let scheduler = Arc::new(TaskScheduler::new(clock.clone()));
    scheduler.register(Arc::new(ShipmentRefreshTask::new(orchestrator.clone())))?;
    scheduler.start()?;

    let health_state = web::Data::new(HealthState::new());
    let mut server_config = ServerConfig::new(settings.bind_addr());
    if let Some(workers) = settings.http_workers {
        server_config = server_config.with_workers(workers);
    }
    let bind_addr = server_config.bind_addr();
    let server = create_server(
        health_state.clone(),
        JobsState::new(scheduler.clone(), orchestrator, clock),
        server_config,
    )?;
    let handle = server.handle();
    let serving = actix_web::rt::spawn(server);
    info!(%bind_addr, "http server listening");

    shutdown_signal().await;
    info!("shutdown requested");
    health_state.begin_draining();

    match scheduler.stop(settings.shutdown_timeout()).await {
        Ok(()) => {}
        Err(SchedulerError::ShutdownTimeout { timeout, pending }) => {
            warn!(?timeout, ?pending, "background tasks still running at shutdown");
        }
        Err(error) => warn!(%error, "scheduler stop failed"),
    }

    handle.stop(true).await;
    serving.await.wrap_err("http server task failed")??;
    info!("shutdown complete");
    Ok(())
}

/// Resolve on SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    () = interrupt => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(error) => {
                warn!(%error, "failed to listen for SIGTERM");
                interrupt.await;
            }
        }
    }

    #[cfg(not(unix))]
    interrupt.await;
}
