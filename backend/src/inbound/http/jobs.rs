//! Background job status endpoints.
//!
//! ```text
//! GET /jobs/status
//! GET /jobs/health
//! ```

use std::sync::Arc;
use std::time::Duration;

use actix_web::{HttpResponse, get, http::header, web};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{RefreshOrchestrator, RunSummary, TaskScheduler};

/// Components the jobs endpoints report on.
#[derive(Clone)]
pub struct JobsState {
    pub scheduler: Arc<TaskScheduler>,
    pub orchestrator: Arc<RefreshOrchestrator>,
    pub clock: Arc<dyn Clock>,
}

impl JobsState {
    pub fn new(
        scheduler: Arc<TaskScheduler>,
        orchestrator: Arc<RefreshOrchestrator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            scheduler,
            orchestrator,
            clock,
        }
    }
}

/// Counts from the most recent refresh run.
#[derive(Debug, Serialize, ToSchema)]
pub struct LastRunResponse {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl From<RunSummary> for LastRunResponse {
    fn from(summary: RunSummary) -> Self {
        Self {
            started_at: summary.started_at,
            finished_at: summary.finished_at,
            total: summary.total,
            succeeded: summary.succeeded,
            failed: summary.failed,
            skipped: summary.skipped,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SchedulerStatus {
    pub is_running: bool,
    /// Human-readable uptime, e.g. `1h 2m 3s`.
    #[schema(example = "1h 2m 3s")]
    pub uptime: String,
    pub uptime_seconds: u64,
    pub registered_jobs: Vec<String>,
    pub total_jobs: usize,
    pub last_status_check: DateTime<Utc>,
    pub last_run: Option<LastRunResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobsStatusResponse {
    #[schema(example = "success")]
    pub status: String,
    pub data: SchedulerStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JobsHealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub scheduler_running: bool,
}

/// Render a duration as `1h 2m 3s`, dropping leading zero units.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Scheduler state, registered jobs and the last refresh run.
#[utoipa::path(
    get,
    path = "/jobs/status",
    tags = ["jobs"],
    responses((status = 200, description = "Scheduler status", body = JobsStatusResponse))
)]
#[get("/jobs/status")]
pub async fn status(state: web::Data<JobsState>) -> HttpResponse {
    let uptime = state.scheduler.uptime();
    let registered_jobs = state.scheduler.registered_tasks();
    let data = SchedulerStatus {
        is_running: state.scheduler.is_running(),
        uptime: format_uptime(uptime),
        uptime_seconds: uptime.as_secs(),
        total_jobs: registered_jobs.len(),
        registered_jobs,
        last_status_check: state.clock.utc(),
        last_run: state.orchestrator.last_summary().map(LastRunResponse::from),
    };

    HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(JobsStatusResponse {
            status: "success".to_owned(),
            data,
        })
}

/// 200 while the scheduler runs, 503 otherwise.
#[utoipa::path(
    get,
    path = "/jobs/health",
    tags = ["jobs"],
    responses(
        (status = 200, description = "Scheduler running", body = JobsHealthResponse),
        (status = 503, description = "Scheduler stopped", body = JobsHealthResponse)
    )
)]
#[get("/jobs/health")]
pub async fn health(state: web::Data<JobsState>) -> HttpResponse {
    let scheduler_running = state.scheduler.is_running();
    let mut response = if scheduler_running {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    };

    response
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(JobsHealthResponse {
            status: if scheduler_running { "healthy" } else { "unhealthy" }.to_owned(),
            timestamp: state.clock.utc(),
            scheduler_running,
        })
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
