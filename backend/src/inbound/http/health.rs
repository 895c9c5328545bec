//! Liveness and readiness probes for orchestrators and load balancers.
//!
//! The process moves through three phases: starting, serving and draining.
//! Readiness holds only while serving. Liveness fails once draining begins so
//! traffic moves away before background tasks are cancelled.

use std::sync::atomic::{AtomicU8, Ordering};

use actix_web::{HttpResponse, get, http::header, web};
use serde::Serialize;
use utoipa::ToSchema;

/// Process lifecycle phase as reported by the probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Starting,
    Serving,
    Draining,
}

impl Phase {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Starting,
            1 => Self::Serving,
            _ => Self::Draining,
        }
    }
}

/// Probe body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProbeResponse {
    pub phase: Phase,
}

/// Lifecycle phase shared between `main` and the probe handlers.
///
/// Transitions only move forward: a draining process never becomes ready
/// again.
#[derive(Debug)]
pub struct HealthState {
    phase: AtomicU8,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            phase: AtomicU8::new(Phase::Starting as u8),
        }
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Starting to serving. No effect once draining.
    pub fn mark_ready(&self) {
        let _ = self.phase.compare_exchange(
            Phase::Starting as u8,
            Phase::Serving as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Enter the draining phase. Called first during shutdown.
    pub fn begin_draining(&self) {
        self.phase.store(Phase::Draining as u8, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.phase() == Phase::Serving
    }

    pub fn is_alive(&self) -> bool {
        self.phase() != Phase::Draining
    }
}

fn probe_response(ok: bool, phase: Phase) -> HttpResponse {
    let mut response = if ok {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    };
    response
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(ProbeResponse { phase })
}

/// 200 while serving; 503 while starting or draining.
#[utoipa::path(
    get,
    path = "/health/ready",
    tags = ["health"],
    responses(
        (status = 200, description = "Serving traffic", body = ProbeResponse),
        (status = 503, description = "Starting or draining", body = ProbeResponse)
    )
)]
#[get("/health/ready")]
pub async fn ready(state: web::Data<HealthState>) -> HttpResponse {
    probe_response(state.is_ready(), state.phase())
}

/// 200 until draining begins.
#[utoipa::path(
    get,
    path = "/health/live",
    tags = ["health"],
    responses(
        (status = 200, description = "Process is alive", body = ProbeResponse),
        (status = 503, description = "Process is draining", body = ProbeResponse)
    )
)]
#[get("/health/live")]
pub async fn live(state: web::Data<HealthState>) -> HttpResponse {
    probe_response(state.is_alive(), state.phase())
}

#[cfg(test)]
mod tests {
    use actix_web::http::{StatusCode, header};
    use actix_web::test::{TestRequest, call_service, init_service, read_body_json};
    use actix_web::{App, web};
    use rstest::rstest;
    use serde_json::Value;

    use super::{HealthState, Phase, live, ready};

    struct Probe {
        status: StatusCode,
        cache_control: Option<String>,
        body: Value,
    }

    async fn probe(state: web::Data<HealthState>, path: &str) -> Probe {
        let app = init_service(App::new().app_data(state).service(ready).service(live)).await;
        let response = call_service(&app, TestRequest::get().uri(path).to_request()).await;
        let status = response.status();
        let cache_control = response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        Probe {
            status,
            cache_control,
            body: read_body_json(response).await,
        }
    }

    #[rstest]
    #[case::starting_ready("/health/ready", false, StatusCode::SERVICE_UNAVAILABLE, "starting")]
    #[case::serving_ready("/health/ready", true, StatusCode::OK, "serving")]
    #[case::starting_live("/health/live", false, StatusCode::OK, "starting")]
    #[actix_web::test]
    async fn probes_follow_lifecycle(
        #[case] path: &str,
        #[case] mark_ready: bool,
        #[case] expected: StatusCode,
        #[case] phase: &str,
    ) {
        let state = web::Data::new(HealthState::new());
        if mark_ready {
            state.mark_ready();
        }

        let probe = probe(state, path).await;

        assert_eq!(probe.status, expected);
        assert_eq!(probe.cache_control.as_deref(), Some("no-store"));
        assert_eq!(probe.body["phase"], phase);
    }

    #[rstest]
    #[case("/health/live")]
    #[case("/health/ready")]
    #[actix_web::test]
    async fn draining_fails_both_probes(#[case] path: &str) {
        let state = web::Data::new(HealthState::new());
        state.mark_ready();
        state.begin_draining();

        let probe = probe(state, path).await;

        assert_eq!(probe.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(probe.body["phase"], "draining");
    }

    #[rstest]
    fn draining_is_terminal() {
        let state = HealthState::new();
        state.begin_draining();
        state.mark_ready();

        assert_eq!(state.phase(), Phase::Draining);
        assert!(!state.is_ready());
        assert!(!state.is_alive());
    }
}
