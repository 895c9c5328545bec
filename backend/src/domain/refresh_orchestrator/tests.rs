//! Refresh run tests over the in-memory repository.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};
use mockable::Clock as _;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::TokenBucket;
use crate::domain::ports::{
    AdmissionError, FixtureAdmissionControl, MockAdmissionControl, MockTrackingProvider,
    TrackingProviderError,
};
use crate::domain::scheduler::ScheduledTask;
use crate::domain::shipment::DELIVERED_STATUS;
use crate::test_support::snapshots::{new_shipment, sample_snapshot};
use crate::test_support::{InMemoryShipmentRepository, MutableClock};

struct Harness {
    repository: Arc<InMemoryShipmentRepository>,
    clock: Arc<MutableClock>,
}

#[fixture]
fn harness() -> Harness {
    let start = Utc
        .with_ymd_and_hms(2026, 3, 10, 12, 0, 0)
        .single()
        .expect("valid instant");
    let clock = Arc::new(MutableClock::new(start));
    Harness {
        repository: Arc::new(InMemoryShipmentRepository::new(clock.clone())),
        clock,
    }
}

impl Harness {
    /// Seed a shipment last updated `age_minutes` ago.
    fn seed(&self, number: &str, status: &str, age_minutes: i64) -> Shipment {
        let updated_at = self.clock.utc() - TimeDelta::minutes(age_minutes);
        self.repository
            .seed_shipment(&new_shipment(number, status), updated_at)
    }

    fn orchestrator(
        &self,
        provider: MockTrackingProvider,
        admission: Arc<dyn AdmissionControl>,
        config: RefreshConfig,
    ) -> RefreshOrchestrator {
        let engine = Arc::new(SyncEngine::new(self.repository.clone(), Arc::new(provider)));
        RefreshOrchestrator::new(
            RefreshOrchestratorPorts::new(engine, self.repository.clone(), admission),
            self.clock.clone(),
            config,
        )
    }
}

/// Provider that fails for numbers in `failing` and counts every call.
fn provider(failing: &'static [&'static str], calls: Arc<AtomicUsize>) -> MockTrackingProvider {
    let mut provider = MockTrackingProvider::new();
    provider.expect_fetch_shipment().returning(move |request| {
        calls.fetch_add(1, Ordering::SeqCst);
        if failing.iter().any(|number| *number == request.shipment_number) {
            Err(TrackingProviderError::provider(500_u16, "boom"))
        } else {
            Ok(sample_snapshot(&request.shipment_number))
        }
    });
    provider
}

fn fixture_admission() -> Arc<dyn AdmissionControl> {
    Arc::new(FixtureAdmissionControl)
}

#[rstest]
#[tokio::test]
async fn failures_are_isolated_per_shipment(harness: Harness) {
    let numbers = ["SHIP000001", "SHIP000002", "SHIP000003", "SHIP000004", "SHIP000005"];
    let seeded: Vec<Shipment> = numbers
        .iter()
        .map(|number| harness.seed(number, "IN_TRANSIT", 120))
        .collect();
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = harness.orchestrator(
        provider(&["SHIP000002", "SHIP000004"], calls.clone()),
        fixture_admission(),
        RefreshConfig::default(),
    );

    let summary = orchestrator
        .refresh_all(&CancellationToken::new())
        .await
        .expect("run completes");

    assert_eq!(summary.total, 5);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.skipped, 0);
    let mut failed: Vec<&str> = summary
        .errors
        .iter()
        .map(|failure| failure.shipment_number.as_str())
        .collect();
    failed.sort_unstable();
    assert_eq!(failed, vec!["SHIP000002", "SHIP000004"]);
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    for shipment in &seeded {
        let summary = harness.repository.summary(shipment.id);
        let expected = if ["SHIP000002", "SHIP000004"].contains(&shipment.shipment_number.as_str()) {
            0
        } else {
            1
        };
        assert_eq!(summary.containers, expected, "{}", shipment.shipment_number);
        assert_eq!(summary.container_events, expected * 2);
    }
    assert_eq!(orchestrator.last_summary(), Some(summary));
}

#[rstest]
#[tokio::test]
async fn delivered_and_fresh_shipments_are_not_candidates(harness: Harness) {
    harness.seed("SHIP000001", "IN_TRANSIT", 120);
    harness.seed("SHIP000002", DELIVERED_STATUS, 120);
    harness.seed("SHIP000003", "IN_TRANSIT", 10);
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator =
        harness.orchestrator(provider(&[], calls.clone()), fixture_admission(), RefreshConfig::default());

    let summary = orchestrator
        .refresh_all(&CancellationToken::new())
        .await
        .expect("run completes");

    assert_eq!(summary.total, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[rstest]
#[case(None, 3)]
#[case(Some(Duration::from_secs(30 * 60)), 2)]
#[case(Some(Duration::from_secs(3 * 60 * 60)), 0)]
#[tokio::test]
async fn freshness_window_filters_recent_updates(
    harness: Harness,
    #[case] window: Option<Duration>,
    #[case] expected: usize,
) {
    harness.seed("SHIP000001", "IN_TRANSIT", 5);
    harness.seed("SHIP000002", "IN_TRANSIT", 45);
    harness.seed("SHIP000003", "IN_TRANSIT", 90);
    let orchestrator = harness.orchestrator(
        provider(&[], Arc::new(AtomicUsize::new(0))),
        fixture_admission(),
        RefreshConfig {
            freshness_window: window,
            ..RefreshConfig::default()
        },
    );

    let summary = orchestrator
        .refresh_all(&CancellationToken::new())
        .await
        .expect("run completes");

    assert_eq!(summary.total, expected);
}

#[rstest]
#[tokio::test]
async fn batch_cap_takes_the_stalest_shipments(harness: Harness) {
    let oldest = harness.seed("SHIP000001", "IN_TRANSIT", 300);
    let older = harness.seed("SHIP000002", "IN_TRANSIT", 200);
    let newest = harness.seed("SHIP000003", "IN_TRANSIT", 100);
    let orchestrator = harness.orchestrator(
        provider(&[], Arc::new(AtomicUsize::new(0))),
        fixture_admission(),
        RefreshConfig {
            max_shipments_per_run: Some(2),
            workers: 1,
            ..RefreshConfig::default()
        },
    );

    let summary = orchestrator
        .refresh_all(&CancellationToken::new())
        .await
        .expect("run completes");

    assert_eq!(summary.total, 2);
    assert_eq!(harness.repository.summary(oldest.id).containers, 1);
    assert_eq!(harness.repository.summary(older.id).containers, 1);
    assert_eq!(harness.repository.summary(newest.id).containers, 0);
}

#[rstest]
#[tokio::test]
async fn cancelled_run_skips_every_shipment(harness: Harness) {
    harness.seed("SHIP000001", "IN_TRANSIT", 120);
    harness.seed("SHIP000002", "IN_TRANSIT", 120);
    let mut provider = MockTrackingProvider::new();
    provider.expect_fetch_shipment().never();
    let orchestrator = harness.orchestrator(provider, fixture_admission(), RefreshConfig::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = orchestrator.refresh_all(&cancel).await.expect("run completes");

    assert_eq!(summary.total, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 0);
}

#[rstest]
#[tokio::test]
async fn abandoned_admission_skips_remaining_shipments(harness: Harness) {
    for index in 0..3 {
        harness.seed(&format!("SHIP00000{index}"), "IN_TRANSIT", 120 - index);
    }
    let mut admission = MockAdmissionControl::new();
    admission.expect_wait().times(1).returning(|_| Ok(()));
    admission
        .expect_wait()
        .times(2)
        .returning(|_| Err(AdmissionError::Cancelled));
    admission.expect_available_tokens().return_const(0_u32);
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = harness.orchestrator(
        provider(&[], calls.clone()),
        Arc::new(admission),
        RefreshConfig {
            workers: 1,
            ..RefreshConfig::default()
        },
    );

    let summary = orchestrator
        .refresh_all(&CancellationToken::new())
        .await
        .expect("run completes");

    assert_eq!(summary.total, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn admission_paces_provider_calls(harness: Harness) {
    for index in 0..4 {
        harness.seed(&format!("SHIP00000{index}"), "IN_TRANSIT", 120);
    }
    let bucket: Arc<dyn AdmissionControl> =
        Arc::new(TokenBucket::new(2, Duration::from_secs(1)));
    let orchestrator = harness.orchestrator(
        provider(&[], Arc::new(AtomicUsize::new(0))),
        bucket,
        RefreshConfig::default(),
    );
    let started = tokio::time::Instant::now();

    let summary = orchestrator
        .refresh_all(&CancellationToken::new())
        .await
        .expect("run completes");

    assert_eq!(summary.succeeded, 4);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(2_500), "elapsed {elapsed:?}");
}

#[rstest]
fn config_updates_apply_to_later_runs(harness: Harness) {
    let orchestrator = harness.orchestrator(
        MockTrackingProvider::new(),
        fixture_admission(),
        RefreshConfig::default(),
    );
    let updated = RefreshConfig {
        workers: 2,
        max_shipments_per_run: Some(50),
        ..RefreshConfig::default()
    };

    orchestrator.update_config(updated.clone());

    assert_eq!(orchestrator.config(), updated);
    assert_eq!(orchestrator.last_summary(), None);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn refresh_task_runs_immediately_then_on_interval(harness: Harness) {
    harness.seed("SHIP000001", "IN_TRANSIT", 120);
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator = Arc::new(harness.orchestrator(
        provider(&[], calls.clone()),
        fixture_admission(),
        RefreshConfig {
            interval: Duration::from_secs(60),
            freshness_window: None,
            ..RefreshConfig::default()
        },
    ));
    let task = ShipmentRefreshTask::new(orchestrator.clone());
    let cancel = CancellationToken::new();
    let running = {
        let cancel = cancel.clone();
        tokio::spawn(async move { task.start(cancel).await })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(orchestrator.last_summary().is_some());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    cancel.cancel();
    running.await.expect("task exits on cancel");
}
