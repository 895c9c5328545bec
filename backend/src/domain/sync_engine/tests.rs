//! Tests for the sync engine against the transactional in-memory repository.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use futures_util::FutureExt as _;
use mockable::Clock as _;
use rstest::{fixture, rstest};
use uuid::Uuid;

use super::*;
use crate::domain::{ErrorCode, ShipmentSnapshot};
use crate::domain::ports::MockTrackingProvider;
use crate::domain::shipment::DELIVERED_STATUS;
use crate::test_support::snapshots::{
    SHANGHAI, event, new_shipment, sample_snapshot, status_only_snapshot,
};
use crate::test_support::{Fault, InMemoryShipmentRepository, MutableClock, WriteStep};

struct Harness {
    repository: Arc<InMemoryShipmentRepository>,
    clock: Arc<MutableClock>,
}

#[fixture]
fn harness() -> Harness {
    let start = Utc
        .with_ymd_and_hms(2026, 3, 5, 9, 0, 0)
        .single()
        .expect("valid start instant");
    let clock = Arc::new(MutableClock::new(start));
    let repository = Arc::new(InMemoryShipmentRepository::new(clock.clone()));
    Harness { repository, clock }
}

impl Harness {
    fn seed(&self, number: &str, status: &str) -> Shipment {
        self.repository
            .seed_shipment(&new_shipment(number, status), self.clock.utc())
    }

    fn engine(&self, provider: MockTrackingProvider) -> SyncEngine {
        SyncEngine::new(self.repository.clone(), Arc::new(provider))
    }
}

fn provider_returning(snapshot: ShipmentSnapshot) -> MockTrackingProvider {
    let mut provider = MockTrackingProvider::new();
    provider
        .expect_fetch_shipment()
        .returning(move |_| Ok(snapshot.clone()));
    provider
}

fn failing_provider() -> MockTrackingProvider {
    let mut provider = MockTrackingProvider::new();
    provider
        .expect_fetch_shipment()
        .times(1)
        .returning(|_| Err(TrackingProviderError::provider(503_u16, "upstream unavailable")));
    provider
}

#[rstest]
#[tokio::test]
async fn sync_replaces_graph_and_scalars(harness: Harness) {
    let shipment = harness.seed("MAEU1234567", "PLANNED");
    let engine = harness.engine(provider_returning(sample_snapshot("MAEU1234567")));
    harness.clock.advance_seconds(60);

    let synced = engine.sync(shipment.id).await.expect("sync succeeds");

    assert_eq!(synced.shipping_status, "IN_TRANSIT");
    assert!(synced.updated_at > shipment.updated_at);
    let summary = harness.repository.summary(shipment.id);
    assert_eq!(summary.locations, 2);
    assert_eq!(summary.routes, 2);
    assert_eq!(summary.vessels, 1);
    assert_eq!(summary.facilities, 1);
    assert_eq!(summary.containers, 1);
    assert_eq!(summary.container_events, 2);
    assert_eq!(summary.route_segments, 1);
    assert_eq!(summary.route_segment_points, 3);
    assert_eq!(summary.coordinates, 1);
    assert_eq!(summary.ais, 1);
}

#[rstest]
#[tokio::test]
async fn repeated_sync_does_not_accumulate_rows(harness: Harness) {
    let shipment = harness.seed("MAEU1234567", "PLANNED");
    let engine = harness.engine(provider_returning(sample_snapshot("MAEU1234567")));

    engine.sync(shipment.id).await.expect("first sync");
    let first = harness.repository.summary(shipment.id);
    engine.sync(shipment.id).await.expect("second sync");

    assert_eq!(harness.repository.summary(shipment.id), first);
    assert_eq!(harness.repository.location_count(), 2);
}

#[rstest]
#[tokio::test]
async fn provider_failure_leaves_stored_graph_untouched(harness: Harness) {
    let shipment = harness.seed("MAEU1234567", "PLANNED");
    harness
        .engine(provider_returning(sample_snapshot("MAEU1234567")))
        .sync(shipment.id)
        .await
        .expect("initial sync");
    let before = harness.repository.summary(shipment.id);

    let error = harness
        .engine(failing_provider())
        .sync(shipment.id)
        .await
        .expect_err("provider failure surfaces");

    assert!(matches!(error, SyncError::Provider(_)));
    assert_eq!(harness.repository.summary(shipment.id), before);
    let stored = harness
        .repository
        .find_shipment(shipment.id)
        .await
        .expect("lookup")
        .expect("shipment exists");
    assert_eq!(stored.shipping_status, "IN_TRANSIT");
}

#[rstest]
#[tokio::test]
async fn unresolved_event_location_rolls_back(harness: Harness) {
    let shipment = harness.seed("MAEU1234567", "PLANNED");
    harness
        .engine(provider_returning(sample_snapshot("MAEU1234567")))
        .sync(shipment.id)
        .await
        .expect("initial sync");
    let before = harness.repository.summary(shipment.id);

    let mut broken = sample_snapshot("MAEU1234567");
    broken.metadata.shipping_status = "DISCHARGED".to_owned();
    broken.containers[0].events.push(event("ZZZZZ", "Unknown port call", 9));
    let error = harness
        .engine(provider_returning(broken))
        .sync(shipment.id)
        .await
        .expect_err("missing location aborts");

    assert_eq!(
        error,
        SyncError::Storage(ShipmentRepositoryError::missing_reference(
            "location", "ZZZZZ"
        ))
    );
    assert_eq!(harness.repository.summary(shipment.id), before);
    let stored = harness
        .repository
        .find_shipment(shipment.id)
        .await
        .expect("lookup")
        .expect("shipment exists");
    assert_eq!(stored.shipping_status, "IN_TRANSIT");
}

#[rstest]
#[case(WriteStep::DeleteRelated)]
#[case(WriteStep::UpdateScalars)]
#[case(WriteStep::CreateContainerEvent)]
#[case(WriteStep::CreateAis)]
#[tokio::test]
async fn injected_write_failure_rolls_back(harness: Harness, #[case] step: WriteStep) {
    let shipment = harness.seed("MAEU1234567", "PLANNED");
    let engine = harness.engine(provider_returning(sample_snapshot("MAEU1234567")));
    engine.sync(shipment.id).await.expect("initial sync");
    let before = harness.repository.summary(shipment.id);

    harness.repository.inject(step, Fault::Error);
    let error = engine.sync(shipment.id).await.expect_err("fault surfaces");

    assert!(matches!(error, SyncError::Storage(_)));
    assert_eq!(harness.repository.summary(shipment.id), before);
}

#[rstest]
#[tokio::test]
async fn panic_inside_transaction_rolls_back_and_propagates(harness: Harness) {
    let shipment = harness.seed("MAEU1234567", "PLANNED");
    let engine = harness.engine(provider_returning(sample_snapshot("MAEU1234567")));
    engine.sync(shipment.id).await.expect("initial sync");
    let before = harness.repository.summary(shipment.id);

    harness
        .repository
        .inject(WriteStep::CreateContainerEvent, Fault::Panic);
    let outcome = AssertUnwindSafe(engine.sync(shipment.id))
        .catch_unwind()
        .await;

    assert!(outcome.is_err(), "panic should propagate");
    assert_eq!(harness.repository.summary(shipment.id), before);
    engine
        .sync(shipment.id)
        .await
        .expect("lock is released after the panic");
}

#[rstest]
#[tokio::test]
async fn refresh_rejects_users_who_do_not_track_the_shipment(harness: Harness) {
    let shipment = harness.seed("MAEU1234567", "PLANNED");
    let mut provider = MockTrackingProvider::new();
    provider.expect_fetch_shipment().never();
    let engine = harness.engine(provider);
    let stranger = Uuid::new_v4();

    let existing = engine
        .refresh(stranger, shipment.id)
        .await
        .expect_err("foreign shipment rejected");
    let missing = engine
        .refresh(stranger, Uuid::new_v4())
        .await
        .expect_err("unknown shipment rejected");

    assert!(matches!(existing, SyncError::AccessDenied { .. }));
    assert!(matches!(missing, SyncError::AccessDenied { .. }));
    let (existing, missing) = (Error::from(existing), Error::from(missing));
    assert_eq!(existing.code(), ErrorCode::NotFound);
    assert_eq!(existing, missing);
}

#[rstest]
#[tokio::test]
async fn refresh_syncs_for_the_owner(harness: Harness) {
    let shipment = harness.seed("MAEU1234567", "PLANNED");
    let owner = Uuid::new_v4();
    harness.repository.seed_user_link(owner, shipment.id);
    let engine = harness.engine(provider_returning(sample_snapshot("MAEU1234567")));

    let refreshed = engine.refresh(owner, shipment.id).await.expect("owner refresh");

    assert_eq!(refreshed.shipping_status, "IN_TRANSIT");
}

#[rstest]
#[tokio::test]
async fn system_sync_skips_delivered_shipments(harness: Harness) {
    let shipment = harness.seed("MAEU1234567", DELIVERED_STATUS);
    let mut provider = MockTrackingProvider::new();
    provider.expect_fetch_shipment().never();

    let outcome = harness
        .engine(provider)
        .system_sync(shipment.id)
        .await
        .expect("skip is not an error");

    assert!(matches!(outcome, SyncOutcome::SkippedDelivered { .. }));
}

#[rstest]
#[tokio::test]
async fn system_sync_reports_stats(harness: Harness) {
    let shipment = harness.seed("MAEU1234567", "PLANNED");

    let outcome = harness
        .engine(provider_returning(sample_snapshot("MAEU1234567")))
        .system_sync(shipment.id)
        .await
        .expect("sync succeeds");

    let SyncOutcome::Synced { stats, .. } = outcome else {
        panic!("expected a synced outcome");
    };
    assert_eq!(stats.containers, 1);
    assert_eq!(stats.container_events, 2);
    assert_eq!(stats.ais, 1);
}

#[rstest]
#[tokio::test]
async fn unknown_shipment_is_not_found(harness: Harness) {
    let mut provider = MockTrackingProvider::new();
    provider.expect_fetch_shipment().never();
    let id = Uuid::new_v4();

    let error = harness
        .engine(provider)
        .sync(id)
        .await
        .expect_err("unknown id");

    assert_eq!(error, SyncError::NotFound { shipment_id: id });
}

#[rstest]
#[tokio::test]
async fn status_only_snapshot_writes_metadata_and_ais(harness: Harness) {
    let shipment = harness.seed("MAEU1234567", "PLANNED");

    let synced = harness
        .engine(provider_returning(status_only_snapshot("MAEU1234567", "BOOKED")))
        .sync(shipment.id)
        .await
        .expect("sync succeeds");

    assert_eq!(synced.shipping_status, "BOOKED");
    assert_eq!(synced.warnings.len(), 1);
    let summary = harness.repository.summary(shipment.id);
    assert_eq!(summary.ais, 1);
    assert_eq!(summary.containers, 0);
}

#[rstest]
#[tokio::test]
async fn resync_scalars_keeps_graph(harness: Harness) {
    let shipment = harness.seed("MAEU1234567", "PLANNED");
    harness
        .engine(provider_returning(sample_snapshot("MAEU1234567")))
        .sync(shipment.id)
        .await
        .expect("initial sync");
    let before = harness.repository.summary(shipment.id);

    let updated = harness
        .engine(provider_returning(status_only_snapshot("MAEU1234567", "DISCHARGED")))
        .resync_scalars(shipment.id)
        .await
        .expect("scalar resync");

    assert_eq!(updated.shipping_status, "DISCHARGED");
    assert_eq!(harness.repository.summary(shipment.id), before);
}

#[rstest]
#[tokio::test]
async fn details_expose_events_in_provider_order(harness: Harness) {
    let shipment = harness.seed("MAEU1234567", "PLANNED");
    let owner = Uuid::new_v4();
    harness.repository.seed_user_link(owner, shipment.id);
    harness
        .engine(provider_returning(sample_snapshot("MAEU1234567")))
        .sync(shipment.id)
        .await
        .expect("sync succeeds");

    let details = harness
        .repository
        .shipment_details(owner, shipment.id)
        .await
        .expect("details query")
        .expect("details present");

    let events = &details.containers[0].events;
    assert_eq!(events[0].description, "Gate in");
    assert_eq!(
        events[0].facility.as_ref().map(|f| f.locode.as_str()),
        Some(SHANGHAI)
    );
    assert!(events[1].vessel.is_some());
    assert_eq!(
        details.route.pol.as_ref().map(|p| p.location.locode.as_str()),
        Some(SHANGHAI)
    );
    assert!(details.ais.as_ref().is_some_and(|ais| ais.vessel.is_some()));
}
