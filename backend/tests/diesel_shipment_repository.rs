//! Integration tests for `DieselShipmentRepository` against embedded PostgreSQL.
//!
//! Each test provisions its own database from the migrated template and
//! drives the real sync machinery over the Diesel adapter with a scripted
//! provider.
//!
//! # Runtime Strategy
//!
//! Cluster bootstrap blocks, so tests are synchronous and keep a Tokio
//! runtime in the harness for the async repository calls.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::FutureExt as _;
use pg_embedded_setup_unpriv::TemporaryDatabase;
use rstest::{fixture, rstest};
use tidewatch::domain::ports::{
    GraphWork, GraphWriteOutcome, ShipmentGraphWriter, ShipmentRepository,
    ShipmentRepositoryError, SyncStats, TrackingProvider, TrackingProviderError, TrackingRequest,
};
use tidewatch::domain::shipment::DELIVERED_STATUS;
use tidewatch::domain::{
    AddShipmentRequest, ErrorCode, NewShipment, ShipmentSnapshot, ShipmentTrackingService, SyncEngine,
    SyncError,
};
use tidewatch::outbound::persistence::{DbPool, DieselShipmentRepository, PoolConfig};
use tidewatch::test_support::snapshots::{
    CONTAINER_NUMBER, ROTTERDAM, SHANGHAI, event, new_shipment, sample_snapshot,
    status_only_snapshot,
};
use tokio::runtime::Runtime;
use uuid::Uuid;

mod support;

use support::embedded_postgres::count_rows;
use support::pg_embed::shared_cluster;
use support::{handle_cluster_setup_failure, provision_template_database};

const NUMBER: &str = "MAEU240312345";

/// Provider returning whatever snapshot the test last scripted.
#[derive(Default)]
struct ScriptedProvider {
    next: Mutex<Option<ShipmentSnapshot>>,
}

impl ScriptedProvider {
    fn respond_with(&self, snapshot: ShipmentSnapshot) {
        *self.next.lock().expect("provider lock") = Some(snapshot);
    }
}

#[async_trait]
impl TrackingProvider for ScriptedProvider {
    async fn fetch_shipment(
        &self,
        request: &TrackingRequest,
    ) -> Result<ShipmentSnapshot, TrackingProviderError> {
        self.next
            .lock()
            .expect("provider lock")
            .clone()
            .ok_or_else(|| TrackingProviderError::provider(404_u16, request.shipment_number.clone()))
    }
}

struct Harness {
    runtime: Runtime,
    repository: Arc<DieselShipmentRepository>,
    provider: Arc<ScriptedProvider>,
    engine: Arc<SyncEngine>,
    service: ShipmentTrackingService,
    database_url: String,
    _database: TemporaryDatabase,
}

impl Harness {
    fn add(&self, user_id: Uuid, snapshot: ShipmentSnapshot) -> Uuid {
        self.provider.respond_with(snapshot);
        let request = AddShipmentRequest {
            shipment_number: NUMBER.to_owned(),
            shipment_type: "BK".to_owned(),
            sealine_code: "MAEU".to_owned(),
            recipient: Some("  Harbour Imports Ltd  ".to_owned()),
            ..AddShipmentRequest::default()
        };
        self.runtime
            .block_on(self.service.add_shipment(user_id, request))
            .expect("shipment added")
            .id
    }

    fn summary(&self, shipment_id: Uuid) -> tidewatch::domain::ShipmentDataSummary {
        self.runtime
            .block_on(self.repository.data_summary(shipment_id))
            .expect("summary loads")
    }

    fn count(&self, table: &str) -> i64 {
        count_rows(&self.database_url, &format!("SELECT COUNT(*) FROM {table}"))
            .expect("count succeeds")
    }
}

fn setup_harness() -> Result<Harness, String> {
    let runtime = Runtime::new().map_err(|err| err.to_string())?;
    let cluster = shared_cluster()?;
    let database = provision_template_database(cluster).map_err(|err| err.to_string())?;
    let database_url = database.url().to_string();

    let config = PoolConfig::new(&database_url)
        .with_max_size(4)
        .with_min_idle(Some(1));
    let pool = runtime
        .block_on(DbPool::new(config))
        .map_err(|err| err.to_string())?;

    let repository = Arc::new(DieselShipmentRepository::new(pool));
    let provider = Arc::new(ScriptedProvider::default());
    let engine = Arc::new(SyncEngine::new(repository.clone(), provider.clone()));
    let service = ShipmentTrackingService::new(repository.clone(), provider.clone(), engine.clone());

    Ok(Harness {
        runtime,
        repository,
        provider,
        engine,
        service,
        database_url,
        _database: database,
    })
}

#[fixture]
fn harness() -> Option<Harness> {
    match setup_harness() {
        Ok(harness) => Some(harness),
        Err(reason) => handle_cluster_setup_failure(reason),
    }
}

fn create_only(number: &str, status: &str) -> GraphWork {
    let row = new_shipment(number, status);
    GraphWork::new(move |writer| {
        async move {
            let shipment = writer.create_shipment(&row).await?;
            Ok::<_, ShipmentRepositoryError>(GraphWriteOutcome {
                shipment,
                stats: SyncStats::default(),
            })
        }
        .boxed()
    })
}

async fn create_then_reject(
    writer: &mut dyn ShipmentGraphWriter,
    row: NewShipment,
) -> Result<GraphWriteOutcome, ShipmentRepositoryError> {
    writer.create_shipment(&row).await?;
    Err(ShipmentRepositoryError::conflict("rejected after insert"))
}

async fn create_then_panic(
    writer: &mut dyn ShipmentGraphWriter,
    row: NewShipment,
) -> Result<GraphWriteOutcome, ShipmentRepositoryError> {
    writer.create_shipment(&row).await?;
    panic!("graph writer blew up");
}

#[rstest]
fn added_shipment_reads_back_in_provider_order(harness: Option<Harness>) {
    let Some(harness) = harness else { return };
    let user_id = Uuid::new_v4();

    let shipment_id = harness.add(user_id, sample_snapshot(NUMBER));
    let details = harness
        .runtime
        .block_on(harness.service.shipment_details(user_id, shipment_id))
        .expect("details load");

    assert_eq!(details.shipment.shipment_number, NUMBER);
    assert_eq!(details.shipment.shipping_status, "IN_TRANSIT");
    let locodes: Vec<_> = details.locations.iter().map(|l| l.locode.as_str()).collect();
    assert_eq!(locodes, [SHANGHAI, ROTTERDAM]);
    assert!(details.route.prepol.is_none());
    assert_eq!(
        details.route.pol.as_ref().map(|leg| leg.location.locode.as_str()),
        Some(SHANGHAI)
    );
    assert_eq!(
        details.route.pod.as_ref().map(|leg| leg.location.locode.as_str()),
        Some(ROTTERDAM)
    );
    assert!(details.route.postpod.is_none());
    assert_eq!(details.vessels.len(), 1);
    assert_eq!(details.facilities.len(), 1);

    let container = &details.containers[0];
    assert_eq!(container.container.number, CONTAINER_NUMBER);
    let descriptions: Vec<_> = container.events.iter().map(|e| e.description.as_str()).collect();
    assert_eq!(descriptions, ["Gate in", "Vessel departure"]);
    assert!(container.events[0].facility.is_some());
    assert!(container.events[1].vessel.is_some());

    assert_eq!(details.segments[0].points.len(), 3);
    assert!(details.coordinate.is_some());
    let ais = details.ais.expect("ais row written");
    assert_eq!(ais.status, "OK");
    assert_eq!(ais.arrival_port_name.as_deref(), Some("Singapore"));
    assert!(ais.vessel.is_some());
    assert_eq!(
        details.annotations.and_then(|a| a.recipient).as_deref(),
        Some("Harbour Imports Ltd")
    );
}

#[rstest]
fn resync_replaces_the_graph_without_duplicates(harness: Option<Harness>) {
    let Some(harness) = harness else { return };
    let shipment_id = harness.add(Uuid::new_v4(), sample_snapshot(NUMBER));
    let first = harness.summary(shipment_id);

    for _ in 0..2 {
        harness
            .runtime
            .block_on(harness.engine.sync(shipment_id))
            .expect("sync succeeds");
    }

    let summary = harness.summary(shipment_id);
    assert_eq!(summary, first);
    assert_eq!(summary.locations, 2);
    assert_eq!(summary.routes, 2);
    assert_eq!(summary.container_events, 2);
    assert_eq!(summary.route_segment_points, 3);
    assert_eq!(summary.ais, 1);
    assert_eq!(harness.count("locations"), 2);
    assert_eq!(harness.count("vessels"), 1);
    assert_eq!(harness.count("containers"), 1);
}

#[rstest]
fn failed_sync_keeps_the_previous_graph(harness: Option<Harness>) {
    let Some(harness) = harness else { return };
    let shipment_id = harness.add(Uuid::new_v4(), sample_snapshot(NUMBER));
    let before = harness.summary(shipment_id);

    let mut broken = sample_snapshot(NUMBER);
    broken.metadata.shipping_status = "DISCHARGED".to_owned();
    broken.containers[0].events.push(event("ZZZZZ", "Unknown port", 9));
    harness.provider.respond_with(broken);

    let result = harness.runtime.block_on(harness.engine.sync(shipment_id));

    assert!(matches!(
        result,
        Err(SyncError::Storage(ShipmentRepositoryError::MissingReference { .. }))
    ));
    assert_eq!(harness.summary(shipment_id), before);
    let shipment = harness
        .runtime
        .block_on(harness.repository.find_shipment(shipment_id))
        .expect("lookup succeeds")
        .expect("shipment still present");
    assert_eq!(shipment.shipping_status, "IN_TRANSIT");
}

#[rstest]
fn status_only_snapshots_store_a_status_only_ais_row(harness: Option<Harness>) {
    let Some(harness) = harness else { return };
    let user_id = Uuid::new_v4();

    let shipment_id = harness.add(user_id, status_only_snapshot(NUMBER, "BOOKED"));
    let details = harness
        .runtime
        .block_on(harness.repository.shipment_details(user_id, shipment_id))
        .expect("details load")
        .expect("shipment exists");

    let ais = details.ais.expect("status-only row");
    assert_eq!(ais.status, "NOT_ON_BOARD");
    assert!(ais.vessel.is_none());
    assert!(ais.last_event_description.is_none());
    assert!(details.containers.is_empty());
    assert_eq!(
        details.shipment.warnings,
        ["provider is still collecting data"]
    );
}

#[rstest]
fn ownership_is_scoped_to_linked_users(harness: Option<Harness>) {
    let Some(harness) = harness else { return };
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let shipment_id = harness.add(owner, sample_snapshot(NUMBER));

    let repo = &harness.repository;
    let rt = &harness.runtime;
    assert!(rt.block_on(repo.user_owns_shipment(owner, shipment_id)).expect("query"));
    assert!(!rt.block_on(repo.user_owns_shipment(stranger, shipment_id)).expect("query"));
    assert!(rt.block_on(repo.user_tracks_number(owner, NUMBER)).expect("query"));
    assert!(!rt.block_on(repo.user_tracks_number(stranger, NUMBER)).expect("query"));

    let denied = rt
        .block_on(harness.service.shipment_details(stranger, shipment_id))
        .expect_err("stranger cannot read");
    assert_eq!(denied.code(), ErrorCode::NotFound);
}

#[rstest]
fn second_user_links_to_the_existing_shipment(harness: Option<Harness>) {
    let Some(harness) = harness else { return };
    let first = harness.add(Uuid::new_v4(), sample_snapshot(NUMBER));
    let second_user = Uuid::new_v4();

    let second = harness.add(second_user, sample_snapshot(NUMBER));

    assert_eq!(first, second);
    assert_eq!(harness.count("shipments"), 1);
    assert_eq!(harness.count("user_shipments"), 2);
}

#[rstest]
fn refresh_candidates_exclude_delivered_and_fresh_shipments(harness: Option<Harness>) {
    let Some(harness) = harness else { return };
    let rt = &harness.runtime;
    let repo = &harness.repository;
    rt.block_on(repo.run_in_transaction(create_only("MAEU000000001", "IN_TRANSIT")))
        .expect("create in transit");
    rt.block_on(repo.run_in_transaction(create_only("MAEU000000002", "delivered")))
        .expect("create delivered");
    assert!(DELIVERED_STATUS.eq_ignore_ascii_case("delivered"));

    let all = rt
        .block_on(repo.list_refresh_candidates(None, None))
        .expect("list");
    let numbers: Vec<_> = all.iter().map(|s| s.shipment_number.as_str()).collect();
    assert_eq!(numbers, ["MAEU000000001"]);

    let long_ago = chrono::Utc::now() - chrono::TimeDelta::hours(1);
    let stale = rt
        .block_on(repo.list_refresh_candidates(Some(long_ago), None))
        .expect("list");
    assert!(stale.is_empty());

    let capped = rt
        .block_on(repo.list_refresh_candidates(None, Some(0)))
        .expect("list");
    assert!(capped.is_empty());
}

#[rstest]
fn duplicate_shipment_numbers_conflict(harness: Option<Harness>) {
    let Some(harness) = harness else { return };
    let rt = &harness.runtime;
    let repo = &harness.repository;
    rt.block_on(repo.run_in_transaction(create_only(NUMBER, "IN_TRANSIT")))
        .expect("first insert");

    let duplicate = rt.block_on(repo.run_in_transaction(create_only(NUMBER, "IN_TRANSIT")));

    assert!(matches!(
        duplicate,
        Err(ShipmentRepositoryError::Conflict { .. })
    ));
    assert_eq!(harness.count("shipments"), 1);
}

#[rstest]
fn rejected_work_is_rolled_back(harness: Option<Harness>) {
    let Some(harness) = harness else { return };
    let row = new_shipment(NUMBER, "IN_TRANSIT");
    let work = GraphWork::new(move |writer| create_then_reject(writer, row).boxed());

    let result = harness.runtime.block_on(harness.repository.run_in_transaction(work));

    assert_eq!(
        result,
        Err(ShipmentRepositoryError::conflict("rejected after insert"))
    );
    assert_eq!(harness.count("shipments"), 0);
}

#[rstest]
fn panicking_work_is_rolled_back_and_resumed(harness: Option<Harness>) {
    let Some(harness) = harness else { return };
    let row = new_shipment(NUMBER, "IN_TRANSIT");
    let work = GraphWork::new(move |writer| create_then_panic(writer, row).boxed());

    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        harness
            .runtime
            .block_on(harness.repository.run_in_transaction(work))
    }));

    assert!(outcome.is_err(), "panic is resumed after rollback");
    assert_eq!(harness.count("shipments"), 0);
    let lookup = harness
        .runtime
        .block_on(harness.repository.find_shipment_by_number(NUMBER))
        .expect("pool still usable");
    assert!(lookup.is_none());
}
