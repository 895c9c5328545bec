//! Transactional in-memory [`ShipmentRepository`].
//!
//! Transactions run against a private copy of the store and replace it on
//! commit. An error or panic inside the unit of work discards the copy, so
//! rollback behaviour matches the database adapter. Faults can be injected at
//! specific write steps to exercise those paths.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::FutureExt as _;
use mockable::Clock;
use uuid::Uuid;

use crate::domain::ports::{
    DeletionReport, GraphWork, GraphWriteOutcome, Identified, LinkTarget, NewAis,
    NewContainerEvent, NewRoute, NewRouteSegment, ShipmentGraphWriter, ShipmentRepository,
    ShipmentRepositoryError,
};
use crate::domain::shipment_details::{
    AisView, ContainerEventView, ContainerView, RoutePointView, RouteView, SegmentView,
};
use crate::domain::{
    ContainerRecord, FacilityRecord, GeoPoint, LocationRecord, NewShipment, RouteType, Shipment,
    ShipmentDataSummary, ShipmentDetails, ShipmentScalars, UserAnnotations, VesselKey,
    VesselRecord,
};

/// Write primitive a fault can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    DeleteRelated,
    UpdateScalars,
    CreateContainerEvent,
    CreateAis,
}

/// How an injected fault manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Return a query error.
    Error,
    /// Panic inside the transaction.
    Panic,
}

#[derive(Debug, Clone)]
struct Link {
    shipment_id: Uuid,
    ref_id: Uuid,
    position: i32,
}

#[derive(Debug, Clone, Default)]
struct Store {
    shipments: BTreeMap<Uuid, Shipment>,
    user_links: Vec<(Uuid, Uuid, UserAnnotations)>,
    locations: Vec<(Uuid, LocationRecord)>,
    vessels: Vec<(Uuid, VesselRecord)>,
    facilities: Vec<(Uuid, FacilityRecord)>,
    containers: Vec<(Uuid, ContainerRecord)>,
    location_links: Vec<Link>,
    vessel_links: Vec<Link>,
    facility_links: Vec<Link>,
    container_links: Vec<Link>,
    routes: Vec<NewRoute>,
    events: Vec<NewContainerEvent>,
    segments: Vec<(Uuid, NewRouteSegment)>,
    points: Vec<(Uuid, i32, GeoPoint)>,
    coordinates: Vec<(Uuid, GeoPoint, DateTime<Utc>)>,
    ais: Vec<(NewAis, DateTime<Utc>)>,
}

fn find_id<T>(rows: &[(Uuid, T)], matches: impl Fn(&T) -> bool) -> Option<Uuid> {
    rows.iter()
        .find(|(_, record)| matches(record))
        .map(|(id, _)| *id)
}

fn record_by_id<T: Clone>(rows: &[(Uuid, T)], id: Uuid) -> Option<T> {
    rows.iter()
        .find(|(row_id, _)| *row_id == id)
        .map(|(_, record)| record.clone())
}

fn attach(links: &mut Vec<Link>, target: Option<LinkTarget>, ref_id: Uuid) {
    let Some(target) = target else { return };
    let exists = links
        .iter()
        .any(|link| link.shipment_id == target.shipment_id && link.ref_id == ref_id);
    if !exists {
        links.push(Link {
            shipment_id: target.shipment_id,
            ref_id,
            position: target.position,
        });
    }
}

fn linked<T: Clone>(links: &[Link], rows: &[(Uuid, T)], shipment_id: Uuid) -> Vec<T> {
    let mut owned: Vec<&Link> = links
        .iter()
        .filter(|link| link.shipment_id == shipment_id)
        .collect();
    owned.sort_by_key(|link| link.position);
    owned
        .into_iter()
        .filter_map(|link| record_by_id(rows, link.ref_id))
        .collect()
}

fn drain_owned<T>(rows: &mut Vec<T>, owned: impl Fn(&T) -> bool) -> u64 {
    let before = rows.len();
    rows.retain(|row| !owned(row));
    (before - rows.len()) as u64
}

impl Store {
    fn summary(&self, shipment_id: Uuid) -> ShipmentDataSummary {
        let count = |n: usize| n as u64;
        let segment_ids: Vec<Uuid> = self
            .segments
            .iter()
            .filter(|(_, segment)| segment.shipment_id == shipment_id)
            .map(|(id, _)| *id)
            .collect();
        ShipmentDataSummary {
            shipment_id,
            locations: count(self.location_links.iter().filter(|l| l.shipment_id == shipment_id).count()),
            routes: count(self.routes.iter().filter(|r| r.shipment_id == shipment_id).count()),
            vessels: count(self.vessel_links.iter().filter(|l| l.shipment_id == shipment_id).count()),
            facilities: count(self.facility_links.iter().filter(|l| l.shipment_id == shipment_id).count()),
            containers: count(self.container_links.iter().filter(|l| l.shipment_id == shipment_id).count()),
            container_events: count(self.events.iter().filter(|e| e.shipment_id == shipment_id).count()),
            route_segments: count(segment_ids.len()),
            route_segment_points: count(
                self.points
                    .iter()
                    .filter(|(segment_id, _, _)| segment_ids.contains(segment_id))
                    .count(),
            ),
            coordinates: count(self.coordinates.iter().filter(|(id, _, _)| *id == shipment_id).count()),
            ais: count(self.ais.iter().filter(|(row, _)| row.shipment_id == shipment_id).count()),
        }
    }

    fn details(&self, user_id: Uuid, shipment_id: Uuid) -> Option<ShipmentDetails> {
        let shipment = self.shipments.get(&shipment_id)?.clone();
        let annotations = self
            .user_links
            .iter()
            .find(|(user, shipment, _)| *user == user_id && *shipment == shipment_id)
            .map(|(_, _, annotations)| annotations.clone());

        let mut route = RouteView::default();
        for row in self.routes.iter().filter(|r| r.shipment_id == shipment_id) {
            let Some(location) = record_by_id(&self.locations, row.location_id) else {
                continue;
            };
            let view = Some(RoutePointView {
                location,
                date: row.date,
                is_actual: row.is_actual,
                predictive_eta: row.predictive_eta,
            });
            match row.route_type {
                RouteType::Prepol => route.prepol = view,
                RouteType::Pol => route.pol = view,
                RouteType::Pod => route.pod = view,
                RouteType::Postpod => route.postpod = view,
            }
        }

        let mut container_links: Vec<&Link> = self
            .container_links
            .iter()
            .filter(|link| link.shipment_id == shipment_id)
            .collect();
        container_links.sort_by_key(|link| link.position);
        let containers = container_links
            .into_iter()
            .filter_map(|link| {
                let container = record_by_id(&self.containers, link.ref_id)?;
                let mut events: Vec<&NewContainerEvent> = self
                    .events
                    .iter()
                    .filter(|e| e.shipment_id == shipment_id && e.container_id == link.ref_id)
                    .collect();
                events.sort_by_key(|e| e.event_order);
                let events = events
                    .into_iter()
                    .filter_map(|e| {
                        Some(ContainerEventView {
                            location: record_by_id(&self.locations, e.location_id)?,
                            facility: e.facility_id.and_then(|id| record_by_id(&self.facilities, id)),
                            vessel: e.vessel_id.and_then(|id| record_by_id(&self.vessels, id)),
                            description: e.description.clone(),
                            event_type: e.event_type.clone(),
                            event_code: e.event_code.clone(),
                            status: e.status.clone(),
                            date: e.date,
                            is_actual: e.is_actual,
                            is_additional_event: e.is_additional_event,
                            route_type: e.route_type.clone(),
                            transport_type: e.transport_type.clone(),
                            voyage: e.voyage.clone(),
                        })
                    })
                    .collect();
                Some(ContainerView { container, events })
            })
            .collect();

        let mut segments: Vec<&(Uuid, NewRouteSegment)> = self
            .segments
            .iter()
            .filter(|(_, segment)| segment.shipment_id == shipment_id)
            .collect();
        segments.sort_by_key(|(_, segment)| segment.segment_order);
        let segments = segments
            .into_iter()
            .map(|(segment_id, segment)| {
                let mut points: Vec<&(Uuid, i32, GeoPoint)> = self
                    .points
                    .iter()
                    .filter(|(id, _, _)| id == segment_id)
                    .collect();
                points.sort_by_key(|(_, order, _)| *order);
                SegmentView {
                    route_type: segment.route_type.clone(),
                    points: points.into_iter().map(|(_, _, point)| *point).collect(),
                }
            })
            .collect();

        let coordinate = self
            .coordinates
            .iter()
            .filter(|(id, _, _)| *id == shipment_id)
            .max_by_key(|(_, _, at)| *at)
            .map(|(_, point, _)| *point);

        let ais = self
            .ais
            .iter()
            .filter(|(row, _)| row.shipment_id == shipment_id)
            .max_by_key(|(_, at)| *at)
            .map(|(row, at)| {
                let details = row.details.as_ref();
                AisView {
                    status: row.status.clone(),
                    last_event_description: details.map(|d| d.last_event.description.clone()),
                    last_event_date: details.and_then(|d| d.last_event.date),
                    last_event_voyage: details.map(|d| d.last_event.voyage.clone()),
                    discharge_port_name: details.and_then(|d| d.discharge_port.name.clone()),
                    departure_port_name: details.and_then(|d| d.departure_port.name.clone()),
                    arrival_port_name: details.and_then(|d| d.arrival_port.name.clone()),
                    arrival_port_date: details.and_then(|d| d.arrival_port.date),
                    vessel: row.vessel_id.and_then(|id| record_by_id(&self.vessels, id)),
                    last_vessel_position: details
                        .and_then(|d| d.last_vessel_position.as_ref())
                        .map(|p| p.point),
                    updated_at: *at,
                }
            });

        Some(ShipmentDetails {
            shipment,
            annotations,
            locations: linked(&self.location_links, &self.locations, shipment_id),
            route,
            vessels: linked(&self.vessel_links, &self.vessels, shipment_id),
            facilities: linked(&self.facility_links, &self.facilities, shipment_id),
            containers,
            segments,
            coordinate,
            ais,
        })
    }
}

/// In-memory repository with copy-on-write transactions.
pub struct InMemoryShipmentRepository {
    store: Mutex<Store>,
    transactions: tokio::sync::Mutex<()>,
    faults: Arc<Mutex<Vec<(WriteStep, Fault)>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryShipmentRepository {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(Store::default()),
            transactions: tokio::sync::Mutex::new(()),
            faults: Arc::new(Mutex::new(Vec::new())),
            clock,
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, Store> {
        match self.store.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("store mutex"),
        }
    }

    /// Insert a shipment directly, stamped with `updated_at`.
    pub fn seed_shipment(&self, shipment: &NewShipment, updated_at: DateTime<Utc>) -> Shipment {
        let row = Shipment {
            id: Uuid::new_v4(),
            shipment_number: shipment.shipment_number.clone(),
            shipment_type: shipment.shipment_type.clone(),
            sealine_code: shipment.sealine_code.clone(),
            sealine_name: shipment.sealine_name.clone(),
            shipping_status: shipment.shipping_status.clone(),
            warnings: shipment.warnings.clone(),
            created_at: updated_at,
            updated_at,
        };
        self.lock_store().shipments.insert(row.id, row.clone());
        row
    }

    /// Link a user to a shipment directly.
    pub fn seed_user_link(&self, user_id: Uuid, shipment_id: Uuid) {
        self.lock_store()
            .user_links
            .push((user_id, shipment_id, UserAnnotations::default()));
    }

    /// Fail or panic the next time `step` runs inside a transaction.
    pub fn inject(&self, step: WriteStep, fault: Fault) {
        match self.faults.lock() {
            Ok(mut faults) => faults.push((step, fault)),
            Err(_) => panic!("faults mutex"),
        }
    }

    /// Number of shipments currently stored.
    pub fn shipment_count(&self) -> usize {
        self.lock_store().shipments.len()
    }

    /// Number of location rows shared across shipments.
    pub fn location_count(&self) -> usize {
        self.lock_store().locations.len()
    }

    /// Synchronous row counts for assertions outside async contexts.
    pub fn summary(&self, shipment_id: Uuid) -> ShipmentDataSummary {
        self.lock_store().summary(shipment_id)
    }
}

struct InMemoryGraphWriter {
    store: Store,
    faults: Arc<Mutex<Vec<(WriteStep, Fault)>>>,
    now: DateTime<Utc>,
}

impl InMemoryGraphWriter {
    fn check(&self, step: WriteStep) -> Result<(), ShipmentRepositoryError> {
        let fault = {
            let mut faults = match self.faults.lock() {
                Ok(faults) => faults,
                Err(_) => panic!("faults mutex"),
            };
            let index = faults.iter().position(|(s, _)| *s == step);
            index.map(|index| faults.remove(index).1)
        };
        match fault {
            None => Ok(()),
            Some(Fault::Error) => Err(ShipmentRepositoryError::query(format!(
                "injected failure at {step:?}"
            ))),
            Some(Fault::Panic) => panic!("injected panic at {step:?}"),
        }
    }
}

#[async_trait]
impl ShipmentGraphWriter for InMemoryGraphWriter {
    async fn delete_all_related(
        &mut self,
        shipment_id: Uuid,
    ) -> Result<DeletionReport, ShipmentRepositoryError> {
        self.check(WriteStep::DeleteRelated)?;
        let store = &mut self.store;
        let owned_segments: Vec<Uuid> = store
            .segments
            .iter()
            .filter(|(_, s)| s.shipment_id == shipment_id)
            .map(|(id, _)| *id)
            .collect();

        let ais = drain_owned(&mut store.ais, |(row, _)| row.shipment_id == shipment_id);
        let coordinates = drain_owned(&mut store.coordinates, |(id, _, _)| *id == shipment_id);
        drain_owned(&mut store.points, |(id, _, _)| owned_segments.contains(id));
        let route_segments = drain_owned(&mut store.segments, |(_, s)| s.shipment_id == shipment_id);
        drain_owned(&mut store.events, |e| e.shipment_id == shipment_id);
        let containers = drain_owned(&mut store.container_links, |l| l.shipment_id == shipment_id);
        let facilities = drain_owned(&mut store.facility_links, |l| l.shipment_id == shipment_id);
        let vessels = drain_owned(&mut store.vessel_links, |l| l.shipment_id == shipment_id);
        let routes = drain_owned(&mut store.routes, |r| r.shipment_id == shipment_id);
        let locations = drain_owned(&mut store.location_links, |l| l.shipment_id == shipment_id);

        Ok(DeletionReport {
            ais,
            coordinates,
            route_segments,
            containers,
            facilities,
            vessels,
            routes,
            locations,
        })
    }

    async fn create_shipment(
        &mut self,
        shipment: &NewShipment,
    ) -> Result<Shipment, ShipmentRepositoryError> {
        if self
            .store
            .shipments
            .values()
            .any(|s| s.shipment_number == shipment.shipment_number)
        {
            return Err(ShipmentRepositoryError::conflict(format!(
                "shipment number {} already exists",
                shipment.shipment_number
            )));
        }
        let row = Shipment {
            id: Uuid::new_v4(),
            shipment_number: shipment.shipment_number.clone(),
            shipment_type: shipment.shipment_type.clone(),
            sealine_code: shipment.sealine_code.clone(),
            sealine_name: shipment.sealine_name.clone(),
            shipping_status: shipment.shipping_status.clone(),
            warnings: shipment.warnings.clone(),
            created_at: self.now,
            updated_at: self.now,
        };
        self.store.shipments.insert(row.id, row.clone());
        Ok(row)
    }

    async fn link_user(
        &mut self,
        user_id: Uuid,
        shipment_id: Uuid,
        annotations: &UserAnnotations,
    ) -> Result<(), ShipmentRepositoryError> {
        if !self.store.shipments.contains_key(&shipment_id) {
            return Err(ShipmentRepositoryError::missing_reference(
                "shipment",
                shipment_id.to_string(),
            ));
        }
        let links = &mut self.store.user_links;
        match links
            .iter_mut()
            .find(|(user, shipment, _)| *user == user_id && *shipment == shipment_id)
        {
            Some(existing) => existing.2 = annotations.clone(),
            None => links.push((user_id, shipment_id, annotations.clone())),
        }
        Ok(())
    }

    async fn update_shipment_scalars(
        &mut self,
        shipment_id: Uuid,
        scalars: &ShipmentScalars,
    ) -> Result<Shipment, ShipmentRepositoryError> {
        self.check(WriteStep::UpdateScalars)?;
        let now = self.now;
        let shipment = self.store.shipments.get_mut(&shipment_id).ok_or_else(|| {
            ShipmentRepositoryError::missing_reference("shipment", shipment_id.to_string())
        })?;
        shipment.sealine_name = scalars.sealine_name.clone();
        shipment.shipping_status = scalars.shipping_status.clone();
        shipment.warnings = scalars.warnings.clone();
        shipment.updated_at = now;
        Ok(shipment.clone())
    }

    async fn find_or_create_location(
        &mut self,
        location: &LocationRecord,
        link: Option<LinkTarget>,
    ) -> Result<Uuid, ShipmentRepositoryError> {
        let id = match find_id(&self.store.locations, |l| l.locode == location.locode) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                self.store.locations.push((id, location.clone()));
                id
            }
        };
        attach(&mut self.store.location_links, link, id);
        Ok(id)
    }

    async fn find_or_create_vessel(
        &mut self,
        vessel: &VesselRecord,
        link: Option<LinkTarget>,
    ) -> Result<Uuid, ShipmentRepositoryError> {
        let key = vessel.key();
        let id = match find_id(&self.store.vessels, |v| v.key() == key) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                self.store.vessels.push((id, vessel.clone()));
                id
            }
        };
        attach(&mut self.store.vessel_links, link, id);
        Ok(id)
    }

    async fn find_or_create_facility(
        &mut self,
        facility: &FacilityRecord,
        link: Option<LinkTarget>,
    ) -> Result<Uuid, ShipmentRepositoryError> {
        let id = match find_id(&self.store.facilities, |f| f.locode == facility.locode) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                self.store.facilities.push((id, facility.clone()));
                id
            }
        };
        attach(&mut self.store.facility_links, link, id);
        Ok(id)
    }

    async fn find_or_create_container(
        &mut self,
        container: &ContainerRecord,
        link: Option<LinkTarget>,
    ) -> Result<Uuid, ShipmentRepositoryError> {
        let id = match find_id(&self.store.containers, |c| c.number == container.number) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                self.store.containers.push((id, container.clone()));
                id
            }
        };
        attach(&mut self.store.container_links, link, id);
        Ok(id)
    }

    async fn find_location_by_locode(
        &mut self,
        locode: &str,
    ) -> Result<Option<Uuid>, ShipmentRepositoryError> {
        Ok(find_id(&self.store.locations, |l| l.locode == locode))
    }

    async fn find_facility_by_locode(
        &mut self,
        locode: &str,
    ) -> Result<Option<Uuid>, ShipmentRepositoryError> {
        Ok(find_id(&self.store.facilities, |f| f.locode == locode))
    }

    async fn find_vessel(
        &mut self,
        key: VesselKey,
    ) -> Result<Option<Uuid>, ShipmentRepositoryError> {
        Ok(find_id(&self.store.vessels, |v| v.key() == key))
    }

    async fn create_route(&mut self, route: &NewRoute) -> Result<(), ShipmentRepositoryError> {
        self.store.routes.push(route.clone());
        Ok(())
    }

    async fn create_container_event(
        &mut self,
        event: &NewContainerEvent,
    ) -> Result<(), ShipmentRepositoryError> {
        self.check(WriteStep::CreateContainerEvent)?;
        self.store.events.push(event.clone());
        Ok(())
    }

    async fn create_route_segment(
        &mut self,
        segment: &NewRouteSegment,
    ) -> Result<Uuid, ShipmentRepositoryError> {
        let id = Uuid::new_v4();
        self.store.segments.push((id, segment.clone()));
        Ok(id)
    }

    async fn create_route_segment_point(
        &mut self,
        segment_id: Uuid,
        point_order: i32,
        point: GeoPoint,
    ) -> Result<(), ShipmentRepositoryError> {
        self.store.points.push((segment_id, point_order, point));
        Ok(())
    }

    async fn create_coordinate(
        &mut self,
        shipment_id: Uuid,
        point: GeoPoint,
    ) -> Result<(), ShipmentRepositoryError> {
        self.store.coordinates.push((shipment_id, point, self.now));
        Ok(())
    }

    async fn create_ais(&mut self, ais: &NewAis) -> Result<(), ShipmentRepositoryError> {
        self.check(WriteStep::CreateAis)?;
        self.store.ais.push((ais.clone(), self.now));
        Ok(())
    }
}

#[async_trait]
impl ShipmentRepository for InMemoryShipmentRepository {
    async fn find_shipment(&self, id: Uuid) -> Result<Option<Shipment>, ShipmentRepositoryError> {
        Ok(self.lock_store().shipments.get(&id).cloned())
    }

    async fn find_shipment_by_number(
        &self,
        shipment_number: &str,
    ) -> Result<Option<Shipment>, ShipmentRepositoryError> {
        Ok(self
            .lock_store()
            .shipments
            .values()
            .find(|s| s.shipment_number == shipment_number)
            .cloned())
    }

    async fn user_owns_shipment(
        &self,
        user_id: Uuid,
        shipment_id: Uuid,
    ) -> Result<bool, ShipmentRepositoryError> {
        Ok(self
            .lock_store()
            .user_links
            .iter()
            .any(|(user, shipment, _)| *user == user_id && *shipment == shipment_id))
    }

    async fn user_tracks_number(
        &self,
        user_id: Uuid,
        shipment_number: &str,
    ) -> Result<bool, ShipmentRepositoryError> {
        let store = self.lock_store();
        Ok(store.user_links.iter().any(|(user, shipment_id, _)| {
            *user == user_id
                && store
                    .shipments
                    .get(shipment_id)
                    .is_some_and(|s| s.shipment_number == shipment_number)
        }))
    }

    async fn list_refresh_candidates(
        &self,
        updated_before: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<Shipment>, ShipmentRepositoryError> {
        let store = self.lock_store();
        let mut candidates: Vec<Shipment> = store
            .shipments
            .values()
            .filter(|s| !s.is_delivered())
            .filter(|s| updated_before.is_none_or(|cutoff| s.updated_at < cutoff))
            .cloned()
            .collect();
        candidates.sort_by_key(|s| s.updated_at);
        if let Some(limit) = limit {
            candidates.truncate(limit);
        }
        Ok(candidates)
    }

    async fn find_location_by_locode(
        &self,
        locode: &str,
    ) -> Result<Option<Identified<LocationRecord>>, ShipmentRepositoryError> {
        Ok(self
            .lock_store()
            .locations
            .iter()
            .find(|(_, l)| l.locode == locode)
            .map(|(id, record)| Identified {
                id: *id,
                record: record.clone(),
            }))
    }

    async fn find_vessel(
        &self,
        key: VesselKey,
    ) -> Result<Option<Identified<VesselRecord>>, ShipmentRepositoryError> {
        Ok(self
            .lock_store()
            .vessels
            .iter()
            .find(|(_, v)| v.key() == key)
            .map(|(id, record)| Identified {
                id: *id,
                record: record.clone(),
            }))
    }

    async fn find_facility_by_locode(
        &self,
        locode: &str,
    ) -> Result<Option<Identified<FacilityRecord>>, ShipmentRepositoryError> {
        Ok(self
            .lock_store()
            .facilities
            .iter()
            .find(|(_, f)| f.locode == locode)
            .map(|(id, record)| Identified {
                id: *id,
                record: record.clone(),
            }))
    }

    async fn find_container_by_number(
        &self,
        number: &str,
    ) -> Result<Option<Identified<ContainerRecord>>, ShipmentRepositoryError> {
        Ok(self
            .lock_store()
            .containers
            .iter()
            .find(|(_, c)| c.number == number)
            .map(|(id, record)| Identified {
                id: *id,
                record: record.clone(),
            }))
    }

    async fn shipment_details(
        &self,
        user_id: Uuid,
        shipment_id: Uuid,
    ) -> Result<Option<ShipmentDetails>, ShipmentRepositoryError> {
        Ok(self.lock_store().details(user_id, shipment_id))
    }

    async fn data_summary(
        &self,
        shipment_id: Uuid,
    ) -> Result<ShipmentDataSummary, ShipmentRepositoryError> {
        Ok(self.lock_store().summary(shipment_id))
    }

    async fn run_in_transaction(
        &self,
        work: GraphWork,
    ) -> Result<GraphWriteOutcome, ShipmentRepositoryError> {
        let _serialised = self.transactions.lock().await;
        let mut writer = InMemoryGraphWriter {
            store: self.lock_store().clone(),
            faults: Arc::clone(&self.faults),
            now: self.clock.utc(),
        };

        let result = AssertUnwindSafe(work.run(&mut writer)).catch_unwind().await;
        match result {
            Ok(Ok(outcome)) => {
                *self.lock_store() = writer.store;
                Ok(outcome)
            }
            Ok(Err(error)) => Err(error),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
