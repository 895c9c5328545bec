//! Recreates a shipment's owned graph from a snapshot.

use tracing::debug;
use uuid::Uuid;

use crate::domain::ShipmentSnapshot;
use crate::domain::ports::{
    LinkTarget, NewAis, NewContainerEvent, NewRoute, NewRouteSegment, ShipmentGraphWriter,
    ShipmentRepositoryError, SyncStats,
};
use crate::domain::snapshot::SnapshotEvent;

/// Provider-order index as stored in the int4 position columns.
fn position(index: usize) -> Result<i32, ShipmentRepositoryError> {
    i32::try_from(index).map_err(|_| {
        ShipmentRepositoryError::query(format!("provider order {index} exceeds the position column"))
    })
}

/// Write every entity in `snapshot` for `shipment_id` through `writer`.
///
/// The caller owns the transaction and is expected to have emptied the
/// shipment's graph first.
pub(crate) async fn write_snapshot_graph(
    writer: &mut dyn ShipmentGraphWriter,
    shipment_id: Uuid,
    snapshot: &ShipmentSnapshot,
) -> Result<SyncStats, ShipmentRepositoryError> {
    let mut stats = SyncStats::default();
    let link = |index: usize| {
        position(index).map(|position| {
            Some(LinkTarget {
                shipment_id,
                position,
            })
        })
    };

    for (index, location) in snapshot.locations.iter().enumerate() {
        writer
            .find_or_create_location(location, link(index)?)
            .await?;
        stats.locations += 1;
    }

    for (route_type, leg) in snapshot.route.legs() {
        if leg.location.locode.trim().is_empty() {
            continue;
        }
        let location_id = writer.find_or_create_location(&leg.location, None).await?;
        writer
            .create_route(&NewRoute {
                shipment_id,
                location_id,
                route_type,
                date: leg.date,
                is_actual: leg.is_actual,
                predictive_eta: leg.predictive_eta,
            })
            .await?;
        stats.routes += 1;
    }

    for (index, vessel) in snapshot.vessels.iter().enumerate() {
        writer.find_or_create_vessel(vessel, link(index)?).await?;
        stats.vessels += 1;
    }

    for (index, facility) in snapshot.facilities.iter().enumerate() {
        writer.find_or_create_facility(facility, link(index)?).await?;
        stats.facilities += 1;
    }

    for (index, entry) in snapshot.containers.iter().enumerate() {
        let container_id = writer
            .find_or_create_container(&entry.container, link(index)?)
            .await?;
        stats.containers += 1;

        for (order, event) in entry.events.iter().enumerate() {
            let row = resolve_event(writer, shipment_id, container_id, position(order)?, event)
                .await?;
            writer.create_container_event(&row).await?;
            stats.container_events += 1;
        }
    }

    for (index, segment) in snapshot.route_data.segments.iter().enumerate() {
        let segment_id = writer
            .create_route_segment(&NewRouteSegment {
                shipment_id,
                segment_order: position(index)?,
                route_type: segment.route_type.clone(),
            })
            .await?;
        for (point_order, point) in segment.path.iter().enumerate() {
            writer
                .create_route_segment_point(segment_id, position(point_order)?, *point)
                .await?;
        }
        stats.route_segments += 1;
    }

    if let Some(point) = snapshot.route_data.coordinate {
        writer.create_coordinate(shipment_id, point).await?;
        stats.coordinates += 1;
    }

    let ais = &snapshot.route_data.ais;
    let vessel_id = match ais.details.as_ref().and_then(|details| details.vessel) {
        Some(key) => writer.find_vessel(key).await?,
        None => None,
    };
    writer
        .create_ais(&NewAis {
            shipment_id,
            status: ais.status.clone(),
            details: ais.details.clone(),
            vessel_id,
        })
        .await?;
    stats.ais += 1;

    debug!(%shipment_id, ?stats, "shipment graph written");
    Ok(stats)
}

async fn resolve_event(
    writer: &mut dyn ShipmentGraphWriter,
    shipment_id: Uuid,
    container_id: Uuid,
    event_order: i32,
    event: &SnapshotEvent,
) -> Result<NewContainerEvent, ShipmentRepositoryError> {
    let location_id = writer
        .find_location_by_locode(&event.location_locode)
        .await?
        .ok_or_else(|| {
            ShipmentRepositoryError::missing_reference("location", event.location_locode.as_str())
        })?;

    let facility_id = match event.facility_locode.as_deref() {
        Some(locode) if !locode.trim().is_empty() => writer.find_facility_by_locode(locode).await?,
        _ => None,
    };

    let vessel_id = match event.vessel {
        Some(key) => writer.find_vessel(key).await?,
        None => None,
    };

    Ok(NewContainerEvent {
        shipment_id,
        container_id,
        location_id,
        facility_id,
        vessel_id,
        event_order,
        description: event.description.clone(),
        event_type: event.event_type.clone(),
        event_code: event.event_code.clone(),
        status: event.status.clone(),
        date: event.date,
        is_actual: event.is_actual,
        is_additional_event: event.is_additional_event,
        route_type: event.route_type.clone(),
        transport_type: event.transport_type.clone(),
        voyage: event.voyage.clone(),
    })
}
