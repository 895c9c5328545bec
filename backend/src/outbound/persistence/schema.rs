//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Regenerate with
//! `diesel print-schema` against a migrated database when migrations change.

diesel::table! {
    /// Root shipment aggregate. `shipment_number` is globally unique.
    shipments (id) {
        id -> Uuid,
        shipment_number -> Varchar,
        shipment_type -> Varchar,
        sealine_code -> Varchar,
        sealine_name -> Varchar,
        shipping_status -> Varchar,
        warnings -> Array<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Users tracking a shipment, with their private annotations.
    user_shipments (user_id, shipment_id) {
        user_id -> Uuid,
        shipment_id -> Uuid,
        recipient -> Nullable<Varchar>,
        address -> Nullable<Varchar>,
        notes -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Shared location reference data keyed by `locode`.
    locations (id) {
        id -> Uuid,
        locode -> Varchar,
        name -> Varchar,
        state -> Nullable<Varchar>,
        country -> Varchar,
        country_code -> Varchar,
        lat -> Nullable<Float8>,
        lng -> Nullable<Float8>,
        timezone -> Varchar,
    }
}

diesel::table! {
    /// Shared vessel reference data keyed by `(imo, mmsi)`.
    vessels (id) {
        id -> Uuid,
        name -> Varchar,
        imo -> Int8,
        mmsi -> Int8,
        call_sign -> Varchar,
        flag -> Varchar,
    }
}

diesel::table! {
    /// Shared facility reference data keyed by `locode`.
    facilities (id) {
        id -> Uuid,
        locode -> Varchar,
        name -> Varchar,
        country_code -> Varchar,
        bic_code -> Nullable<Varchar>,
        smdg_code -> Nullable<Varchar>,
        lat -> Nullable<Float8>,
        lng -> Nullable<Float8>,
    }
}

diesel::table! {
    /// Shared container reference data keyed by `number`.
    containers (id) {
        id -> Uuid,
        number -> Varchar,
        iso_code -> Varchar,
        size_type -> Varchar,
        status -> Varchar,
    }
}

diesel::table! {
    shipment_locations (shipment_id, location_id) {
        shipment_id -> Uuid,
        location_id -> Uuid,
        position -> Int4,
    }
}

diesel::table! {
    shipment_vessels (shipment_id, vessel_id) {
        shipment_id -> Uuid,
        vessel_id -> Uuid,
        position -> Int4,
    }
}

diesel::table! {
    shipment_facilities (shipment_id, facility_id) {
        shipment_id -> Uuid,
        facility_id -> Uuid,
        position -> Int4,
    }
}

diesel::table! {
    shipment_containers (shipment_id, container_id) {
        shipment_id -> Uuid,
        container_id -> Uuid,
        position -> Int4,
    }
}

diesel::table! {
    /// One row per populated route leg.
    shipment_routes (id) {
        id -> Uuid,
        shipment_id -> Uuid,
        location_id -> Uuid,
        route_type -> Varchar,
        date -> Nullable<Timestamptz>,
        is_actual -> Bool,
        predictive_eta -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    /// Container events, cascading from `shipment_containers`.
    container_events (id) {
        id -> Uuid,
        shipment_id -> Uuid,
        container_id -> Uuid,
        location_id -> Uuid,
        facility_id -> Nullable<Uuid>,
        vessel_id -> Nullable<Uuid>,
        event_order -> Int4,
        description -> Text,
        event_type -> Nullable<Varchar>,
        event_code -> Nullable<Varchar>,
        status -> Varchar,
        date -> Nullable<Timestamptz>,
        is_actual -> Bool,
        is_additional_event -> Bool,
        route_type -> Varchar,
        transport_type -> Nullable<Varchar>,
        voyage -> Nullable<Varchar>,
    }
}

diesel::table! {
    route_segments (id) {
        id -> Uuid,
        shipment_id -> Uuid,
        segment_order -> Int4,
        route_type -> Varchar,
    }
}

diesel::table! {
    route_segment_points (id) {
        id -> Uuid,
        segment_id -> Uuid,
        point_order -> Int4,
        lat -> Float8,
        lng -> Float8,
    }
}

diesel::table! {
    shipment_coordinates (id) {
        id -> Uuid,
        shipment_id -> Uuid,
        lat -> Float8,
        lng -> Float8,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// AIS summaries. Port columns hold JSONB port objects.
    ais_snapshots (id) {
        id -> Uuid,
        shipment_id -> Uuid,
        vessel_id -> Nullable<Uuid>,
        status -> Varchar,
        last_event_description -> Nullable<Text>,
        last_event_date -> Nullable<Timestamptz>,
        last_event_voyage -> Nullable<Varchar>,
        discharge_port -> Nullable<Jsonb>,
        departure_port -> Nullable<Jsonb>,
        arrival_port -> Nullable<Jsonb>,
        last_vessel_lat -> Nullable<Float8>,
        last_vessel_lng -> Nullable<Float8>,
        last_vessel_position_at -> Nullable<Timestamptz>,
        provider_updated_at -> Nullable<Timestamptz>,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(user_shipments -> shipments (shipment_id));
diesel::joinable!(shipment_locations -> shipments (shipment_id));
diesel::joinable!(shipment_locations -> locations (location_id));
diesel::joinable!(shipment_vessels -> shipments (shipment_id));
diesel::joinable!(shipment_vessels -> vessels (vessel_id));
diesel::joinable!(shipment_facilities -> shipments (shipment_id));
diesel::joinable!(shipment_facilities -> facilities (facility_id));
diesel::joinable!(shipment_containers -> shipments (shipment_id));
diesel::joinable!(shipment_containers -> containers (container_id));
diesel::joinable!(shipment_routes -> shipments (shipment_id));
diesel::joinable!(shipment_routes -> locations (location_id));
diesel::joinable!(route_segments -> shipments (shipment_id));
diesel::joinable!(route_segment_points -> route_segments (segment_id));
diesel::joinable!(shipment_coordinates -> shipments (shipment_id));
diesel::joinable!(ais_snapshots -> shipments (shipment_id));

diesel::allow_tables_to_appear_in_same_query!(
    shipments,
    user_shipments,
    locations,
    vessels,
    facilities,
    containers,
    shipment_locations,
    shipment_vessels,
    shipment_facilities,
    shipment_containers,
    shipment_routes,
    container_events,
    route_segments,
    route_segment_points,
    shipment_coordinates,
    ais_snapshots,
);
