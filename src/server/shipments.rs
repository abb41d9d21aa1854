use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
};

use crate::server::AppState;
use crate::server::dto::{DeleteShipmentParams, GetShipmentParams, UpdateShipmentParams};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::server::validation::parse_timestamp;
use crate::types::{Shipment, ShipmentRequest};

pub fn shipments_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_shipments))
        .route("/shipment", get(get_shipment))
        .route("/update", post(update_shipment))
        .route("/delete", delete(delete_shipment))
}

pub async fn list_shipments(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let shipments = state.store.list_shipments()?;
    Ok::<_, ApiError>(Json(ApiResponse::success(shipments)))
}

pub async fn get_shipment(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GetShipmentParams>,
) -> impl IntoResponse {
    let Some(id) = params.shipment_id else {
        return Err(ApiError::bad_request("You have to provide the shipmentId"));
    };

    let shipment = state
        .store
        .get_shipment(id)?
        .or_bad_request("Shipment not found by shipmentId")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(shipment)))
}

/// The shipment workflow. The store runs the whole thing — shipment insert,
/// per-item source debit and destination credit, manifest, audits — in one
/// transaction; a failure on any line leaves nothing behind.
pub async fn create_shipment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ShipmentRequest>,
) -> impl IntoResponse {
    let shipment = state.store.create_shipment(&req)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(shipment)))
}

pub async fn update_shipment(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UpdateShipmentParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let old = store
        .get_shipment(params.shipment_id)?
        .or_bad_request("Shipment not found by shipmentId")?;

    if params.source.is_none()
        && params.destination.is_none()
        && params.current_location.is_none()
        && params.departure_time.is_none()
        && params.estimated_arrival_time.is_none()
        && params.actual_arrival_time.is_none()
        && params.shipment_status.is_none()
    {
        return Err(ApiError::bad_request("No value for this update is specified"));
    }

    let mut shipment = Shipment { ..old };
    if let Some(source) = params.source {
        store.get_site(source)?.or_bad_request("Source site not found")?;
        shipment.source = source;
    }
    if let Some(destination) = params.destination {
        store
            .get_site(destination)?
            .or_bad_request("Destination site not found")?;
        shipment.destination = destination;
    }
    if let Some(location) = params.current_location {
        shipment.current_location = Some(location);
    }
    if let Some(time) = params.departure_time.as_deref() {
        shipment.departure_time = Some(parse_timestamp(time)?);
    }
    if let Some(time) = params.estimated_arrival_time.as_deref() {
        shipment.estimated_arrival_time = Some(parse_timestamp(time)?);
    }
    if let Some(time) = params.actual_arrival_time.as_deref() {
        shipment.actual_arrival_time = Some(parse_timestamp(time)?);
    }
    if let Some(status) = params.shipment_status {
        shipment.shipment_status = status;
    }

    let updated = store.update_shipment(&shipment)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(updated)))
}

pub async fn delete_shipment(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DeleteShipmentParams>,
) -> impl IntoResponse {
    let deleted = state.store.delete_shipment(params.shipment_id)?;
    if !deleted {
        return Err(ApiError::bad_request("Shipment not found by shipmentId"));
    }

    Ok::<_, ApiError>(Json(ApiResponse::success("Successfully deleted")))
}
