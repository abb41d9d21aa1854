use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};

use crate::server::AppState;
use crate::server::dto::{ItemParams, ShipLineParams, ShipmentParams};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};

// Manifest lines are read-only over HTTP; they are written by the shipment
// workflow and die with their shipment.
pub fn ships_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_ships))
        .route("/item", get(list_by_item))
        .route("/shipment", get(list_by_shipment))
        .route("/item/shipment", get(get_ship))
}

pub async fn list_ships(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ships = state.store.list_ships()?;
    Ok::<_, ApiError>(Json(ApiResponse::success(ships)))
}

pub async fn list_by_item(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ItemParams>,
) -> impl IntoResponse {
    let ships = state.store.list_ships_by_item(params.item_id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(ships)))
}

pub async fn list_by_shipment(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ShipmentParams>,
) -> impl IntoResponse {
    let ships = state.store.list_ships_by_shipment(params.shipment_id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(ships)))
}

pub async fn get_ship(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ShipLineParams>,
) -> impl IntoResponse {
    let ship = state
        .store
        .get_ship(params.item_id, params.shipment_id)?
        .or_bad_request("Ship not found for given itemId and shipmentId")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ship)))
}
