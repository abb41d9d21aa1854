use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
};

use crate::server::AppState;
use crate::server::dto::{AdjustQuantityParams, ItemParams, SiteItemParams, SiteParams};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::server::validation::validate_quantity;
use crate::types::Availability;

pub fn availabilities_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_availabilities))
        .route("/site", get(list_by_site))
        .route("/item", get(list_by_item))
        .route("/site/item", get(get_by_site_and_item))
        .route("/searchByItems", get(search_by_items))
        .route("/add", post(create_availability))
        .route("/quantity", post(adjust_quantity))
}

pub async fn list_availabilities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let availabilities = state.store.list_availabilities()?;
    Ok::<_, ApiError>(Json(ApiResponse::success(availabilities)))
}

pub async fn list_by_site(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SiteParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    store
        .get_site(params.site_id)?
        .or_bad_request("Site not found by siteId")?;

    let availabilities = store.list_availabilities_by_site(params.site_id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(availabilities)))
}

/// An item stocked nowhere yields an empty list, not an error.
pub async fn list_by_item(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ItemParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    store
        .get_item(params.item_id)?
        .or_bad_request("Item not found by itemId")?;

    let availabilities = store.list_availabilities_by_item(params.item_id)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(availabilities)))
}

pub async fn get_by_site_and_item(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SiteItemParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    store
        .get_site(params.site_id)?
        .or_bad_request("Site not found by siteId")?;
    store
        .get_item(params.item_id)?
        .or_bad_request("Item not found by itemId")?;

    let availability = store
        .get_availability(params.site_id, params.item_id)?
        .or_bad_request("Availability not found for given siteId and itemId")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(availability)))
}

/// `?<itemId>=<qty>&...` — returns the sites stocking every listed item.
/// The quantity values are accepted but not filtered on, matching the
/// behavior of the system this replaces. No items means all sites.
pub async fn search_by_items(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    let mut item_ids = Vec::with_capacity(params.len());
    for (key, _) in &params {
        let id: i64 = key
            .parse()
            .map_err(|_| ApiError::bad_request(format!("Invalid itemId '{key}'")))?;
        item_ids.push(id);
    }

    let sites = state.store.find_sites_stocking_all(&item_ids)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(sites)))
}

pub async fn create_availability(
    State(state): State<Arc<AppState>>,
    Json(req): Json<Availability>,
) -> impl IntoResponse {
    validate_quantity(req.quantity)?;

    let created = state.store.create_availability(&req).map_err(|e| match e {
        crate::error::Error::AlreadyExists => {
            ApiError::bad_request("Availability already exists for this site and item")
        }
        other => other.into(),
    })?;

    Ok::<_, ApiError>(Json(ApiResponse::success(created)))
}

/// Manual stock correction. Goes through the same atomic conditional
/// update as the shipment workflow, so a debit below zero is rejected.
pub async fn adjust_quantity(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdjustQuantityParams>,
) -> impl IntoResponse {
    let updated = state
        .store
        .adjust_availability(params.site_id, params.item_id, params.delta)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(updated)))
}
