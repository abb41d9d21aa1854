use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
};

use crate::server::AppState;
use crate::server::dto::{GetItemParams, UpdateItemParams};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::server::validation::{validate_item_name, validate_price};
use crate::types::{Item, NewItem};

pub fn items_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_items))
        .route("/item", get(get_item))
        .route("/add", post(create_item))
        .route("/update", post(update_item))
}

pub async fn list_items(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let items = state.store.list_items()?;
    Ok::<_, ApiError>(Json(ApiResponse::success(items)))
}

pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GetItemParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let item = if let Some(id) = params.item_id {
        store.get_item(id)?.or_bad_request("Item not found by itemId")?
    } else if let Some(name) = params.item_name.as_deref() {
        store
            .get_item_by_name(name)?
            .or_bad_request("Item not found by itemName")?
    } else {
        return Err(ApiError::bad_request(
            "Either itemId or itemName must be provided",
        ));
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(item)))
}

pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewItem>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_item_name(&req.item_name)?;
    validate_price(req.item_price)?;

    if store.get_item_by_name(&req.item_name)?.is_some() {
        return Err(ApiError::bad_request("Item name already exists"));
    }

    let item = store.create_item(&req)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(item)))
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UpdateItemParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let old = store
        .get_item(params.item_id)?
        .or_bad_request("Item not found by itemId")?;

    if params.item_name.is_none() && params.item_price.is_none() {
        return Err(ApiError::bad_request("No value for this update is specified"));
    }

    let mut item = Item { ..old };
    if let Some(name) = params.item_name {
        validate_item_name(&name)?;
        if name != item.item_name && store.get_item_by_name(&name)?.is_some() {
            return Err(ApiError::bad_request("Item name already exists"));
        }
        item.item_name = name;
    }
    if let Some(price) = params.item_price {
        validate_price(price)?;
        item.item_price = price;
    }

    let updated = store.update_item(&item)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(updated)))
}
