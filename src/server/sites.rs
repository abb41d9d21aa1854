use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
};

use crate::server::AppState;
use crate::server::dto::{DeleteSiteParams, GetSiteParams, SiteStatusParams, UpdateSiteParams};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::server::validation::{parse_date, validate_site_name};
use crate::types::{NewSite, Site};

pub fn sites_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_sites))
        .route("/site", get(get_site))
        .route("/status", get(get_site_status))
        .route("/add", post(create_site))
        .route("/update", post(update_site))
        .route("/delete", delete(close_site))
}

pub async fn list_sites(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let sites = state.store.list_sites()?;
    Ok::<_, ApiError>(Json(ApiResponse::success(sites)))
}

pub async fn get_site(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GetSiteParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let site = if let Some(id) = params.site_id {
        store.get_site(id)?.or_bad_request("Site not found by siteId")?
    } else if let Some(name) = params.site_name.as_deref() {
        store
            .get_site_by_name(name)?
            .or_bad_request("Site not found by siteName")?
    } else {
        return Err(ApiError::bad_request(
            "Either siteId or siteName must be provided",
        ));
    };

    Ok::<_, ApiError>(Json(ApiResponse::success(site)))
}

pub async fn get_site_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SiteStatusParams>,
) -> impl IntoResponse {
    let status = state
        .store
        .get_site_status(params.site_id)?
        .or_bad_request("Site not found by siteId")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(status)))
}

pub async fn create_site(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSite>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    validate_site_name(&req.site_name)?;

    if store.get_site_by_name(&req.site_name)?.is_some() {
        return Err(ApiError::bad_request("Site name already exists"));
    }

    let site = store.create_site(&req)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(site)))
}

pub async fn update_site(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UpdateSiteParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let old = store
        .get_site(params.site_id)?
        .or_bad_request("Site not found by siteId")?;

    if params.site_name.is_none()
        && params.site_location.is_none()
        && params.site_status.is_none()
        && params.cease_date.is_none()
        && params.internal_site.is_none()
    {
        return Err(ApiError::bad_request("No value for this update is specified"));
    }

    let mut site = Site { ..old };
    if let Some(name) = params.site_name {
        validate_site_name(&name)?;
        if name != site.site_name && store.get_site_by_name(&name)?.is_some() {
            return Err(ApiError::bad_request("Site name already exists"));
        }
        site.site_name = name;
    }
    if let Some(location) = params.site_location {
        site.site_location = location;
    }
    if let Some(status) = params.site_status {
        site.site_status = status;
    }
    if let Some(date) = params.cease_date.as_deref() {
        site.cease_date = Some(parse_date(date)?);
    }
    if let Some(internal) = params.internal_site {
        site.internal_site = internal;
    }

    let updated = store.update_site(&site)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(updated)))
}

/// Sites are never hard-deleted: this closes the site and stamps the cease
/// date (today when none is given).
pub async fn close_site(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DeleteSiteParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    store
        .get_site(params.site_id)?
        .or_bad_request("Site not found by siteId")?;

    let cease_date = params.cease_date.as_deref().map(parse_date).transpose()?;

    let closed = store.close_site(params.site_id, cease_date)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(closed)))
}
