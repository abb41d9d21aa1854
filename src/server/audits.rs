use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use chrono::{Days, NaiveTime};

use crate::server::AppState;
use crate::server::dto::{AuditsBetweenParams, AuditsOnTableParams};
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::parse_date;

// The audit log is read-only over HTTP; rows are written by the mutating
// store operations.
pub fn audits_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_audits))
        .route("/onTable", get(list_on_table))
        .route("/betweenPeriod", get(list_between_period))
}

pub async fn list_audits(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let audits = state.store.list_audits()?;
    Ok::<_, ApiError>(Json(ApiResponse::success(audits)))
}

pub async fn list_on_table(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditsOnTableParams>,
) -> impl IntoResponse {
    let audits = state.store.list_audits_by_table(&params.table_name)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(audits)))
}

/// `?start=YYYY-MM-DD&end=YYYY-MM-DD`, both ends inclusive (the range runs
/// to midnight after the end date).
pub async fn list_between_period(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuditsBetweenParams>,
) -> impl IntoResponse {
    let start = parse_date(&params.start)?;
    let end = parse_date(&params.end)?;

    if end < start {
        return Err(ApiError::bad_request("end date is before start date"));
    }

    let start_ts = start.and_time(NaiveTime::MIN).and_utc();
    let end_ts = end
        .checked_add_days(Days::new(1))
        .ok_or_else(|| ApiError::bad_request("end date out of range"))?
        .and_time(NaiveTime::MIN)
        .and_utc();

    let audits = state.store.list_audits_between(start_ts, end_ts)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(audits)))
}
