use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::post;
use axum::{Router, routing::get};

use super::{
    audits_router, availabilities_router, items_router, shipments, shipments_router, ships_router,
    sites_router, users_router,
};
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/sites", sites_router())
        .nest("/items", items_router())
        .nest("/availabilities", availabilities_router())
        // The shipment workflow keeps its historical singular path
        .route("/shipment/add", post(shipments::create_shipment))
        .nest("/shipments", shipments_router())
        .nest("/ships", ships_router())
        .nest("/users", users_router())
        .nest("/audits", audits_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
