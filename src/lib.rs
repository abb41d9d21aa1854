//! # Depot
//!
//! An inventory and shipment management server, usable both as a standalone
//! binary and as a library.
//!
//! The schema tracks sites, items, per-site stock levels (availabilities),
//! shipments with their manifests, users, and an append-only audit log.
//! Shipment creation is the interesting part: one transaction inserts the
//! shipment, debits the source site, credits the destination, writes the
//! manifest, and records audits for all of it.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use depot::server::{AppState, create_router};
//! use depot::store::SqliteStore;
//!
//! let store = SqliteStore::new("./data/depot.db").unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState { store: Arc::new(store) });
//! let router = create_router(state);
//! // Serve with axum...
//! ```

pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
