pub mod audit;
mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Mutations on audited tables (sites, items, availabilities, shipments,
/// ships) write their audit rows inside the same transaction as the change.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Site operations
    fn create_site(&self, site: &NewSite) -> Result<Site>;
    fn get_site(&self, id: i64) -> Result<Option<Site>>;
    fn get_site_by_name(&self, name: &str) -> Result<Option<Site>>;
    fn get_site_status(&self, id: i64) -> Result<Option<String>>;
    fn list_sites(&self) -> Result<Vec<Site>>;
    fn update_site(&self, site: &Site) -> Result<Site>;
    /// Soft close: status becomes "closed" and the cease date is recorded
    /// (defaults to today). The row is kept.
    fn close_site(&self, id: i64, cease_date: Option<NaiveDate>) -> Result<Site>;

    // Item operations
    fn create_item(&self, item: &NewItem) -> Result<Item>;
    fn get_item(&self, id: i64) -> Result<Option<Item>>;
    fn get_item_by_name(&self, name: &str) -> Result<Option<Item>>;
    fn list_items(&self) -> Result<Vec<Item>>;
    fn update_item(&self, item: &Item) -> Result<Item>;

    // Availability operations
    fn create_availability(&self, availability: &Availability) -> Result<Availability>;
    fn get_availability(&self, site_id: i64, item_id: i64) -> Result<Option<Availability>>;
    fn list_availabilities(&self) -> Result<Vec<Availability>>;
    fn list_availabilities_by_site(&self, site_id: i64) -> Result<Vec<Availability>>;
    fn list_availabilities_by_item(&self, item_id: i64) -> Result<Vec<Availability>>;
    /// Applies a signed delta to one availability row as a single
    /// conditional update; the non-negativity check rides in the same
    /// statement, so concurrent debits cannot lose updates. A positive
    /// delta on a missing row creates it. Returns the row after the change.
    fn adjust_availability(&self, site_id: i64, item_id: i64, delta: i64) -> Result<Availability>;
    /// Sites that stock every one of the given items (set intersection).
    /// An empty slice returns all sites.
    fn find_sites_stocking_all(&self, item_ids: &[i64]) -> Result<Vec<Site>>;

    // Shipment operations
    /// The shipment workflow: inserts the shipment, debits the source and
    /// credits the destination for every manifest line, writes the manifest
    /// and all audit rows — atomically. Any failure leaves no trace.
    fn create_shipment(&self, request: &ShipmentRequest) -> Result<Shipment>;
    fn get_shipment(&self, id: i64) -> Result<Option<Shipment>>;
    fn list_shipments(&self) -> Result<Vec<Shipment>>;
    fn update_shipment(&self, shipment: &Shipment) -> Result<Shipment>;
    fn delete_shipment(&self, id: i64) -> Result<bool>;

    // Ship (manifest line) operations; rows are created by create_shipment
    fn get_ship(&self, item_id: i64, shipment_id: i64) -> Result<Option<Ship>>;
    fn list_ships(&self) -> Result<Vec<Ship>>;
    fn list_ships_by_item(&self, item_id: i64) -> Result<Vec<Ship>>;
    fn list_ships_by_shipment(&self, shipment_id: i64) -> Result<Vec<Ship>>;

    // User operations (not audited, matching the source system)
    fn create_user(&self, user: &NewUser) -> Result<User>;
    fn get_user(&self, id: i64) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;
    fn update_user(&self, user: &User) -> Result<()>;
    fn delete_user(&self, id: i64) -> Result<bool>;

    // Audit queries (the log itself is written by the mutations above)
    fn list_audits(&self) -> Result<Vec<Audit>>;
    fn list_audits_by_table(&self, table_name: &str) -> Result<Vec<Audit>>;
    fn list_audits_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Audit>>;
}
