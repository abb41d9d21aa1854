//! Construction of audit log entries.
//!
//! Mutating store operations build `AuditEntry` values and persist them in
//! the same transaction as the change they describe, so a committed
//! mutation always has its audit rows and a rolled-back one never does.

use serde::Serialize;

use crate::types::{AuditAction, Availability, Item, Ship, Shipment, Site};

pub const TABLE_SITES: &str = "sites";
pub const TABLE_ITEMS: &str = "items";
pub const TABLE_AVAILABILITIES: &str = "availabilities";
pub const TABLE_SHIPMENTS: &str = "shipments";
pub const TABLE_SHIPS: &str = "ships";

/// One audit row waiting to be written.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub table_name: &'static str,
    pub field_name: Option<&'static str>,
    pub row_key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub action: AuditAction,
}

impl AuditEntry {
    /// Whole-row INSERT event; the new value is the row serialized as JSON.
    pub fn row_inserted<T: Serialize>(table: &'static str, row_key: String, row: &T) -> Self {
        Self {
            table_name: table,
            field_name: None,
            row_key,
            old_value: None,
            new_value: serde_json::to_string(row).ok(),
            action: AuditAction::Insert,
        }
    }

    /// Whole-row DELETE event; the old value is the row serialized as JSON.
    pub fn row_deleted<T: Serialize>(table: &'static str, row_key: String, row: &T) -> Self {
        Self {
            table_name: table,
            field_name: None,
            row_key,
            old_value: serde_json::to_string(row).ok(),
            new_value: None,
            action: AuditAction::Delete,
        }
    }

    pub fn field_updated(
        table: &'static str,
        field: &'static str,
        row_key: String,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        Self {
            table_name: table,
            field_name: Some(field),
            row_key,
            old_value,
            new_value,
            action: AuditAction::Update,
        }
    }

    /// Quantity change of one availability row. Row key format "siteId:itemId".
    pub fn quantity_changed(site_id: i64, item_id: i64, old: i64, new: i64) -> Self {
        Self::field_updated(
            TABLE_AVAILABILITIES,
            "quantity",
            availability_row_key(site_id, item_id),
            Some(old.to_string()),
            Some(new.to_string()),
        )
    }
}

pub fn availability_row_key(site_id: i64, item_id: i64) -> String {
    format!("{site_id}:{item_id}")
}

pub fn ship_row_key(item_id: i64, shipment_id: i64) -> String {
    format!("{item_id}:{shipment_id}")
}

fn diff(
    table: &'static str,
    field: &'static str,
    row_key: &str,
    old: Option<String>,
    new: Option<String>,
    out: &mut Vec<AuditEntry>,
) {
    if old != new {
        out.push(AuditEntry::field_updated(
            table,
            field,
            row_key.to_string(),
            old,
            new,
        ));
    }
}

/// Per-field UPDATE entries for a site edit. Unchanged fields produce nothing.
pub fn site_changes(old: &Site, new: &Site) -> Vec<AuditEntry> {
    let key = old.site_id.to_string();
    let mut out = Vec::new();
    diff(
        TABLE_SITES,
        "siteName",
        &key,
        Some(old.site_name.clone()),
        Some(new.site_name.clone()),
        &mut out,
    );
    diff(
        TABLE_SITES,
        "siteLocation",
        &key,
        Some(old.site_location.clone()),
        Some(new.site_location.clone()),
        &mut out,
    );
    diff(
        TABLE_SITES,
        "siteStatus",
        &key,
        Some(old.site_status.clone()),
        Some(new.site_status.clone()),
        &mut out,
    );
    diff(
        TABLE_SITES,
        "ceaseDate",
        &key,
        old.cease_date.map(|d| d.to_string()),
        new.cease_date.map(|d| d.to_string()),
        &mut out,
    );
    diff(
        TABLE_SITES,
        "internalSite",
        &key,
        Some(old.internal_site.to_string()),
        Some(new.internal_site.to_string()),
        &mut out,
    );
    out
}

pub fn item_changes(old: &Item, new: &Item) -> Vec<AuditEntry> {
    let key = old.item_id.to_string();
    let mut out = Vec::new();
    diff(
        TABLE_ITEMS,
        "itemName",
        &key,
        Some(old.item_name.clone()),
        Some(new.item_name.clone()),
        &mut out,
    );
    diff(
        TABLE_ITEMS,
        "itemPrice",
        &key,
        Some(old.item_price.to_string()),
        Some(new.item_price.to_string()),
        &mut out,
    );
    out
}

pub fn shipment_changes(old: &Shipment, new: &Shipment) -> Vec<AuditEntry> {
    let key = old.shipment_id.to_string();
    let fmt_time = |t: &Option<chrono::DateTime<chrono::Utc>>| t.map(|v| v.to_rfc3339());
    let mut out = Vec::new();
    diff(
        TABLE_SHIPMENTS,
        "source",
        &key,
        Some(old.source.to_string()),
        Some(new.source.to_string()),
        &mut out,
    );
    diff(
        TABLE_SHIPMENTS,
        "destination",
        &key,
        Some(old.destination.to_string()),
        Some(new.destination.to_string()),
        &mut out,
    );
    diff(
        TABLE_SHIPMENTS,
        "currentLocation",
        &key,
        old.current_location.clone(),
        new.current_location.clone(),
        &mut out,
    );
    diff(
        TABLE_SHIPMENTS,
        "departureTime",
        &key,
        fmt_time(&old.departure_time),
        fmt_time(&new.departure_time),
        &mut out,
    );
    diff(
        TABLE_SHIPMENTS,
        "estimatedArrivalTime",
        &key,
        fmt_time(&old.estimated_arrival_time),
        fmt_time(&new.estimated_arrival_time),
        &mut out,
    );
    diff(
        TABLE_SHIPMENTS,
        "actualArrivalTime",
        &key,
        fmt_time(&old.actual_arrival_time),
        fmt_time(&new.actual_arrival_time),
        &mut out,
    );
    diff(
        TABLE_SHIPMENTS,
        "shipmentStatus",
        &key,
        Some(old.shipment_status.clone()),
        Some(new.shipment_status.clone()),
        &mut out,
    );
    out
}

pub fn availability_inserted(a: &Availability) -> AuditEntry {
    AuditEntry::row_inserted(
        TABLE_AVAILABILITIES,
        availability_row_key(a.site_id, a.item_id),
        a,
    )
}

pub fn ship_inserted(ship: &Ship) -> AuditEntry {
    AuditEntry::row_inserted(TABLE_SHIPS, ship_row_key(ship.item_id, ship.shipment_id), ship)
}
