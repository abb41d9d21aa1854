use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A warehouse or storefront that stocks items.
///
/// Sites are never hard-deleted through the API; "deleting" a site closes
/// it (status "closed" plus a cease date) so its audit history stays intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub site_id: i64,
    pub site_name: String,
    pub site_location: String,
    pub site_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cease_date: Option<NaiveDate>,
    pub internal_site: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub item_id: i64,
    pub item_name: String,
    pub item_price: f64,
}

/// Stock count of one item at one site. Composite key (siteId, itemId);
/// the quantity is kept non-negative by the store layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub site_id: i64,
    pub item_id: i64,
    pub quantity: i64,
}

/// A transfer event between two sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub shipment_id: i64,
    pub source: i64,
    pub destination: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_arrival_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_arrival_time: Option<DateTime<Utc>>,
    pub shipment_status: String,
}

/// Manifest line of a shipment: how many units of one item it carries.
/// Composite key (itemId, shipmentId).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    pub item_id: i64,
    pub shipment_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: i64,
    pub username: String,
    // Stored and compared in plaintext, faithfully to the system this
    // replaces. Known security gap; see DESIGN.md.
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

/// Append-only record of one tracked change. A NULL field name marks a
/// whole-row event (INSERT/DELETE); UPDATE rows carry one changed field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub audit_id: i64,
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    pub row_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    pub action: AuditAction,
    pub action_timestamp: DateTime<Utc>,
}

/// Creation input for a site; the id is assigned by the database.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSite {
    pub site_name: String,
    pub site_location: String,
    #[serde(default)]
    pub site_status: Option<String>,
    #[serde(default)]
    pub cease_date: Option<NaiveDate>,
    #[serde(default)]
    pub internal_site: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub item_name: String,
    pub item_price: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub position: Option<String>,
}

/// A request to move items between two sites.
///
/// The map keys are item ids (JSON object keys, so strings on the wire);
/// a BTreeMap keeps per-item processing order deterministic.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRequest {
    pub source: i64,
    pub destination: i64,
    pub items_with_quantities: BTreeMap<i64, i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Insert,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Insert => "INSERT",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INSERT" => Some(AuditAction::Insert),
            "UPDATE" => Some(AuditAction::Update),
            "DELETE" => Some(AuditAction::Delete),
            _ => None,
        }
    }
}
