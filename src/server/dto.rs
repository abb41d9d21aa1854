use serde::Deserialize;

// Query-parameter DTOs. The wire names stay camelCase to match the entity
// field names (?siteId=, ?itemName=, ...).

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSiteParams {
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub site_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatusParams {
    pub site_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSiteParams {
    pub site_id: i64,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub site_location: Option<String>,
    #[serde(default)]
    pub site_status: Option<String>,
    /// YYYY-MM-DD; parsed in the handler so a bad format is a 400
    #[serde(default)]
    pub cease_date: Option<String>,
    #[serde(default)]
    pub internal_site: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSiteParams {
    pub site_id: i64,
    #[serde(default)]
    pub cease_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetItemParams {
    #[serde(default)]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub item_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemParams {
    pub item_id: i64,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub item_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteParams {
    pub site_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemParams {
    pub item_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteItemParams {
    pub site_id: i64,
    pub item_id: i64,
}

/// Manual stock correction: a signed delta against one availability row.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustQuantityParams {
    pub site_id: i64,
    pub item_id: i64,
    pub delta: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetShipmentParams {
    #[serde(default)]
    pub shipment_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShipmentParams {
    pub shipment_id: i64,
    #[serde(default)]
    pub source: Option<i64>,
    #[serde(default)]
    pub destination: Option<i64>,
    #[serde(default)]
    pub current_location: Option<String>,
    /// RFC 3339 timestamps; parsed in the handler
    #[serde(default)]
    pub departure_time: Option<String>,
    #[serde(default)]
    pub estimated_arrival_time: Option<String>,
    #[serde(default)]
    pub actual_arrival_time: Option<String>,
    #[serde(default)]
    pub shipment_status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteShipmentParams {
    pub shipment_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentParams {
    pub shipment_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipLineParams {
    pub item_id: i64,
    pub shipment_id: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUserParams {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmUserParams {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserParams {
    pub user_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserParams {
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditsOnTableParams {
    pub table_name: String,
}

/// Both bounds are YYYY-MM-DD dates; the range covers [start, end+1d).
#[derive(Debug, Deserialize)]
pub struct AuditsBetweenParams {
    pub start: String,
    pub end: String,
}
