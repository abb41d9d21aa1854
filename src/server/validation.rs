use crate::server::response::ApiError;

const MAX_NAME_LEN: usize = 100;

fn validate_name(name: &str, entity: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request(format!(
            "{entity} name cannot be empty"
        )));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "{entity} name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_site_name(name: &str) -> Result<(), ApiError> {
    validate_name(name, "Site")
}

pub fn validate_item_name(name: &str) -> Result<(), ApiError> {
    validate_name(name, "Item")
}

pub fn validate_username(name: &str) -> Result<(), ApiError> {
    validate_name(name, "User")
}

pub fn validate_price(price: f64) -> Result<(), ApiError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::bad_request("Item price cannot be negative"));
    }
    Ok(())
}

pub fn validate_quantity(quantity: i64) -> Result<(), ApiError> {
    if quantity < 0 {
        return Err(ApiError::bad_request("Quantity cannot be negative"));
    }
    Ok(())
}

/// YYYY-MM-DD, the only date format the query surface accepts.
pub fn parse_date(value: &str) -> Result<chrono::NaiveDate, ApiError> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("Invalid date '{value}', expected YYYY-MM-DD")))
}

/// RFC 3339, for shipment timestamp fields.
pub fn parse_timestamp(value: &str) -> Result<chrono::DateTime<chrono::Utc>, ApiError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|_| {
            ApiError::bad_request(format!(
                "Invalid timestamp '{value}', expected RFC 3339 (e.g. 2024-01-31T12:00:00Z)"
            ))
        })
}
