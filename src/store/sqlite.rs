use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use super::Store;
use super::audit::{self, AuditEntry, TABLE_ITEMS, TABLE_SHIPMENTS, TABLE_SITES};
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::error!("Invalid date in database: '{}' - {}", s, e);
            None
        }
    }
}

/// Maps a unique/primary-key violation to AlreadyExists.
fn constraint_to_conflict(e: rusqlite::Error) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::AlreadyExists
        }
        e => Error::from(e),
    }
}

fn map_site(row: &Row<'_>) -> rusqlite::Result<Site> {
    Ok(Site {
        site_id: row.get(0)?,
        site_name: row.get(1)?,
        site_location: row.get(2)?,
        site_status: row.get(3)?,
        cease_date: row
            .get::<_, Option<String>>(4)?
            .and_then(|s| parse_date(&s)),
        internal_site: row.get(5)?,
    })
}

fn map_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        item_id: row.get(0)?,
        item_name: row.get(1)?,
        item_price: row.get(2)?,
    })
}

fn map_availability(row: &Row<'_>) -> rusqlite::Result<Availability> {
    Ok(Availability {
        site_id: row.get(0)?,
        item_id: row.get(1)?,
        quantity: row.get(2)?,
    })
}

fn map_shipment(row: &Row<'_>) -> rusqlite::Result<Shipment> {
    let time = |v: Option<String>| v.map(|s| parse_datetime(&s));
    Ok(Shipment {
        shipment_id: row.get(0)?,
        source: row.get(1)?,
        destination: row.get(2)?,
        current_location: row.get(3)?,
        departure_time: time(row.get(4)?),
        estimated_arrival_time: time(row.get(5)?),
        actual_arrival_time: time(row.get(6)?),
        shipment_status: row.get(7)?,
    })
}

fn map_ship(row: &Row<'_>) -> rusqlite::Result<Ship> {
    Ok(Ship {
        item_id: row.get(0)?,
        shipment_id: row.get(1)?,
        quantity: row.get(2)?,
    })
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        position: row.get(3)?,
    })
}

fn map_audit(row: &Row<'_>) -> rusqlite::Result<Audit> {
    let action: String = row.get(6)?;
    Ok(Audit {
        audit_id: row.get(0)?,
        table_name: row.get(1)?,
        field_name: row.get(2)?,
        row_key: row.get(3)?,
        old_value: row.get(4)?,
        new_value: row.get(5)?,
        action: AuditAction::parse(&action).unwrap_or_else(|| {
            tracing::error!("Invalid audit action in database: '{}'", action);
            AuditAction::Update
        }),
        action_timestamp: parse_datetime(&row.get::<_, String>(7)?),
    })
}

const SITE_COLUMNS: &str =
    "site_id, site_name, site_location, site_status, cease_date, internal_site";
const SHIPMENT_COLUMNS: &str = "shipment_id, source, destination, current_location, \
     departure_time, estimated_arrival_time, actual_arrival_time, shipment_status";
const AUDIT_COLUMNS: &str =
    "audit_id, table_name, field_name, row_key, old_value, new_value, action, action_timestamp";

/// Appends one audit row with a server-generated timestamp. Runs on the
/// caller's connection so it joins whatever transaction is open.
fn insert_audit(conn: &Connection, entry: &AuditEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO audits (table_name, field_name, row_key, old_value, new_value, action, action_timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.table_name,
            entry.field_name,
            entry.row_key,
            entry.old_value,
            entry.new_value,
            entry.action.as_str(),
            format_datetime(&Utc::now()),
        ],
    )?;
    Ok(())
}

fn site_exists(conn: &Connection, site_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sites WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn item_exists(conn: &Connection, item_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM items WHERE item_id = ?1",
            params![item_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Outcome of one quantity adjustment.
struct QuantityChange {
    old: i64,
    new: i64,
    /// True when a credit materialized a previously missing row.
    created: bool,
}

impl QuantityChange {
    fn audit_entry(&self, site_id: i64, item_id: i64) -> AuditEntry {
        if self.created {
            audit::availability_inserted(&Availability {
                site_id,
                item_id,
                quantity: self.new,
            })
        } else {
            AuditEntry::quantity_changed(site_id, item_id, self.old, self.new)
        }
    }
}

/// Applies a signed delta to one availability row.
///
/// The debit path is a single conditional UPDATE whose WHERE clause carries
/// the non-negativity check, so two writers racing on the same row cannot
/// drive it negative or lose an update. A guard miss on an existing row is
/// InsufficientStock and leaves the row untouched.
fn adjust_quantity(
    conn: &Connection,
    site_id: i64,
    item_id: i64,
    delta: i64,
) -> Result<QuantityChange> {
    let current: Option<i64> = conn
        .query_row(
            "SELECT quantity FROM availabilities WHERE site_id = ?1 AND item_id = ?2",
            params![site_id, item_id],
            |row| row.get(0),
        )
        .optional()?;

    match current {
        Some(old) => {
            let rows = conn.execute(
                "UPDATE availabilities SET quantity = quantity + ?3
                 WHERE site_id = ?1 AND item_id = ?2 AND quantity + ?3 >= 0",
                params![site_id, item_id, delta],
            )?;
            if rows == 0 {
                return Err(Error::InsufficientStock {
                    site_id,
                    item_id,
                    available: old,
                    requested: -delta,
                });
            }
            Ok(QuantityChange {
                old,
                new: old + delta,
                created: false,
            })
        }
        None => {
            if delta < 0 {
                return Err(Error::InvalidReference(format!(
                    "no availability for item {item_id} at site {site_id}"
                )));
            }
            if !site_exists(conn, site_id)? {
                return Err(Error::InvalidReference(format!(
                    "site {site_id} does not exist"
                )));
            }
            if !item_exists(conn, item_id)? {
                return Err(Error::InvalidReference(format!(
                    "item {item_id} does not exist"
                )));
            }
            conn.execute(
                "INSERT INTO availabilities (site_id, item_id, quantity) VALUES (?1, ?2, ?3)",
                params![site_id, item_id, delta],
            )?;
            Ok(QuantityChange {
                old: 0,
                new: delta,
                created: true,
            })
        }
    }
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Site operations

    fn create_site(&self, site: &NewSite) -> Result<Site> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO sites (site_name, site_location, site_status, cease_date, internal_site)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                site.site_name,
                site.site_location,
                site.site_status.as_deref().unwrap_or("open"),
                site.cease_date.map(|d| d.to_string()),
                site.internal_site.unwrap_or(false),
            ],
        )
        .map_err(constraint_to_conflict)?;

        let created = Site {
            site_id: tx.last_insert_rowid(),
            site_name: site.site_name.clone(),
            site_location: site.site_location.clone(),
            site_status: site.site_status.clone().unwrap_or_else(|| "open".to_string()),
            cease_date: site.cease_date,
            internal_site: site.internal_site.unwrap_or(false),
        };

        insert_audit(
            &tx,
            &AuditEntry::row_inserted(TABLE_SITES, created.site_id.to_string(), &created),
        )?;
        tx.commit()?;
        Ok(created)
    }

    fn get_site(&self, id: i64) -> Result<Option<Site>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SITE_COLUMNS} FROM sites WHERE site_id = ?1"),
            params![id],
            map_site,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_site_by_name(&self, name: &str) -> Result<Option<Site>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SITE_COLUMNS} FROM sites WHERE site_name = ?1"),
            params![name],
            map_site,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_site_status(&self, id: i64) -> Result<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT site_status FROM sites WHERE site_id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_sites(&self) -> Result<Vec<Site>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("SELECT {SITE_COLUMNS} FROM sites ORDER BY site_id"))?;
        let rows = stmt.query_map([], map_site)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_site(&self, site: &Site) -> Result<Site> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let old = tx
            .query_row(
                &format!("SELECT {SITE_COLUMNS} FROM sites WHERE site_id = ?1"),
                params![site.site_id],
                map_site,
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        for entry in audit::site_changes(&old, site) {
            insert_audit(&tx, &entry)?;
        }

        tx.execute(
            "UPDATE sites SET site_name = ?1, site_location = ?2, site_status = ?3,
                 cease_date = ?4, internal_site = ?5 WHERE site_id = ?6",
            params![
                site.site_name,
                site.site_location,
                site.site_status,
                site.cease_date.map(|d| d.to_string()),
                site.internal_site,
                site.site_id,
            ],
        )
        .map_err(constraint_to_conflict)?;

        tx.commit()?;
        Ok(site.clone())
    }

    fn close_site(&self, id: i64, cease_date: Option<NaiveDate>) -> Result<Site> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let old = tx
            .query_row(
                &format!("SELECT {SITE_COLUMNS} FROM sites WHERE site_id = ?1"),
                params![id],
                map_site,
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        let closed = Site {
            site_status: "closed".to_string(),
            cease_date: Some(cease_date.unwrap_or_else(|| Utc::now().date_naive())),
            ..old.clone()
        };

        for entry in audit::site_changes(&old, &closed) {
            insert_audit(&tx, &entry)?;
        }

        tx.execute(
            "UPDATE sites SET site_status = ?1, cease_date = ?2 WHERE site_id = ?3",
            params![
                closed.site_status,
                closed.cease_date.map(|d| d.to_string()),
                id
            ],
        )?;

        tx.commit()?;
        Ok(closed)
    }

    // Item operations

    fn create_item(&self, item: &NewItem) -> Result<Item> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO items (item_name, item_price) VALUES (?1, ?2)",
            params![item.item_name, item.item_price],
        )
        .map_err(constraint_to_conflict)?;

        let created = Item {
            item_id: tx.last_insert_rowid(),
            item_name: item.item_name.clone(),
            item_price: item.item_price,
        };

        insert_audit(
            &tx,
            &AuditEntry::row_inserted(TABLE_ITEMS, created.item_id.to_string(), &created),
        )?;
        tx.commit()?;
        Ok(created)
    }

    fn get_item(&self, id: i64) -> Result<Option<Item>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT item_id, item_name, item_price FROM items WHERE item_id = ?1",
            params![id],
            map_item,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_item_by_name(&self, name: &str) -> Result<Option<Item>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT item_id, item_name, item_price FROM items WHERE item_name = ?1",
            params![name],
            map_item,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_items(&self) -> Result<Vec<Item>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT item_id, item_name, item_price FROM items ORDER BY item_id")?;
        let rows = stmt.query_map([], map_item)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_item(&self, item: &Item) -> Result<Item> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let old = tx
            .query_row(
                "SELECT item_id, item_name, item_price FROM items WHERE item_id = ?1",
                params![item.item_id],
                map_item,
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        for entry in audit::item_changes(&old, item) {
            insert_audit(&tx, &entry)?;
        }

        tx.execute(
            "UPDATE items SET item_name = ?1, item_price = ?2 WHERE item_id = ?3",
            params![item.item_name, item.item_price, item.item_id],
        )
        .map_err(constraint_to_conflict)?;

        tx.commit()?;
        Ok(item.clone())
    }

    // Availability operations

    fn create_availability(&self, availability: &Availability) -> Result<Availability> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if !site_exists(&tx, availability.site_id)? {
            return Err(Error::InvalidReference(format!(
                "site {} does not exist",
                availability.site_id
            )));
        }
        if !item_exists(&tx, availability.item_id)? {
            return Err(Error::InvalidReference(format!(
                "item {} does not exist",
                availability.item_id
            )));
        }

        tx.execute(
            "INSERT INTO availabilities (site_id, item_id, quantity) VALUES (?1, ?2, ?3)",
            params![
                availability.site_id,
                availability.item_id,
                availability.quantity
            ],
        )
        .map_err(constraint_to_conflict)?;

        insert_audit(&tx, &audit::availability_inserted(availability))?;
        tx.commit()?;
        Ok(availability.clone())
    }

    fn get_availability(&self, site_id: i64, item_id: i64) -> Result<Option<Availability>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT site_id, item_id, quantity FROM availabilities
             WHERE site_id = ?1 AND item_id = ?2",
            params![site_id, item_id],
            map_availability,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_availabilities(&self) -> Result<Vec<Availability>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT site_id, item_id, quantity FROM availabilities ORDER BY site_id, item_id",
        )?;
        let rows = stmt.query_map([], map_availability)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_availabilities_by_site(&self, site_id: i64) -> Result<Vec<Availability>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT site_id, item_id, quantity FROM availabilities
             WHERE site_id = ?1 ORDER BY item_id",
        )?;
        let rows = stmt.query_map(params![site_id], map_availability)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_availabilities_by_item(&self, item_id: i64) -> Result<Vec<Availability>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT site_id, item_id, quantity FROM availabilities
             WHERE item_id = ?1 ORDER BY site_id",
        )?;
        let rows = stmt.query_map(params![item_id], map_availability)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn adjust_availability(&self, site_id: i64, item_id: i64, delta: i64) -> Result<Availability> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let change = adjust_quantity(&tx, site_id, item_id, delta)?;
        insert_audit(&tx, &change.audit_entry(site_id, item_id))?;

        tx.commit()?;
        Ok(Availability {
            site_id,
            item_id,
            quantity: change.new,
        })
    }

    fn find_sites_stocking_all(&self, item_ids: &[i64]) -> Result<Vec<Site>> {
        let mut distinct: Vec<i64> = item_ids.to_vec();
        distinct.sort_unstable();
        distinct.dedup();

        if distinct.is_empty() {
            return self.list_sites();
        }

        let placeholders = (1..=distinct.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT s.site_id, s.site_name, s.site_location, s.site_status,
                    s.cease_date, s.internal_site
             FROM sites s
             JOIN availabilities a ON a.site_id = s.site_id
             WHERE a.item_id IN ({placeholders})
             GROUP BY s.site_id
             HAVING COUNT(DISTINCT a.item_id) = ?{}
             ORDER BY s.site_id",
            distinct.len() + 1
        );

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let n = distinct.len() as i64;
        let rows = stmt.query_map(
            params_from_iter(distinct.into_iter().chain(std::iter::once(n))),
            map_site,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Shipment operations

    fn create_shipment(&self, request: &ShipmentRequest) -> Result<Shipment> {
        if request.items_with_quantities.is_empty() {
            return Err(Error::BadRequest(
                "shipment must contain at least one item".to_string(),
            ));
        }
        if let Some((&item_id, &qty)) = request
            .items_with_quantities
            .iter()
            .find(|&(_, &qty)| qty <= 0)
        {
            return Err(Error::BadRequest(format!(
                "quantity for item {item_id} must be positive, got {qty}"
            )));
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if !site_exists(&tx, request.source)? {
            return Err(Error::InvalidReference(format!(
                "source site {} does not exist",
                request.source
            )));
        }
        if !site_exists(&tx, request.destination)? {
            return Err(Error::InvalidReference(format!(
                "destination site {} does not exist",
                request.destination
            )));
        }

        let departure = Utc::now();
        tx.execute(
            "INSERT INTO shipments (source, destination, departure_time, shipment_status)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                request.source,
                request.destination,
                format_datetime(&departure),
                "In Transit",
            ],
        )?;
        let shipment_id = tx.last_insert_rowid();

        for (&item_id, &quantity) in &request.items_with_quantities {
            if !item_exists(&tx, item_id)? {
                return Err(Error::InvalidReference(format!(
                    "item {item_id} does not exist"
                )));
            }

            let debit = adjust_quantity(&tx, request.source, item_id, -quantity)?;
            insert_audit(&tx, &debit.audit_entry(request.source, item_id))?;

            let credit = adjust_quantity(&tx, request.destination, item_id, quantity)?;
            insert_audit(&tx, &credit.audit_entry(request.destination, item_id))?;

            let line = Ship {
                item_id,
                shipment_id,
                quantity,
            };
            tx.execute(
                "INSERT INTO ships (item_id, shipment_id, quantity) VALUES (?1, ?2, ?3)",
                params![line.item_id, line.shipment_id, line.quantity],
            )?;
            insert_audit(&tx, &audit::ship_inserted(&line))?;
        }

        let shipment = Shipment {
            shipment_id,
            source: request.source,
            destination: request.destination,
            current_location: None,
            departure_time: Some(departure),
            estimated_arrival_time: None,
            actual_arrival_time: None,
            shipment_status: "In Transit".to_string(),
        };

        insert_audit(
            &tx,
            &AuditEntry::row_inserted(TABLE_SHIPMENTS, shipment_id.to_string(), &shipment),
        )?;
        tx.commit()?;
        Ok(shipment)
    }

    fn get_shipment(&self, id: i64) -> Result<Option<Shipment>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE shipment_id = ?1"),
            params![id],
            map_shipment,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_shipments(&self) -> Result<Vec<Shipment>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments ORDER BY shipment_id"
        ))?;
        let rows = stmt.query_map([], map_shipment)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_shipment(&self, shipment: &Shipment) -> Result<Shipment> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let old = tx
            .query_row(
                &format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE shipment_id = ?1"),
                params![shipment.shipment_id],
                map_shipment,
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        for entry in audit::shipment_changes(&old, shipment) {
            insert_audit(&tx, &entry)?;
        }

        tx.execute(
            "UPDATE shipments SET source = ?1, destination = ?2, current_location = ?3,
                 departure_time = ?4, estimated_arrival_time = ?5, actual_arrival_time = ?6,
                 shipment_status = ?7 WHERE shipment_id = ?8",
            params![
                shipment.source,
                shipment.destination,
                shipment.current_location,
                shipment.departure_time.as_ref().map(format_datetime),
                shipment.estimated_arrival_time.as_ref().map(format_datetime),
                shipment.actual_arrival_time.as_ref().map(format_datetime),
                shipment.shipment_status,
                shipment.shipment_id,
            ],
        )?;

        tx.commit()?;
        Ok(shipment.clone())
    }

    fn delete_shipment(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let Some(old) = tx
            .query_row(
                &format!("SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE shipment_id = ?1"),
                params![id],
                map_shipment,
            )
            .optional()?
        else {
            return Ok(false);
        };

        insert_audit(
            &tx,
            &AuditEntry::row_deleted(TABLE_SHIPMENTS, id.to_string(), &old),
        )?;
        // Manifest lines go with the shipment (ON DELETE CASCADE)
        tx.execute("DELETE FROM shipments WHERE shipment_id = ?1", params![id])?;

        tx.commit()?;
        Ok(true)
    }

    // Ship operations

    fn get_ship(&self, item_id: i64, shipment_id: i64) -> Result<Option<Ship>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT item_id, shipment_id, quantity FROM ships
             WHERE item_id = ?1 AND shipment_id = ?2",
            params![item_id, shipment_id],
            map_ship,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_ships(&self) -> Result<Vec<Ship>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT item_id, shipment_id, quantity FROM ships ORDER BY shipment_id, item_id",
        )?;
        let rows = stmt.query_map([], map_ship)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_ships_by_item(&self, item_id: i64) -> Result<Vec<Ship>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT item_id, shipment_id, quantity FROM ships
             WHERE item_id = ?1 ORDER BY shipment_id",
        )?;
        let rows = stmt.query_map(params![item_id], map_ship)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_ships_by_shipment(&self, shipment_id: i64) -> Result<Vec<Ship>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT item_id, shipment_id, quantity FROM ships
             WHERE shipment_id = ?1 ORDER BY item_id",
        )?;
        let rows = stmt.query_map(params![shipment_id], map_ship)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // User operations

    fn create_user(&self, user: &NewUser) -> Result<User> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO users (username, password, position) VALUES (?1, ?2, ?3)",
            params![user.username, user.password, user.position],
        )
        .map_err(constraint_to_conflict)?;

        Ok(User {
            user_id: conn.last_insert_rowid(),
            username: user.username.clone(),
            password: user.password.clone(),
            position: user.position.clone(),
        })
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT user_id, username, password, position FROM users WHERE user_id = ?1",
            params![id],
            map_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT user_id, username, password, position FROM users WHERE username = ?1",
            params![username],
            map_user,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT user_id, username, password, position FROM users ORDER BY user_id")?;
        let rows = stmt.query_map([], map_user)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user(&self, user: &User) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE users SET username = ?1, password = ?2, position = ?3 WHERE user_id = ?4",
                params![user.username, user.password, user.position, user.user_id],
            )
            .map_err(constraint_to_conflict)?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_user(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE user_id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Audit queries

    fn list_audits(&self) -> Result<Vec<Audit>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("SELECT {AUDIT_COLUMNS} FROM audits ORDER BY audit_id"))?;
        let rows = stmt.query_map([], map_audit)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_audits_by_table(&self, table_name: &str) -> Result<Vec<Audit>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audits WHERE table_name = ?1 ORDER BY audit_id"
        ))?;
        let rows = stmt.query_map(params![table_name], map_audit)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_audits_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Audit>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {AUDIT_COLUMNS} FROM audits
             WHERE action_timestamp >= ?1 AND action_timestamp < ?2 ORDER BY audit_id"
        ))?;
        let rows = stmt.query_map(
            params![format_datetime(&start), format_datetime(&end)],
            map_audit,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> SqliteStore {
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        store
    }

    fn seed_site(store: &SqliteStore, name: &str) -> Site {
        store
            .create_site(&NewSite {
                site_name: name.to_string(),
                site_location: "somewhere".to_string(),
                site_status: None,
                cease_date: None,
                internal_site: None,
            })
            .unwrap()
    }

    fn seed_item(store: &SqliteStore, name: &str, price: f64) -> Item {
        store
            .create_item(&NewItem {
                item_name: name.to_string(),
                item_price: price,
            })
            .unwrap()
    }

    fn seed_stock(store: &SqliteStore, site: &Site, item: &Item, quantity: i64) {
        store
            .create_availability(&Availability {
                site_id: site.site_id,
                item_id: item.item_id,
                quantity,
            })
            .unwrap();
    }

    fn quantity_at(store: &SqliteStore, site: &Site, item: &Item) -> Option<i64> {
        store
            .get_availability(site.site_id, item.item_id)
            .unwrap()
            .map(|a| a.quantity)
    }

    #[test]
    fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "sites",
            "items",
            "availabilities",
            "shipments",
            "ships",
            "users",
            "audits",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
    }

    #[test]
    fn test_site_crud() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let site = seed_site(&store, "central");
        assert_eq!(site.site_status, "open");
        assert!(site.cease_date.is_none());

        let fetched = store.get_site(site.site_id).unwrap().unwrap();
        assert_eq!(fetched.site_name, "central");

        let by_name = store.get_site_by_name("central").unwrap().unwrap();
        assert_eq!(by_name.site_id, site.site_id);

        assert_eq!(
            store.get_site_status(site.site_id).unwrap().as_deref(),
            Some("open")
        );

        let gone = store.get_site(site.site_id + 1).unwrap();
        assert!(gone.is_none());
    }

    #[test]
    fn test_update_site_audits_changed_fields() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let site = seed_site(&store, "central");

        let updated = Site {
            site_status: "closed".to_string(),
            ..site.clone()
        };
        store.update_site(&updated).unwrap();

        let audits = store.list_audits_by_table("sites").unwrap();
        // One INSERT for creation, one UPDATE for the status change
        let status_audit = audits
            .iter()
            .find(|a| a.field_name.as_deref() == Some("siteStatus"))
            .expect("status change audited");
        assert_eq!(status_audit.row_key, site.site_id.to_string());
        assert_eq!(status_audit.old_value.as_deref(), Some("open"));
        assert_eq!(status_audit.new_value.as_deref(), Some("closed"));
        assert_eq!(status_audit.action, AuditAction::Update);

        // Unchanged fields produce no audit rows
        assert!(
            audits
                .iter()
                .all(|a| a.field_name.as_deref() != Some("siteName"))
        );

        let fetched = store.get_site(site.site_id).unwrap().unwrap();
        assert_eq!(fetched.site_status, "closed");
    }

    #[test]
    fn test_close_site_sets_status_and_cease_date() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let site = seed_site(&store, "central");
        let closed = store.close_site(site.site_id, None).unwrap();

        assert_eq!(closed.site_status, "closed");
        assert!(closed.cease_date.is_some());

        // The row survives; closing is not a delete
        let fetched = store.get_site(site.site_id).unwrap().unwrap();
        assert_eq!(fetched.site_status, "closed");

        assert!(matches!(
            store.close_site(site.site_id + 99, None),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_duplicate_site_name_conflicts() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        seed_site(&store, "central");
        let result = store.create_site(&NewSite {
            site_name: "central".to_string(),
            site_location: "elsewhere".to_string(),
            site_status: None,
            cease_date: None,
            internal_site: None,
        });
        assert!(matches!(result, Err(Error::AlreadyExists)));
    }

    #[test]
    fn test_adjust_availability_rejects_overdraw() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let site = seed_site(&store, "central");
        let item = seed_item(&store, "widget", 9.99);
        seed_stock(&store, &site, &item, 10);

        let result = store.adjust_availability(site.site_id, item.item_id, -11);
        assert!(matches!(
            result,
            Err(Error::InsufficientStock {
                available: 10,
                requested: 11,
                ..
            })
        ));

        // Rejected adjustment leaves the quantity untouched
        assert_eq!(quantity_at(&store, &site, &item), Some(10));

        // Draining to exactly zero is fine
        let drained = store
            .adjust_availability(site.site_id, item.item_id, -10)
            .unwrap();
        assert_eq!(drained.quantity, 0);
    }

    #[test]
    fn test_adjust_availability_creates_row_on_credit() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let site = seed_site(&store, "central");
        let item = seed_item(&store, "widget", 9.99);

        let created = store
            .adjust_availability(site.site_id, item.item_id, 7)
            .unwrap();
        assert_eq!(created.quantity, 7);

        // Debit against a missing row is a reference error, not a stock error
        let other = seed_item(&store, "gadget", 1.0);
        assert!(matches!(
            store.adjust_availability(site.site_id, other.item_id, -1),
            Err(Error::InvalidReference(_))
        ));
    }

    #[test]
    fn test_availabilities_by_item_empty_for_unstocked_item() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let item = seed_item(&store, "widget", 9.99);
        let rows = store.list_availabilities_by_item(item.item_id).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_find_sites_stocking_all() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let a = seed_site(&store, "a");
        let b = seed_site(&store, "b");
        let widget = seed_item(&store, "widget", 1.0);
        let gadget = seed_item(&store, "gadget", 2.0);

        seed_stock(&store, &a, &widget, 5);
        seed_stock(&store, &a, &gadget, 5);
        seed_stock(&store, &b, &widget, 5);

        let both = store
            .find_sites_stocking_all(&[widget.item_id, gadget.item_id])
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].site_id, a.site_id);

        let widget_only = store.find_sites_stocking_all(&[widget.item_id]).unwrap();
        assert_eq!(widget_only.len(), 2);

        // No items means no filter
        let all = store.find_sites_stocking_all(&[]).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_shipment_moves_stock_and_writes_manifest() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let a = seed_site(&store, "a");
        let b = seed_site(&store, "b");
        let item = seed_item(&store, "widget", 1.0);
        seed_stock(&store, &a, &item, 50);
        seed_stock(&store, &b, &item, 20);

        let shipment = store
            .create_shipment(&ShipmentRequest {
                source: a.site_id,
                destination: b.site_id,
                items_with_quantities: BTreeMap::from([(item.item_id, 50)]),
            })
            .unwrap();

        assert_eq!(shipment.shipment_status, "In Transit");
        assert!(shipment.departure_time.is_some());

        // Conservation: 50 left the source, 50 arrived at the destination
        assert_eq!(quantity_at(&store, &a, &item), Some(0));
        assert_eq!(quantity_at(&store, &b, &item), Some(70));

        let line = store
            .get_ship(item.item_id, shipment.shipment_id)
            .unwrap()
            .unwrap();
        assert_eq!(line.quantity, 50);

        // Both quantity changes audited with old/new values
        let audits = store.list_audits_by_table("availabilities").unwrap();
        let updates: Vec<_> = audits
            .iter()
            .filter(|a| a.action == AuditAction::Update)
            .collect();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].old_value.as_deref(), Some("50"));
        assert_eq!(updates[0].new_value.as_deref(), Some("0"));
        assert_eq!(updates[1].old_value.as_deref(), Some("20"));
        assert_eq!(updates[1].new_value.as_deref(), Some("70"));

        let shipment_audits = store.list_audits_by_table("shipments").unwrap();
        assert_eq!(shipment_audits.len(), 1);
        assert_eq!(shipment_audits[0].action, AuditAction::Insert);
    }

    #[test]
    fn test_shipment_insufficient_stock_leaves_no_trace() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let a = seed_site(&store, "a");
        let b = seed_site(&store, "b");
        let item = seed_item(&store, "widget", 1.0);
        seed_stock(&store, &a, &item, 50);
        seed_stock(&store, &b, &item, 20);

        let result = store.create_shipment(&ShipmentRequest {
            source: a.site_id,
            destination: b.site_id,
            items_with_quantities: BTreeMap::from([(item.item_id, 60)]),
        });
        assert!(matches!(result, Err(Error::InsufficientStock { .. })));

        assert_eq!(quantity_at(&store, &a, &item), Some(50));
        assert_eq!(quantity_at(&store, &b, &item), Some(20));
        assert!(store.list_shipments().unwrap().is_empty());
        assert!(store.list_ships().unwrap().is_empty());
        assert!(store.list_audits_by_table("shipments").unwrap().is_empty());
    }

    #[test]
    fn test_shipment_rolls_back_earlier_lines_on_failure() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let a = seed_site(&store, "a");
        let b = seed_site(&store, "b");
        let widget = seed_item(&store, "widget", 1.0);
        let gadget = seed_item(&store, "gadget", 2.0);
        seed_stock(&store, &a, &widget, 50);
        seed_stock(&store, &a, &gadget, 3);

        // First line would succeed; the second overdraws
        let result = store.create_shipment(&ShipmentRequest {
            source: a.site_id,
            destination: b.site_id,
            items_with_quantities: BTreeMap::from([(widget.item_id, 10), (gadget.item_id, 5)]),
        });
        assert!(matches!(result, Err(Error::InsufficientStock { .. })));

        // The widget debit from the first line was rolled back too
        assert_eq!(quantity_at(&store, &a, &widget), Some(50));
        assert_eq!(quantity_at(&store, &a, &gadget), Some(3));
        assert!(quantity_at(&store, &b, &widget).is_none());
        assert!(store.list_shipments().unwrap().is_empty());
        assert!(store.list_audits_by_table("availabilities")
            .unwrap()
            .iter()
            .all(|audit| audit.action == AuditAction::Insert));
    }

    #[test]
    fn test_shipment_requires_existing_sites_and_items() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let a = seed_site(&store, "a");
        let item = seed_item(&store, "widget", 1.0);
        seed_stock(&store, &a, &item, 50);

        let missing_destination = store.create_shipment(&ShipmentRequest {
            source: a.site_id,
            destination: a.site_id + 99,
            items_with_quantities: BTreeMap::from([(item.item_id, 10)]),
        });
        assert!(matches!(
            missing_destination,
            Err(Error::InvalidReference(_))
        ));

        let b = seed_site(&store, "b");
        let missing_item = store.create_shipment(&ShipmentRequest {
            source: a.site_id,
            destination: b.site_id,
            items_with_quantities: BTreeMap::from([(item.item_id + 99, 10)]),
        });
        assert!(matches!(missing_item, Err(Error::InvalidReference(_))));

        assert_eq!(quantity_at(&store, &a, &item), Some(50));
        assert!(store.list_shipments().unwrap().is_empty());
    }

    #[test]
    fn test_shipment_creates_destination_availability() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let a = seed_site(&store, "a");
        let b = seed_site(&store, "b");
        let item = seed_item(&store, "widget", 1.0);
        seed_stock(&store, &a, &item, 50);

        store
            .create_shipment(&ShipmentRequest {
                source: a.site_id,
                destination: b.site_id,
                items_with_quantities: BTreeMap::from([(item.item_id, 20)]),
            })
            .unwrap();

        assert_eq!(quantity_at(&store, &a, &item), Some(30));
        assert_eq!(quantity_at(&store, &b, &item), Some(20));
    }

    #[test]
    fn test_shipment_rejects_empty_and_nonpositive_requests() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let a = seed_site(&store, "a");
        let b = seed_site(&store, "b");
        let item = seed_item(&store, "widget", 1.0);
        seed_stock(&store, &a, &item, 50);

        assert!(matches!(
            store.create_shipment(&ShipmentRequest {
                source: a.site_id,
                destination: b.site_id,
                items_with_quantities: BTreeMap::new(),
            }),
            Err(Error::BadRequest(_))
        ));

        assert!(matches!(
            store.create_shipment(&ShipmentRequest {
                source: a.site_id,
                destination: b.site_id,
                items_with_quantities: BTreeMap::from([(item.item_id, 0)]),
            }),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_delete_shipment_cascades_manifest_and_audits() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let a = seed_site(&store, "a");
        let b = seed_site(&store, "b");
        let item = seed_item(&store, "widget", 1.0);
        seed_stock(&store, &a, &item, 50);

        let shipment = store
            .create_shipment(&ShipmentRequest {
                source: a.site_id,
                destination: b.site_id,
                items_with_quantities: BTreeMap::from([(item.item_id, 5)]),
            })
            .unwrap();

        assert!(store.delete_shipment(shipment.shipment_id).unwrap());
        assert!(store.get_shipment(shipment.shipment_id).unwrap().is_none());
        assert!(
            store
                .list_ships_by_shipment(shipment.shipment_id)
                .unwrap()
                .is_empty()
        );
        assert!(!store.delete_shipment(shipment.shipment_id).unwrap());

        let audits = store.list_audits_by_table("shipments").unwrap();
        assert!(audits.iter().any(|a| a.action == AuditAction::Delete));
    }

    #[test]
    fn test_user_crud_and_unique_username() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        let user = store
            .create_user(&NewUser {
                username: "alice".to_string(),
                password: "hunter2".to_string(),
                position: Some("manager".to_string()),
            })
            .unwrap();

        let fetched = store.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(fetched.user_id, user.user_id);
        assert_eq!(fetched.password, "hunter2");

        let dup = store.create_user(&NewUser {
            username: "alice".to_string(),
            password: "other".to_string(),
            position: None,
        });
        assert!(matches!(dup, Err(Error::AlreadyExists)));

        assert!(store.delete_user(user.user_id).unwrap());
        assert!(store.get_user(user.user_id).unwrap().is_none());
    }

    #[test]
    fn test_audits_between_period() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);

        seed_site(&store, "central");

        let now = Utc::now();
        let within = store
            .list_audits_between(now - chrono::Duration::hours(1), now + chrono::Duration::hours(1))
            .unwrap();
        assert_eq!(within.len(), 1);

        let before = store
            .list_audits_between(now - chrono::Duration::hours(2), now - chrono::Duration::hours(1))
            .unwrap();
        assert!(before.is_empty());
    }
}
