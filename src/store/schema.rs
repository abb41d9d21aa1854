pub const SCHEMA: &str = r#"
-- Physical sites (warehouses, storefronts)
CREATE TABLE IF NOT EXISTS sites (
    site_id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_name TEXT NOT NULL UNIQUE,
    site_location TEXT NOT NULL,
    site_status TEXT NOT NULL DEFAULT 'open',
    cease_date TEXT,               -- NULL while the site is operating
    internal_site INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS items (
    item_id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_name TEXT NOT NULL UNIQUE,
    item_price REAL NOT NULL CHECK (item_price >= 0)
);

-- Stock level of one item at one site. The CHECK backs up the conditional
-- updates in the store layer; quantity must never go negative.
CREATE TABLE IF NOT EXISTS availabilities (
    site_id INTEGER NOT NULL REFERENCES sites(site_id),
    item_id INTEGER NOT NULL REFERENCES items(item_id),
    quantity INTEGER NOT NULL CHECK (quantity >= 0),
    PRIMARY KEY (site_id, item_id)
);

CREATE TABLE IF NOT EXISTS shipments (
    shipment_id INTEGER PRIMARY KEY AUTOINCREMENT,
    source INTEGER NOT NULL REFERENCES sites(site_id),
    destination INTEGER NOT NULL REFERENCES sites(site_id),
    current_location TEXT,
    departure_time TEXT,
    estimated_arrival_time TEXT,
    actual_arrival_time TEXT,
    shipment_status TEXT NOT NULL
);

-- Manifest lines: quantity of one item within one shipment
CREATE TABLE IF NOT EXISTS ships (
    item_id INTEGER NOT NULL REFERENCES items(item_id),
    shipment_id INTEGER NOT NULL REFERENCES shipments(shipment_id) ON DELETE CASCADE,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    PRIMARY KEY (item_id, shipment_id)
);

CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,        -- plaintext, preserved from the source system
    position TEXT
);

-- Append-only change log; rows are never updated or deleted
CREATE TABLE IF NOT EXISTS audits (
    audit_id INTEGER PRIMARY KEY AUTOINCREMENT,
    table_name TEXT NOT NULL,
    field_name TEXT,               -- NULL = whole-row event
    row_key TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    action TEXT NOT NULL,          -- INSERT | UPDATE | DELETE
    action_timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_availabilities_item ON availabilities(item_id);
CREATE INDEX IF NOT EXISTS idx_ships_shipment ON ships(shipment_id);
CREATE INDEX IF NOT EXISTS idx_audits_table ON audits(table_name);
CREATE INDEX IF NOT EXISTS idx_audits_timestamp ON audits(action_timestamp);
"#;
