//! Demo mode with a pre-populated parts catalogue.
//!
//! Provides a few related tables, a view and an alias table so every endpoint
//! has something to work on out of the box.

use crate::error::Result;
use crate::session::Database;

/// Tables, view and rows created by `--demo`. Safe to apply more than once.
pub const DEMO_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS supplier (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    country TEXT,
    rating REAL DEFAULT 3.0
);

CREATE TABLE IF NOT EXISTS part (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    supplier_id INTEGER REFERENCES supplier(id),
    unit_price REAL NOT NULL,
    in_stock INTEGER NOT NULL DEFAULT 0,
    notes TEXT
);

CREATE TABLE IF NOT EXISTS altnames (
    id INTEGER NOT NULL,
    altname TEXT NOT NULL
);

CREATE VIEW IF NOT EXISTS part_overview AS
    SELECT part.id, part.name, supplier.name AS supplier, part.unit_price, part.in_stock
    FROM part LEFT JOIN supplier ON supplier.id = part.supplier_id;

INSERT INTO supplier (name, country, rating)
    SELECT 'Nordic Fasteners', 'Norway', 4.6
    WHERE NOT EXISTS (SELECT 1 FROM supplier);
INSERT INTO supplier (name, country, rating)
    SELECT 'Baltic Metalworks', 'Latvia', 3.9
    WHERE (SELECT COUNT(*) FROM supplier) = 1;

INSERT INTO part (name, supplier_id, unit_price, in_stock, notes)
    SELECT 'Hex bolt M8x40', 1, 0.35, 1200, NULL
    WHERE NOT EXISTS (SELECT 1 FROM part);
INSERT INTO part (name, supplier_id, unit_price, in_stock, notes)
    SELECT 'Hex nut M8', 1, 0.08, 5000, 'zinc plated'
    WHERE (SELECT COUNT(*) FROM part) = 1;
INSERT INTO part (name, supplier_id, unit_price, in_stock, notes)
    SELECT 'Flat washer 8mm', 2, 0.03, 0, 'backordered'
    WHERE (SELECT COUNT(*) FROM part) = 2;

INSERT INTO altnames (id, altname)
    SELECT 1, 'Hex bolt M8x40' WHERE NOT EXISTS (SELECT 1 FROM altnames);
INSERT INTO altnames (id, altname)
    SELECT 1, 'M8 hexagon bolt 40mm' WHERE (SELECT COUNT(*) FROM altnames) = 1;
INSERT INTO altnames (id, altname)
    SELECT 2, 'Hex nut M8' WHERE (SELECT COUNT(*) FROM altnames) = 2;
INSERT INTO altnames (id, altname)
    SELECT 3, 'Flat washer 8mm' WHERE (SELECT COUNT(*) FROM altnames) = 3;
"#;

/// Create the demo tables and rows if they are missing.
pub fn seed(database: &Database) -> Result<()> {
    database.apply_script(DEMO_SCHEMA)?;
    tracing::info!("Demo data ready");
    Ok(())
}
