// src/db/migrations.rs
//! Database migration implementations

use crate::error::Result;
use rusqlite::Connection;
use tracing::debug;

/// Initial schema - Version 1
///
/// - products: one row per declared (name, version, flavor)
/// - tags: global tag assignments; the unique key means a tag points at
///   no more than one version of a product per flavor
pub fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            version TEXT NOT NULL,
            flavor TEXT NOT NULL,
            product_dir TEXT,
            table_file TEXT,
            declarer TEXT,
            declared_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(name, version, flavor)
        );

        CREATE INDEX idx_products_name ON products(name, flavor);

        CREATE TABLE tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tag TEXT NOT NULL,
            product TEXT NOT NULL,
            flavor TEXT NOT NULL,
            version TEXT NOT NULL,
            assigned_by TEXT,
            assigned_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(tag, product, flavor)
        );

        CREATE INDEX idx_tags_product ON tags(product, flavor, version);
        ",
    )?;

    Ok(())
}
