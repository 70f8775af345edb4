// src/db/mod.rs

//! Per-stack product database
//!
//! Every stack keeps its declarations in `ups_db/products.db`, a SQLite
//! file created on first write. Reads against a stack that has never been
//! written treat the missing file as an empty database.

pub mod migrations;
pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::debug;

/// Create the database (and its directory) if needed and bring the schema
/// up to date
pub fn init(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    debug!("Initializing product database at {}", db_path.display());
    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    Ok(())
}

/// Open an existing database
pub fn open(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        return Err(Error::NotFound(format!(
            "Product database not found at {}",
            db_path.display()
        )));
    }

    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    Ok(conn)
}

/// Open a database, creating it first if it does not exist
pub fn open_or_init(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        init(db_path)?;
    }
    open(db_path)
}

/// Run `f` inside a transaction, committing only if it succeeds
pub fn transaction<F, T>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_database() {
        let temp = TempDir::new().unwrap();
        let err = open(&temp.path().join("products.db")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_init_creates_parent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ups_db").join("products.db");
        init(&path).unwrap();
        assert!(path.exists());

        let conn = open(&path).unwrap();
        assert_eq!(schema::get_schema_version(&conn).unwrap(), schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("products.db");
        let mut conn = open_or_init(&path).unwrap();

        let result: Result<()> = transaction(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO products (name, version, flavor) VALUES ('afw', '1.0', 'Linux')",
                [],
            )?;
            Err(Error::Internal("abort".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
