// src/store/database.rs

//! SQLite-backed product store for one stack

use crate::db::{self, models::{ProductEntry, TagEntry, current_user}};
use crate::error::Result;
use crate::product::{Product, Stack};
use crate::store::ProductStore;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Identifies one state of a database file
///
/// The SQLite header carries a change counter bumped by every committed
/// write, which catches writes landing within the same mtime tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbStamp {
    pub modified_ns: u64,
    pub changes: u32,
}

/// The authoritative store: `ups_db/products.db`
///
/// A connection is opened per operation. A stack whose database file has
/// not been created yet reads as empty.
#[derive(Debug, Clone)]
pub struct Database {
    stack: Stack,
}

impl Database {
    pub fn new(stack: Stack) -> Self {
        Self { stack }
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Current stamp of the database file
    ///
    /// Caches record the stamp they were built from; `None` means the
    /// database does not exist.
    pub fn stamp(&self) -> Option<DbStamp> {
        let path = self.stack.db_file();
        let modified = std::fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .ok()?;
        let modified_ns = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        let mut header = [0u8; 28];
        let changes = File::open(&path)
            .and_then(|mut f| f.read_exact(&mut header))
            .map(|()| u32::from_be_bytes([header[24], header[25], header[26], header[27]]))
            .unwrap_or(0);

        Some(DbStamp {
            modified_ns,
            changes,
        })
    }

    /// Flavors with at least one declaration
    pub fn flavors(&self) -> Result<Vec<String>> {
        match self.reader()? {
            Some(conn) => ProductEntry::flavors(&conn),
            None => Ok(Vec::new()),
        }
    }

    /// Tag names used anywhere in this stack
    pub fn tag_names(&self) -> Result<Vec<String>> {
        match self.reader()? {
            Some(conn) => TagEntry::names(&conn),
            None => Ok(Vec::new()),
        }
    }

    fn reader(&self) -> Result<Option<Connection>> {
        let path = self.stack.db_file();
        if !path.exists() {
            debug!("No product database in {}", self.stack);
            return Ok(None);
        }
        db::open(&path).map(Some)
    }

    fn writer(&self) -> Result<Connection> {
        db::open_or_init(&self.stack.db_file())
    }

    fn with_tags(&self, conn: &Connection, entry: &ProductEntry) -> Result<Product> {
        let mut product = entry.to_product(self.stack.root());
        product.tags = TagEntry::tags_for(conn, &entry.name, &entry.flavor, &entry.version)?
            .into_iter()
            .collect();
        Ok(product)
    }
}

impl ProductStore for Database {
    fn find_product(&self, name: &str, version: &str, flavor: &str) -> Result<Option<Product>> {
        let Some(conn) = self.reader()? else {
            return Ok(None);
        };
        match ProductEntry::find(&conn, name, version, flavor)? {
            Some(entry) => Ok(Some(self.with_tags(&conn, &entry)?)),
            None => Ok(None),
        }
    }

    fn find_products(&self, name: &str, flavor: &str) -> Result<Vec<Product>> {
        let Some(conn) = self.reader()? else {
            return Ok(Vec::new());
        };
        ProductEntry::find_by_name(&conn, name, flavor)?
            .iter()
            .map(|entry| self.with_tags(&conn, entry))
            .collect()
    }

    fn tagged_version(&self, tag: &str, name: &str, flavor: &str) -> Result<Option<String>> {
        match self.reader()? {
            Some(conn) => TagEntry::find_version(&conn, tag, name, flavor),
            None => Ok(None),
        }
    }

    fn list_products(&self, flavor: &str) -> Result<Vec<Product>> {
        let Some(conn) = self.reader()? else {
            return Ok(Vec::new());
        };
        ProductEntry::list_by_flavor(&conn, flavor)?
            .iter()
            .map(|entry| self.with_tags(&conn, entry))
            .collect()
    }

    fn declare(&mut self, product: &Product) -> Result<()> {
        let mut conn = self.writer()?;
        let mut entry = ProductEntry::from_product(product);
        if entry.declarer.is_none() {
            entry.declarer = current_user();
        }
        db::transaction(&mut conn, |tx| {
            entry.upsert(tx)?;
            Ok(())
        })
    }

    fn undeclare(&mut self, product: &Product) -> Result<bool> {
        let mut conn = self.writer()?;
        db::transaction(&mut conn, |tx| {
            TagEntry::delete_for_product(tx, &product.name, &product.flavor, &product.version)?;
            let removed =
                ProductEntry::delete(tx, &product.name, &product.version, &product.flavor)?;
            Ok(removed > 0)
        })
    }

    fn assign_tag(&mut self, tag: &str, product: &Product) -> Result<()> {
        let conn = self.writer()?;
        TagEntry::assign(
            &conn,
            tag,
            &product.name,
            &product.flavor,
            &product.version,
            current_user().as_deref(),
        )
    }

    fn unassign_tag(&mut self, tag: &str, name: &str, version: Option<&str>, flavor: &str) -> Result<bool> {
        let Some(conn) = self.reader()? else {
            return Ok(false);
        };
        Ok(TagEntry::unassign(&conn, tag, name, flavor, version)? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_stack() -> (TempDir, Database) {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("ups_db")).unwrap();
        let db = Database::new(Stack::new(temp.path()));
        (temp, db)
    }

    #[test]
    fn test_missing_database_reads_empty() {
        let (_temp, db) = test_stack();
        assert!(db.list_products("Linux").unwrap().is_empty());
        assert!(db.find_product("afw", "1.0", "Linux").unwrap().is_none());
        assert_eq!(db.stamp(), None);
    }

    #[test]
    fn test_declare_find_undeclare() {
        let (temp, mut db) = test_stack();
        let product = Product::new("afw", "1.0", "Linux").with_dir("/opt/afw");

        db.declare(&product).unwrap();
        db.assign_tag("current", &product).unwrap();
        assert!(db.stamp().is_some());

        let found = db.find_product("afw", "1.0", "Linux").unwrap().unwrap();
        assert_eq!(found.dir, product.dir);
        assert_eq!(found.stack.as_deref(), Some(temp.path()));
        assert!(found.tags.contains("current"));
        assert_eq!(
            db.tagged_version("current", "afw", "Linux").unwrap().as_deref(),
            Some("1.0")
        );

        assert!(db.undeclare(&product).unwrap());
        assert!(db.find_product("afw", "1.0", "Linux").unwrap().is_none());
        assert_eq!(db.tagged_version("current", "afw", "Linux").unwrap(), None);
        assert!(!db.undeclare(&product).unwrap());
    }
}
