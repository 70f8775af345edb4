// src/db/models/product.rs

//! Declared product rows

use crate::error::Result;
use crate::product::Product;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};

const COLUMNS: &str = "id, name, version, flavor, product_dir, table_file, declarer, declared_at";

/// Database representation of a declared product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductEntry {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    pub flavor: String,
    /// NULL means "none"
    pub product_dir: Option<String>,
    /// NULL means "none"
    pub table_file: Option<String>,
    pub declarer: Option<String>,
    pub declared_at: Option<String>,
}

impl ProductEntry {
    pub fn new(name: String, version: String, flavor: String) -> Self {
        Self {
            id: None,
            name,
            version,
            flavor,
            product_dir: None,
            table_file: None,
            declarer: None,
            declared_at: None,
        }
    }

    pub fn from_product(product: &Product) -> Self {
        Self {
            id: None,
            name: product.name.clone(),
            version: product.version.clone(),
            flavor: product.flavor.clone(),
            product_dir: product.dir.as_ref().map(|d| d.display().to_string()),
            table_file: product.table.as_ref().map(|t| t.display().to_string()),
            declarer: product.declarer.clone(),
            declared_at: product.declared_at.clone(),
        }
    }

    /// Convert to a [`Product`] owned by the stack at `stack`
    pub fn to_product(&self, stack: &Path) -> Product {
        Product {
            name: self.name.clone(),
            version: self.version.clone(),
            flavor: self.flavor.clone(),
            dir: self.product_dir.as_ref().map(PathBuf::from),
            table: self.table_file.as_ref().map(PathBuf::from),
            stack: Some(stack.to_path_buf()),
            tags: Default::default(),
            declarer: self.declarer.clone(),
            declared_at: self.declared_at.clone(),
        }
    }

    /// Insert this product, replacing the directory, table and declarer of
    /// an existing row with the same (name, version, flavor)
    pub fn upsert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO products (name, version, flavor, product_dir, table_file, declarer, declared_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, COALESCE(?7, CURRENT_TIMESTAMP))
             ON CONFLICT(name, version, flavor) DO UPDATE SET
                product_dir = excluded.product_dir,
                table_file = excluded.table_file,
                declarer = excluded.declarer,
                declared_at = excluded.declared_at",
            params![
                &self.name,
                &self.version,
                &self.flavor,
                &self.product_dir,
                &self.table_file,
                &self.declarer,
                &self.declared_at,
            ],
        )?;

        let id = conn.query_row(
            "SELECT id FROM products WHERE name = ?1 AND version = ?2 AND flavor = ?3",
            params![&self.name, &self.version, &self.flavor],
            |row| row.get(0),
        )?;
        self.id = Some(id);
        Ok(id)
    }

    /// Find one declared version
    pub fn find(conn: &Connection, name: &str, version: &str, flavor: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM products WHERE name = ?1 AND version = ?2 AND flavor = ?3"
        ))?;

        let entry = stmt
            .query_row(params![name, version, flavor], Self::from_row)
            .optional()?;
        Ok(entry)
    }

    /// All versions of a product for a flavor
    pub fn find_by_name(conn: &Connection, name: &str, flavor: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM products WHERE name = ?1 AND flavor = ?2 ORDER BY version"
        ))?;

        let entries = stmt
            .query_map(params![name, flavor], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Every product declared for a flavor
    pub fn list_by_flavor(conn: &Connection, flavor: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM products WHERE flavor = ?1 ORDER BY name, version"
        ))?;

        let entries = stmt
            .query_map([flavor], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Flavors with at least one declaration
    pub fn flavors(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT DISTINCT flavor FROM products ORDER BY flavor")?;
        let flavors = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(flavors)
    }

    /// Delete a declaration, returning the number of rows removed
    pub fn delete(conn: &Connection, name: &str, version: &str, flavor: &str) -> Result<usize> {
        let count = conn.execute(
            "DELETE FROM products WHERE name = ?1 AND version = ?2 AND flavor = ?3",
            params![name, version, flavor],
        )?;
        Ok(count)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            version: row.get(2)?,
            flavor: row.get(3)?,
            product_dir: row.get(4)?,
            table_file: row.get(5)?,
            declarer: row.get(6)?,
            declared_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        crate::db::schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_product_crud() {
        let (_temp, conn) = create_test_db();

        let mut entry = ProductEntry::new("afw".into(), "1.0".into(), "Linux".into());
        entry.product_dir = Some("/opt/afw/1.0".into());
        let id = entry.upsert(&conn).unwrap();
        assert!(id > 0);

        let found = ProductEntry::find(&conn, "afw", "1.0", "Linux").unwrap().unwrap();
        assert_eq!(found.product_dir.as_deref(), Some("/opt/afw/1.0"));
        assert_eq!(found.table_file, None);
        assert!(found.declared_at.is_some());

        assert!(ProductEntry::find(&conn, "afw", "1.0", "Darwin").unwrap().is_none());
        assert_eq!(ProductEntry::delete(&conn, "afw", "1.0", "Linux").unwrap(), 1);
        assert!(ProductEntry::find(&conn, "afw", "1.0", "Linux").unwrap().is_none());
    }

    #[test]
    fn test_upsert_replaces_fields() {
        let (_temp, conn) = create_test_db();

        let mut first = ProductEntry::new("afw".into(), "1.0".into(), "Linux".into());
        first.product_dir = Some("/a".into());
        let id = first.upsert(&conn).unwrap();

        let mut second = ProductEntry::new("afw".into(), "1.0".into(), "Linux".into());
        second.product_dir = Some("/b".into());
        assert_eq!(second.upsert(&conn).unwrap(), id);

        let all = ProductEntry::find_by_name(&conn, "afw", "Linux").unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].product_dir.as_deref(), Some("/b"));
    }

    #[test]
    fn test_list_by_flavor() {
        let (_temp, conn) = create_test_db();

        for (name, flavor) in [("afw", "Linux"), ("boost", "Linux"), ("afw", "Darwin")] {
            ProductEntry::new(name.into(), "1.0".into(), flavor.into())
                .upsert(&conn)
                .unwrap();
        }

        let linux = ProductEntry::list_by_flavor(&conn, "Linux").unwrap();
        assert_eq!(linux.len(), 2);
        assert_eq!(ProductEntry::flavors(&conn).unwrap(), vec!["Darwin", "Linux"]);
    }
}
