// src/db/models/tag.rs

//! Global tag assignments

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

/// Database representation of a tag pointing at a product version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    pub id: Option<i64>,
    pub tag: String,
    pub product: String,
    pub flavor: String,
    pub version: String,
    pub assigned_by: Option<String>,
    pub assigned_at: Option<String>,
}

impl TagEntry {
    /// Point `tag` at `version`, moving it off whichever version held it
    pub fn assign(
        conn: &Connection,
        tag: &str,
        product: &str,
        flavor: &str,
        version: &str,
        assigned_by: Option<&str>,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO tags (tag, product, flavor, version, assigned_by)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(tag, product, flavor) DO UPDATE SET
                version = excluded.version,
                assigned_by = excluded.assigned_by,
                assigned_at = CURRENT_TIMESTAMP",
            params![tag, product, flavor, version, assigned_by],
        )?;
        Ok(())
    }

    /// Drop a tag; with a version, only if the tag points at it
    pub fn unassign(
        conn: &Connection,
        tag: &str,
        product: &str,
        flavor: &str,
        version: Option<&str>,
    ) -> Result<usize> {
        let count = match version {
            Some(version) => conn.execute(
                "DELETE FROM tags WHERE tag = ?1 AND product = ?2 AND flavor = ?3 AND version = ?4",
                params![tag, product, flavor, version],
            )?,
            None => conn.execute(
                "DELETE FROM tags WHERE tag = ?1 AND product = ?2 AND flavor = ?3",
                params![tag, product, flavor],
            )?,
        };
        Ok(count)
    }

    /// Version currently carrying `tag`
    pub fn find_version(conn: &Connection, tag: &str, product: &str, flavor: &str) -> Result<Option<String>> {
        let version = conn
            .query_row(
                "SELECT version FROM tags WHERE tag = ?1 AND product = ?2 AND flavor = ?3",
                params![tag, product, flavor],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }

    /// Tags held by one version
    pub fn tags_for(conn: &Connection, product: &str, flavor: &str, version: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT tag FROM tags WHERE product = ?1 AND flavor = ?2 AND version = ?3 ORDER BY tag",
        )?;
        let tags = stmt
            .query_map(params![product, flavor, version], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(tags)
    }

    /// Every assignment for a flavor
    pub fn list_by_flavor(conn: &Connection, flavor: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, tag, product, flavor, version, assigned_by, assigned_at
             FROM tags WHERE flavor = ?1 ORDER BY product, tag",
        )?;
        let entries = stmt
            .query_map([flavor], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Remove every tag pointing at a version
    pub fn delete_for_product(conn: &Connection, product: &str, flavor: &str, version: &str) -> Result<usize> {
        let count = conn.execute(
            "DELETE FROM tags WHERE product = ?1 AND flavor = ?2 AND version = ?3",
            params![product, flavor, version],
        )?;
        Ok(count)
    }

    /// Distinct tag names in use
    pub fn names(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT DISTINCT tag FROM tags ORDER BY tag")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            tag: row.get(1)?,
            product: row.get(2)?,
            flavor: row.get(3)?,
            version: row.get(4)?,
            assigned_by: row.get(5)?,
            assigned_at: row.get(6)?,
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
    fn test_assign_moves_tag() {
        let (_temp, conn) = create_test_db();

        TagEntry::assign(&conn, "current", "afw", "Linux", "1.0", None).unwrap();
        TagEntry::assign(&conn, "current", "afw", "Linux", "2.0", Some("rhl")).unwrap();

        assert_eq!(
            TagEntry::find_version(&conn, "current", "afw", "Linux").unwrap().as_deref(),
            Some("2.0")
        );
        assert!(TagEntry::tags_for(&conn, "afw", "Linux", "1.0").unwrap().is_empty());
        assert_eq!(TagEntry::list_by_flavor(&conn, "Linux").unwrap().len(), 1);
    }

    #[test]
    fn test_unassign_checks_version() {
        let (_temp, conn) = create_test_db();

        TagEntry::assign(&conn, "stable", "afw", "Linux", "1.0", None).unwrap();
        assert_eq!(TagEntry::unassign(&conn, "stable", "afw", "Linux", Some("2.0")).unwrap(), 0);
        assert_eq!(TagEntry::unassign(&conn, "stable", "afw", "Linux", Some("1.0")).unwrap(), 1);
        assert_eq!(TagEntry::find_version(&conn, "stable", "afw", "Linux").unwrap(), None);
    }

    #[test]
    fn test_delete_for_product_and_names() {
        let (_temp, conn) = create_test_db();

        TagEntry::assign(&conn, "current", "afw", "Linux", "1.0", None).unwrap();
        TagEntry::assign(&conn, "beta", "afw", "Linux", "1.0", None).unwrap();
        assert_eq!(TagEntry::names(&conn).unwrap(), vec!["beta", "current"]);

        assert_eq!(TagEntry::delete_for_product(&conn, "afw", "Linux", "1.0").unwrap(), 2);
        assert!(TagEntry::names(&conn).unwrap().is_empty());
    }
}
