// src/store/cache.rs

//! Advisory JSON cache of a stack's declarations
//!
//! One file per (stack, flavor) holding every declared product and the
//! database stamp it was built from. The cache is never authoritative: a
//! stamp mismatch means it is stale and readers go to the database.

use crate::error::Result;
use crate::product::Product;
use crate::store::{Database, DbStamp, ProductStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Suffix of cache files
pub const CACHE_SUFFIX: &str = ".cache.json";

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    flavor: String,
    db_stamp: Option<DbStamp>,
    products: Vec<Product>,
}

/// In-memory view of one cache file
#[derive(Debug, Clone)]
pub struct ProductCache {
    path: PathBuf,
    flavor: String,
    db_stamp: Option<DbStamp>,
    products: BTreeMap<(String, String), Product>,
}

impl ProductCache {
    /// Cache file for `flavor` inside `dir`
    pub fn path_for(dir: &Path, flavor: &str) -> PathBuf {
        dir.join(format!("{flavor}{CACHE_SUFFIX}"))
    }

    /// Read a cache file; a missing file is `Ok(None)`
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        let file: CacheFile = serde_json::from_str(&content)?;

        Ok(Some(Self {
            path: path.to_path_buf(),
            flavor: file.flavor,
            db_stamp: file.db_stamp,
            products: file
                .products
                .into_iter()
                .map(|p| ((p.name.clone(), p.version.clone()), p))
                .collect(),
        }))
    }

    /// Rebuild from the database
    pub fn build(db: &Database, flavor: &str, path: &Path) -> Result<Self> {
        debug!("Building {} cache for {}", flavor, db.stack());
        let db_stamp = db.stamp();
        let products = db
            .list_products(flavor)?
            .into_iter()
            .map(|p| ((p.name.clone(), p.version.clone()), p))
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            flavor: flavor.to_string(),
            db_stamp,
            products,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flavor(&self) -> &str {
        &self.flavor
    }

    /// True if built from the database as it currently stands
    pub fn is_fresh(&self, db_stamp: Option<DbStamp>) -> bool {
        self.db_stamp == db_stamp
    }

    /// Record the stamp of the database this cache now mirrors
    pub fn set_stamp(&mut self, db_stamp: Option<DbStamp>) {
        self.db_stamp = db_stamp;
    }

    /// Write the cache atomically
    pub fn save(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let file = CacheFile {
            flavor: self.flavor.clone(),
            db_stamp: self.db_stamp,
            products: self.products.values().cloned().collect(),
        };

        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, &file)?;
        temp.flush()?;
        temp.persist(&self.path).map_err(|e| e.error)?;

        debug!("Saved cache {}", self.path.display());
        Ok(())
    }
}

impl ProductStore for ProductCache {
    fn find_product(&self, name: &str, version: &str, flavor: &str) -> Result<Option<Product>> {
        if flavor != self.flavor {
            return Ok(None);
        }
        Ok(self
            .products
            .get(&(name.to_string(), version.to_string()))
            .cloned())
    }

    fn find_products(&self, name: &str, flavor: &str) -> Result<Vec<Product>> {
        if flavor != self.flavor {
            return Ok(Vec::new());
        }
        Ok(self
            .products
            .values()
            .filter(|p| p.name == name)
            .cloned()
            .collect())
    }

    fn tagged_version(&self, tag: &str, name: &str, flavor: &str) -> Result<Option<String>> {
        Ok(self
            .find_products(name, flavor)?
            .into_iter()
            .find(|p| p.tags.contains(tag))
            .map(|p| p.version))
    }

    fn list_products(&self, flavor: &str) -> Result<Vec<Product>> {
        if flavor != self.flavor {
            return Ok(Vec::new());
        }
        Ok(self.products.values().cloned().collect())
    }

    fn declare(&mut self, product: &Product) -> Result<()> {
        if product.flavor == self.flavor {
            let key = (product.name.clone(), product.version.clone());
            let mut product = product.clone();
            if let Some(existing) = self.products.get(&key) {
                product.tags.extend(existing.tags.iter().cloned());
            }
            self.products.insert(key, product);
        }
        Ok(())
    }

    fn undeclare(&mut self, product: &Product) -> Result<bool> {
        if product.flavor != self.flavor {
            return Ok(false);
        }
        Ok(self
            .products
            .remove(&(product.name.clone(), product.version.clone()))
            .is_some())
    }

    fn assign_tag(&mut self, tag: &str, product: &Product) -> Result<()> {
        if product.flavor != self.flavor {
            return Ok(());
        }
        for held in self.products.values_mut().filter(|p| p.name == product.name) {
            if held.version == product.version {
                held.tags.insert(tag.to_string());
            } else {
                held.tags.remove(tag);
            }
        }
        Ok(())
    }

    fn unassign_tag(&mut self, tag: &str, name: &str, version: Option<&str>, flavor: &str) -> Result<bool> {
        if flavor != self.flavor {
            return Ok(false);
        }
        let mut removed = false;
        for held in self.products.values_mut().filter(|p| p.name == name) {
            if version.is_none_or(|v| v == held.version) {
                removed |= held.tags.remove(tag);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Stack;
    use tempfile::TempDir;

    fn declared_stack() -> (TempDir, Database) {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("ups_db")).unwrap();
        let mut db = Database::new(Stack::new(temp.path()));
        let product = Product::new("afw", "1.0", "Linux").with_dir("/opt/afw");
        db.declare(&product).unwrap();
        db.assign_tag("current", &product).unwrap();
        (temp, db)
    }

    #[test]
    fn test_build_save_load() {
        let (temp, db) = declared_stack();
        let path = ProductCache::path_for(&temp.path().join("ups_db"), "Linux");

        let cache = ProductCache::build(&db, "Linux", &path).unwrap();
        assert!(cache.is_fresh(db.stamp()));
        cache.save().unwrap();

        let loaded = ProductCache::load(&path).unwrap().unwrap();
        assert!(loaded.is_fresh(db.stamp()));
        assert_eq!(
            loaded.tagged_version("current", "afw", "Linux").unwrap().as_deref(),
            Some("1.0")
        );
        assert!(loaded.list_products("Darwin").unwrap().is_empty());
    }

    #[test]
    fn test_load_missing() {
        let temp = TempDir::new().unwrap();
        assert!(ProductCache::load(&temp.path().join("Linux.cache.json")).unwrap().is_none());
    }

    #[test]
    fn test_assign_tag_moves_in_cache() {
        let (temp, db) = declared_stack();
        let path = ProductCache::path_for(temp.path(), "Linux");
        let mut cache = ProductCache::build(&db, "Linux", &path).unwrap();

        let newer = Product::new("afw", "2.0", "Linux");
        cache.declare(&newer).unwrap();
        cache.assign_tag("current", &newer).unwrap();

        assert_eq!(
            cache.tagged_version("current", "afw", "Linux").unwrap().as_deref(),
            Some("2.0")
        );
        assert!(!cache.unassign_tag("current", "afw", Some("1.0"), "Linux").unwrap());
        assert!(cache.unassign_tag("current", "afw", None, "Linux").unwrap());
    }
}
