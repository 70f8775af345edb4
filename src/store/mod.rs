// src/store/mod.rs

//! Product stores: where declarations live
//!
//! [`Database`] is authoritative, [`ProductCache`] is an advisory mirror,
//! and [`ProductStack`] combines the two for one search-path entry: reads
//! prefer a fresh cache and fall back to the database, writes go to the
//! database and are mirrored into the cache.

mod cache;
mod database;

pub use cache::{CACHE_SUFFIX, ProductCache};
pub use database::{Database, DbStamp};

use crate::error::Result;
use crate::product::{Product, Stack};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lookup and mutation of declared products
pub trait ProductStore {
    fn find_product(&self, name: &str, version: &str, flavor: &str) -> Result<Option<Product>>;

    /// All versions of `name` for `flavor`
    fn find_products(&self, name: &str, flavor: &str) -> Result<Vec<Product>>;

    /// The version of `name` carrying global `tag`
    fn tagged_version(&self, tag: &str, name: &str, flavor: &str) -> Result<Option<String>>;

    fn list_products(&self, flavor: &str) -> Result<Vec<Product>>;

    /// Insert or replace a declaration
    fn declare(&mut self, product: &Product) -> Result<()>;

    /// Remove a declaration and its tags; false if it was not declared
    fn undeclare(&mut self, product: &Product) -> Result<bool>;

    fn assign_tag(&mut self, tag: &str, product: &Product) -> Result<()>;

    /// False if the tag was not held
    fn unassign_tag(&mut self, tag: &str, name: &str, version: Option<&str>, flavor: &str) -> Result<bool>;
}

/// One stack on the search path with its database and caches
#[derive(Debug, Clone)]
pub struct ProductStack {
    db: Database,
    cache_dir: PathBuf,
    caches: BTreeMap<String, ProductCache>,
}

impl ProductStack {
    /// Open a stack without loading any caches
    pub fn new(stack: Stack, user_data_dir: &Path) -> Self {
        let cache_dir = cache_dir_for(&stack, user_data_dir);
        Self {
            db: Database::new(stack),
            cache_dir,
            caches: BTreeMap::new(),
        }
    }

    /// Open a stack and load (or rebuild) its caches for `flavors`
    pub fn open(stack: Stack, user_data_dir: &Path, flavors: &[String]) -> Self {
        let mut product_stack = Self::new(stack, user_data_dir);
        for flavor in flavors {
            product_stack.load_cache(flavor);
        }
        product_stack
    }

    pub fn stack(&self) -> &Stack {
        self.db.stack()
    }

    pub fn root(&self) -> &Path {
        self.db.stack().root()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn is_writable(&self) -> bool {
        self.db.stack().is_writable()
    }

    /// Directory holding this stack's cache files
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Load the cache for `flavor`, rebuilding it if missing or stale
    ///
    /// Failures leave the stack without a cache for that flavor.
    pub fn load_cache(&mut self, flavor: &str) {
        let path = ProductCache::path_for(&self.cache_dir, flavor);
        let stamp = self.db.stamp();

        let cache = match ProductCache::load(&path) {
            Ok(Some(cache)) if cache.is_fresh(stamp) => Some(cache),
            Ok(_) => None,
            Err(e) => {
                debug!("Ignoring unreadable cache {}: {}", path.display(), e);
                None
            }
        };

        let cache = match cache {
            Some(cache) => cache,
            None => match ProductCache::build(&self.db, flavor, &path) {
                Ok(cache) => {
                    if let Err(e) = cache.save() {
                        warn!("Unable to save cache {}: {}", path.display(), e);
                    }
                    cache
                }
                Err(e) => {
                    warn!("Unable to build {} cache for {}: {}", flavor, self.stack(), e);
                    return;
                }
            },
        };

        self.caches.insert(flavor.to_string(), cache);
    }

    /// The store to read `flavor` from
    pub fn reader(&self, flavor: &str, use_cache: bool) -> &dyn ProductStore {
        if use_cache
            && let Some(cache) = self.caches.get(flavor)
            && cache.is_fresh(self.db.stamp())
        {
            return cache;
        }
        &self.db
    }

    /// Delete every cache file of this stack
    pub fn clear_cache(&mut self) -> Result<usize> {
        self.caches.clear();
        let mut removed = 0;

        if !self.cache_dir.is_dir() {
            return Ok(0);
        }
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            let is_cache = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(CACHE_SUFFIX));
            if is_cache {
                std::fs::remove_file(&path)?;
                debug!("Removed cache {}", path.display());
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Bring the cache for `product.flavor` back in line after a write
    fn mirror<F>(&mut self, flavor: &str, update: F)
    where
        F: FnOnce(&mut ProductCache) -> Result<()>,
    {
        let stamp = self.db.stamp();
        let Some(cache) = self.caches.get_mut(flavor) else {
            return;
        };

        let saved = update(cache).and_then(|()| {
            cache.set_stamp(stamp);
            cache.save()
        });
        if let Err(e) = saved {
            warn!("Unable to save cache {}: {}", cache.path().display(), e);
        }
    }
}

impl ProductStore for ProductStack {
    fn find_product(&self, name: &str, version: &str, flavor: &str) -> Result<Option<Product>> {
        self.reader(flavor, true).find_product(name, version, flavor)
    }

    fn find_products(&self, name: &str, flavor: &str) -> Result<Vec<Product>> {
        self.reader(flavor, true).find_products(name, flavor)
    }

    fn tagged_version(&self, tag: &str, name: &str, flavor: &str) -> Result<Option<String>> {
        self.reader(flavor, true).tagged_version(tag, name, flavor)
    }

    fn list_products(&self, flavor: &str) -> Result<Vec<Product>> {
        self.reader(flavor, true).list_products(flavor)
    }

    fn declare(&mut self, product: &Product) -> Result<()> {
        self.db.declare(product)?;
        // Mirror the row as stored, with the declarer and timestamp the
        // database filled in
        if let Some(stored) = self
            .db
            .find_product(&product.name, &product.version, &product.flavor)?
        {
            self.mirror(&product.flavor, |cache| cache.declare(&stored));
        }
        Ok(())
    }

    fn undeclare(&mut self, product: &Product) -> Result<bool> {
        let removed = self.db.undeclare(product)?;
        self.mirror(&product.flavor, |cache| cache.undeclare(product).map(|_| ()));
        Ok(removed)
    }

    fn assign_tag(&mut self, tag: &str, product: &Product) -> Result<()> {
        self.db.assign_tag(tag, product)?;
        self.mirror(&product.flavor, |cache| cache.assign_tag(tag, product));
        Ok(())
    }

    fn unassign_tag(&mut self, tag: &str, name: &str, version: Option<&str>, flavor: &str) -> Result<bool> {
        let removed = self.db.unassign_tag(tag, name, version, flavor)?;
        self.mirror(flavor, |cache| cache.unassign_tag(tag, name, version, flavor).map(|_| ()));
        Ok(removed)
    }
}

/// Caches live beside the database when it is writable, else under the
/// user data directory keyed by the stack path
fn cache_dir_for(stack: &Stack, user_data_dir: &Path) -> PathBuf {
    if stack.is_writable() {
        return stack.db_dir();
    }

    let mangled: String = stack
        .root()
        .display()
        .to_string()
        .trim_start_matches('/')
        .replace('/', "_");
    user_data_dir.join("_caches_").join(mangled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_stack() -> (TempDir, ProductStack) {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("ups_db")).unwrap();
        let user = temp.path().join("user");
        let stack = ProductStack::open(Stack::new(temp.path()), &user, &["Linux".to_string()]);
        (temp, stack)
    }

    #[test]
    fn test_writes_keep_cache_fresh() {
        let (temp, mut stack) = open_stack();
        let product = Product::new("afw", "1.0", "Linux").with_dir("/opt/afw");

        stack.declare(&product).unwrap();
        stack.assign_tag("current", &product).unwrap();

        let cache_path = temp.path().join("ups_db").join("Linux.cache.json");
        let cache = ProductCache::load(&cache_path).unwrap().unwrap();
        assert!(cache.is_fresh(stack.database().stamp()));
        assert_eq!(
            cache.tagged_version("current", "afw", "Linux").unwrap().as_deref(),
            Some("1.0")
        );
    }

    #[test]
    fn test_stale_cache_falls_back_to_database() {
        let (temp, mut stack) = open_stack();
        stack.declare(&Product::new("afw", "1.0", "Linux")).unwrap();

        // Write behind the stack's back so its cache goes stale
        let mut db = Database::new(Stack::new(temp.path()));
        db.declare(&Product::new("afw", "2.0", "Linux")).unwrap();

        let versions: Vec<String> = stack
            .find_products("afw", "Linux")
            .unwrap()
            .into_iter()
            .map(|p| p.version)
            .collect();
        assert_eq!(versions, vec!["1.0", "2.0"]);
    }

    #[test]
    fn test_clear_cache() {
        let (_temp, mut stack) = open_stack();
        stack.declare(&Product::new("afw", "1.0", "Linux")).unwrap();
        assert_eq!(stack.clear_cache().unwrap(), 1);
        assert_eq!(stack.clear_cache().unwrap(), 0);
    }
}
