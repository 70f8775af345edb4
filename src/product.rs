// src/product.rs

//! Declared products and the stacks that hold them

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Sentinel accepted wherever a directory or table may be absent
pub const NONE: &str = "none";

/// Prefix of versions set up straight from a directory
pub const LOCAL_PREFIX: &str = "LOCAL:";

/// One declared version of a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub version: String,
    pub flavor: String,
    /// Install directory; `None` stands for "none"
    pub dir: Option<PathBuf>,
    /// Table file; `None` stands for "none"
    pub table: Option<PathBuf>,
    /// Root of the owning stack, if the product came from one
    pub stack: Option<PathBuf>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub declarer: Option<String>,
    #[serde(default)]
    pub declared_at: Option<String>,
}

impl Product {
    pub fn new(name: impl Into<String>, version: impl Into<String>, flavor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            flavor: flavor.into(),
            dir: None,
            table: None,
            stack: None,
            tags: BTreeSet::new(),
            declarer: None,
            declared_at: None,
        }
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<PathBuf>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<PathBuf>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// An undeclared product living in `dir`, versioned `LOCAL:<dir>`
    pub fn local(name: &str, dir: &Path, flavor: &str) -> Self {
        Self::new(name, format!("{LOCAL_PREFIX}{}", dir.display()), flavor)
            .with_dir(dir)
            .with_table(default_table(dir, name))
    }

    pub fn is_local(&self) -> bool {
        self.version.starts_with(LOCAL_PREFIX)
    }

    pub fn id(&self) -> ProductId {
        ProductId {
            name: self.name.clone(),
            version: self.version.clone(),
            flavor: self.flavor.clone(),
            stack: self.stack.clone(),
        }
    }

    pub fn dir_display(&self) -> String {
        display_or_none(self.dir.as_deref())
    }

    pub fn table_display(&self) -> String {
        display_or_none(self.table.as_deref())
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.name, self.version, self.flavor)
    }
}

/// Conventional table location: `<dir>/ups/<name>.table`
pub fn default_table(dir: &Path, name: &str) -> PathBuf {
    dir.join("ups").join(format!("{name}.table"))
}

/// Parse a user-supplied path, mapping the "none" sentinel to `None`
pub fn path_or_none(value: &str) -> Option<PathBuf> {
    if value.is_empty() || value == NONE {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

fn display_or_none(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| NONE.to_string())
}

/// Identity of a declared product
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductId {
    pub name: String,
    pub version: String,
    pub flavor: String,
    pub stack: Option<PathBuf>,
}

/// A search-path entry: a directory holding a `ups_db` product database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    root: PathBuf,
}

impl Stack {
    /// Name of the database subdirectory every stack must contain
    pub const DB_DIR: &'static str = "ups_db";

    /// Database file inside [`Stack::DB_DIR`]
    pub const DB_FILE: &'static str = "products.db";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Open a stack, returning `None` when `ups_db` is missing
    pub fn open(root: impl Into<PathBuf>) -> Option<Self> {
        let stack = Self::new(root);
        stack.db_dir().is_dir().then_some(stack)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_dir(&self) -> PathBuf {
        self.root.join(Self::DB_DIR)
    }

    pub fn db_file(&self) -> PathBuf {
        self.db_dir().join(Self::DB_FILE)
    }

    /// Directory holding materialized tables for one product/flavor
    pub fn table_dir(&self, name: &str, flavor: &str) -> PathBuf {
        self.db_dir().join(name).join(flavor)
    }

    /// True if the database directory may be written
    pub fn is_writable(&self) -> bool {
        std::fs::metadata(self.db_dir())
            .map(|meta| meta.is_dir() && !meta.permissions().readonly())
            .unwrap_or(false)
    }

    /// True if `path` lies inside this stack
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_product() {
        let product = Product::local("afw", Path::new("/work/afw"), "Linux");
        assert_eq!(product.version, "LOCAL:/work/afw");
        assert!(product.is_local());
        assert_eq!(product.table, Some(PathBuf::from("/work/afw/ups/afw.table")));
    }

    #[test]
    fn test_path_or_none() {
        assert_eq!(path_or_none("none"), None);
        assert_eq!(path_or_none("/opt/x"), Some(PathBuf::from("/opt/x")));
    }

    #[test]
    fn test_stack_requires_db_dir() {
        let temp = TempDir::new().unwrap();
        assert!(Stack::open(temp.path()).is_none());

        std::fs::create_dir(temp.path().join("ups_db")).unwrap();
        let stack = Stack::open(temp.path()).unwrap();
        assert!(stack.is_writable());
        assert!(stack.contains(&temp.path().join("Linux/afw/1.0")));
        assert_eq!(stack.db_file(), temp.path().join("ups_db/products.db"));
    }

    #[test]
    fn test_product_display() {
        let product = Product::new("afw", "1.0", "Linux");
        assert_eq!(product.to_string(), "afw 1.0 (Linux)");
        assert_eq!(product.dir_display(), "none");
    }
}
