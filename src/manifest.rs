// src/manifest.rs

//! Distribution manifests
//!
//! A manifest lists the products making up a distribution of one top-level
//! product. The first line names that product and the format version; each
//! following non-comment line holds up to six whitespace-separated fields:
//! product, flavor, version, table file, product directory and
//! distribution id.

use crate::error::{Error, Result};
use crate::product::{NONE, Product};
use crate::uses::DependencyGraph;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use tracing::warn;

/// Format version written to, and expected in, manifest headers
pub const FORMAT_VERSION: &str = "1.0";

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^EUPS distribution manifest for (\S+) \((\S+)\). Version (\S+)\s*$").unwrap()
});

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*#").unwrap());

/// One product line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub product: String,
    pub flavor: String,
    pub version: String,
    pub table_file: String,
    pub product_dir: String,
    pub dist_id: String,
}

impl ManifestEntry {
    /// Entry for a declared product; `dist_id` says how it is distributed
    pub fn from_product(product: &Product, dist_id: impl Into<String>) -> Self {
        Self {
            product: product.name.clone(),
            flavor: product.flavor.clone(),
            version: product.version.clone(),
            table_file: product
                .table
                .as_ref()
                .and_then(|t| t.file_name())
                .map(|t| t.to_string_lossy().into_owned())
                .unwrap_or_else(|| NONE.to_string()),
            product_dir: product.dir_display(),
            dist_id: dist_id.into(),
        }
    }

    fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().take(6).collect();
        let field = |i: usize| fields.get(i).copied().unwrap_or(NONE).to_string();
        if fields.len() < 3 {
            return Err(Error::ParseError(format!("Failed to parse manifest line: {line}")));
        }
        Ok(Self {
            product: field(0),
            flavor: field(1),
            version: field(2),
            table_file: field(3),
            product_dir: field(4),
            dist_id: field(5),
        })
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<15} {:<12} {:<10} {:<25} {:<25} {}",
            self.product, self.flavor, self.version, self.table_file, self.product_dir, self.dist_id
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub product: String,
    pub version: String,
    pub format_version: String,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(product: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            version: version.into(),
            format_version: FORMAT_VERSION.to_string(),
            entries: Vec::new(),
        }
    }

    /// Manifest for `product` distributing `products`
    ///
    /// Entries are ordered so that every product follows the products it
    /// depends on in `graph`; otherwise the input order is kept.
    pub fn from_products(
        product: &str,
        version: &str,
        products: &[Product],
        graph: &DependencyGraph,
        dist_id: &str,
    ) -> Self {
        let mut ordered = Vec::with_capacity(products.len());
        let mut visited = HashSet::new();
        for index in 0..products.len() {
            visit(index, products, graph, &mut visited, &mut ordered);
        }

        let mut manifest = Self::new(product, version);
        manifest.entries = ordered
            .into_iter()
            .map(|index| ManifestEntry::from_product(&products[index], dist_id))
            .collect();
        manifest
    }

    pub fn push(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    /// Parse manifest text; an unexpected format version is only a warning
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines.next().unwrap_or_default();
        let caps = HEADER.captures(header).ok_or_else(|| {
            Error::ParseError(format!("First line of manifest is corrupted:\n\t{header}"))
        })?;

        let format_version = caps[3].to_string();
        if format_version != FORMAT_VERSION {
            warn!("Saw manifest version {}; expected {}", format_version, FORMAT_VERSION);
        }

        let entries = lines
            .filter(|line| !line.trim().is_empty() && !COMMENT.is_match(line))
            .map(ManifestEntry::parse)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            product: caps[1].to_string(),
            version: caps[2].to_string(),
            format_version,
            entries,
        })
    }

    pub fn read(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_string())?;
        Ok(())
    }

    /// Conventional file name, `<product>-<version>.manifest`
    pub fn file_name(&self) -> String {
        format!("{}-{}.manifest", self.product, self.version)
    }
}

/// Depth-first post-order over `products`, dependencies before users
fn visit(
    index: usize,
    products: &[Product],
    graph: &DependencyGraph,
    visited: &mut HashSet<usize>,
    ordered: &mut Vec<usize>,
) {
    if !visited.insert(index) {
        return;
    }
    let product = &products[index];
    for (name, version) in graph.dependencies(&product.name, &product.version) {
        if let Some(dependency) = products
            .iter()
            .position(|p| p.name == name && p.version == version)
        {
            visit(dependency, products, graph, visited, ordered);
        }
    }
    ordered.push(index);
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "EUPS distribution manifest for {} ({}). Version {}",
            self.product, self.version, self.format_version
        )?;
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}
