// src/resolver/mod.rs

//! Product resolution across the stacks of the search path
//!
//! Precedence depends on what was asked for:
//!
//! 1. nothing: try each preferred tag in turn; the first stack (in path
//!    order) holding the tag wins
//! 2. an expression: gather matching versions from every stack, then pick
//!    among them by preferred tag, falling back to the newest
//! 3. a tag: first stack holding it wins
//! 4. a literal version: first stack declaring it wins
//!
//! The `newest` tag ignores path order and takes the highest version.

mod spec;

pub use spec::VersionSpec;

use crate::error::Result;
use crate::product::Product;
use crate::store::{ProductStack, ProductStore};
use crate::tags::{LocalTags, NEWEST, TagRegistry, TagScope};
use crate::version::{self, VersionExpr};
use std::borrow::Cow;
use std::cmp::Ordering;
use tracing::debug;

/// Finds products on an ordered list of stacks
pub struct Resolver<'a> {
    stacks: Vec<Cow<'a, ProductStack>>,
    tags: &'a TagRegistry,
    local_tags: &'a LocalTags,
    use_cache: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(
        stacks: Vec<Cow<'a, ProductStack>>,
        tags: &'a TagRegistry,
        local_tags: &'a LocalTags,
    ) -> Self {
        Self {
            stacks,
            tags,
            local_tags,
            use_cache: true,
        }
    }

    /// Read the databases directly, bypassing caches
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    fn readers(&self, flavor: &str) -> impl Iterator<Item = (&ProductStack, &dyn ProductStore)> {
        self.stacks.iter().map(move |s| {
            let stack: &ProductStack = s;
            (stack, stack.reader(flavor, self.use_cache))
        })
    }

    /// Resolve `name` according to `spec`
    pub fn find(&self, name: &str, spec: &VersionSpec, flavor: &str) -> Result<Option<Product>> {
        debug!("Resolving {} {} ({})", name, spec, flavor);
        match spec {
            VersionSpec::Preferred => self.find_preferred(name, flavor),
            VersionSpec::Expression(expr) => {
                let candidates = self.find_by_expr(name, expr, flavor)?;
                self.select_preferred(candidates)
            }
            VersionSpec::Tag(tag) => self.find_tagged(name, tag, flavor),
            VersionSpec::Exact(version) => self.find_exact(name, version, flavor),
        }
    }

    /// First preferred tag that resolves
    pub fn find_preferred(&self, name: &str, flavor: &str) -> Result<Option<Product>> {
        for tag in self.tags.preferred() {
            if let Some(product) = self.find_tagged(name, tag, flavor)? {
                return Ok(Some(product));
            }
        }
        Ok(None)
    }

    /// Product carrying `tag`, first stack wins (`newest` takes the max)
    pub fn find_tagged(&self, name: &str, tag: &str, flavor: &str) -> Result<Option<Product>> {
        if tag == NEWEST {
            return Ok(newest(self.find_all(name, flavor)?));
        }

        let tag = self.tags.get(tag)?;
        if tag.scope == TagScope::Local {
            return match self.local_tags.version_for(&tag.name, name, flavor) {
                Some(version) => self.find_exact(name, version, flavor),
                None => Ok(None),
            };
        }

        for (stack, reader) in self.readers(flavor) {
            if let Some(version) = reader.tagged_version(&tag.name, name, flavor)? {
                debug!("{} {} is tagged {} in {}", name, version, tag, stack.stack());
                if let Some(product) = reader.find_product(name, &version, flavor)? {
                    return Ok(Some(product));
                }
            }
        }
        Ok(None)
    }

    /// First stack declaring exactly `version`
    pub fn find_exact(&self, name: &str, version: &str, flavor: &str) -> Result<Option<Product>> {
        for (_, reader) in self.readers(flavor) {
            if let Some(product) = reader.find_product(name, version, flavor)? {
                return Ok(Some(product));
            }
        }
        Ok(None)
    }

    /// Every declared version in path order
    pub fn find_all(&self, name: &str, flavor: &str) -> Result<Vec<Product>> {
        let mut products = Vec::new();
        for (_, reader) in self.readers(flavor) {
            products.extend(reader.find_products(name, flavor)?);
        }
        Ok(products)
    }

    /// Versions satisfying `expr`, in path order
    pub fn find_by_expr(&self, name: &str, expr: &VersionExpr, flavor: &str) -> Result<Vec<Product>> {
        Ok(self
            .find_all(name, flavor)?
            .into_iter()
            .filter(|p| expr.matches(&p.version))
            .collect())
    }

    /// Pick from candidates (in path order) by preferred tag
    ///
    /// With no preferred tag on any candidate the newest one is chosen.
    pub fn select_preferred(&self, candidates: Vec<Product>) -> Result<Option<Product>> {
        for tag in self.tags.preferred() {
            if tag == NEWEST {
                return Ok(newest(candidates));
            }

            let tag = self.tags.get(tag)?;
            let hit = candidates.iter().find(|p| match tag.scope {
                TagScope::Global => p.tags.contains(&tag.name),
                TagScope::Local => {
                    self.local_tags.version_for(&tag.name, &p.name, &p.flavor)
                        == Some(p.version.as_str())
                }
            });
            if let Some(product) = hit {
                return Ok(Some(product.clone()));
            }
        }

        Ok(newest(candidates))
    }
}

/// Highest version; on ties the earliest in path order
pub fn newest(products: Vec<Product>) -> Option<Product> {
    products.into_iter().reduce(|best, p| {
        if version::sort_order(&p.version, &best.version) == Ordering::Greater {
            p
        } else {
            best
        }
    })
}
