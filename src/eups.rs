// src/eups.rs

//! The `Eups` session
//!
//! Owns the search path, tag registry, local tags and table source for one
//! flavor, and is the entry point for resolution, listing and setup.
//! Declaration lives in [`crate::declare`] and reverse dependencies in
//! [`crate::uses`].

use crate::config::Config;
use crate::env::EnvironmentContext;
use crate::error::{Error, Result};
use crate::product::{LOCAL_PREFIX, Product, Stack};
use crate::resolver::{Resolver, VersionSpec};
use crate::setup::{SetupEngine, SetupOptions, SetupReport};
use crate::store::{ProductStack, ProductStore};
use crate::table::{self, Action, TableEntry, TableSource, TomlTables};
use crate::tags::{CURRENT, LocalTags, TagRegistry};
use crate::version;
use glob::Pattern;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A dependency read from a table and resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub product: Product,
    /// The version spec the table asked for
    pub requested: Option<String>,
    pub optional: bool,
    /// The table asked for a tag rather than a version
    pub tag_requested: bool,
}

/// Filters for [`Eups::list_products`]; globs use shell syntax
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub name: Option<String>,
    pub version: Option<String>,
    /// Keep products carrying any of these tags
    pub tags: Vec<String>,
    pub setup_only: bool,
}

/// A row of [`Eups::list_products`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedProduct {
    pub product: Product,
    pub is_setup: bool,
}

pub struct Eups {
    config: Config,
    stacks: Vec<ProductStack>,
    tags: TagRegistry,
    local_tags: LocalTags,
    tables: Box<dyn TableSource>,
}

impl Eups {
    /// Open every stack on the configured path
    ///
    /// Stacks without a `ups_db` directory are dropped with a warning; an
    /// empty result is an error.
    pub fn new(config: Config) -> Result<Self> {
        let mut flavors = vec![config.flavor.clone()];
        flavors.extend(config.fallbacks());

        let mut stacks = Vec::new();
        for root in &config.path {
            let Some(stack) = Stack::open(root) else {
                warn!(
                    "{} contains no {} directory; ignoring it",
                    root.display(),
                    Stack::DB_DIR
                );
                continue;
            };
            let product_stack = if config.use_cache {
                ProductStack::open(stack, &config.user_data_dir, &flavors)
            } else {
                ProductStack::new(stack, &config.user_data_dir)
            };
            stacks.push(product_stack);
        }

        if stacks.is_empty() {
            return Err(Error::NotFound(
                "No usable stacks on the search path; check EUPS_PATH".to_string(),
            ));
        }

        let mut tags = TagRegistry::new();
        for tag in &config.global_tags {
            tags.register_global(tag);
        }
        for tag in &config.local_tags {
            tags.register_local(tag);
        }
        for stack in &stacks {
            match stack.database().tag_names() {
                Ok(names) => {
                    for name in names {
                        if !tags.is_recognized(&name) {
                            tags.register_global(name);
                        }
                    }
                }
                Err(e) => warn!("Unable to read tags from {}: {}", stack.stack(), e),
            }
        }

        let dropped = tags.set_preferred(&config.preferred_tags);
        if !dropped.is_empty() {
            warn!("Ignoring unrecognized preferred tags: {}", dropped.join(", "));
        }

        Ok(Self {
            config,
            stacks,
            tags,
            local_tags: LocalTags::new(),
            tables: Box::new(TomlTables),
        })
    }

    /// Replace the table source
    pub fn with_tables(mut self, tables: impl TableSource + 'static) -> Self {
        self.tables = Box::new(tables);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn flavor(&self) -> &str {
        &self.config.flavor
    }

    pub fn set_force(&mut self, force: bool) {
        self.config.force = force;
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.config.dry_run = dry_run;
    }

    pub fn stacks(&self) -> &[ProductStack] {
        &self.stacks
    }

    /// First stack on the path; setup markers leave it implicit
    pub fn default_stack(&self) -> Option<&Path> {
        self.stacks.first().map(|s| s.root())
    }

    pub(crate) fn stack_mut(&mut self, root: &Path) -> Option<&mut ProductStack> {
        self.stacks.iter_mut().find(|s| s.root() == root)
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub fn local_tags(&self) -> &LocalTags {
        &self.local_tags
    }

    pub(crate) fn local_tags_mut(&mut self) -> &mut LocalTags {
        &mut self.local_tags
    }

    /// Replace the preferred-tag order, returning the names ignored
    pub fn set_preferred_tags<S: AsRef<str>>(&mut self, tags: &[S]) -> Vec<String> {
        self.tags.set_preferred(tags)
    }

    /// Active flavor followed by its fallbacks
    pub fn flavors(&self) -> Vec<String> {
        let mut flavors = vec![self.config.flavor.clone()];
        flavors.extend(self.config.fallbacks());
        flavors
    }

    /// A resolver over the whole path, or over `paths` in that order
    ///
    /// Paths that are not configured stacks are opened on the fly; those
    /// without a database are skipped.
    pub fn resolver(&self, paths: Option<&[PathBuf]>) -> Resolver<'_> {
        let stacks = match paths {
            None => self.stacks.iter().map(Cow::Borrowed).collect(),
            Some(paths) => paths.iter().filter_map(|p| self.stack_view(p)).collect(),
        };
        Resolver::new(stacks, &self.tags, &self.local_tags).with_cache(self.config.use_cache)
    }

    fn stack_view(&self, root: &Path) -> Option<Cow<'_, ProductStack>> {
        if let Some(stack) = self.stacks.iter().find(|s| s.root() == root) {
            return Some(Cow::Borrowed(stack));
        }
        match Stack::open(root) {
            Some(stack) => Some(Cow::Owned(ProductStack::new(stack, &self.config.user_data_dir))),
            None => {
                debug!("Skipping missing stack {}", root.display());
                None
            }
        }
    }

    /// Find a product for one flavor (the active one by default)
    pub fn find_product(
        &self,
        name: &str,
        version: Option<&str>,
        paths: Option<&[PathBuf]>,
        flavor: Option<&str>,
    ) -> Result<Option<Product>> {
        let spec = VersionSpec::classify(version, &self.tags)?;
        let flavor = flavor.unwrap_or(&self.config.flavor);
        self.resolver(paths).find(name, &spec, flavor)
    }

    /// Like [`Eups::find_product`] but missing products are `NotFound`
    pub fn get_product(&self, name: &str, version: Option<&str>, paths: Option<&[PathBuf]>) -> Result<Product> {
        self.find_product(name, version, paths, None)?
            .ok_or_else(|| not_found(name, version, &self.config.flavor))
    }

    /// Find a product for the active flavor, then each fallback flavor
    pub fn resolve_with_fallback(
        &self,
        name: &str,
        version: Option<&str>,
        paths: Option<&[PathBuf]>,
    ) -> Result<Option<Product>> {
        let spec = VersionSpec::classify(version, &self.tags)?;
        let resolver = self.resolver(paths);

        for flavor in self.flavors() {
            if let Some(product) = resolver.find(name, &spec, &flavor)? {
                if flavor != self.config.flavor {
                    debug!("Using flavor {} for {} {}", flavor, name, product.version);
                }
                return Ok(Some(product));
            }
        }
        Ok(None)
    }

    /// Version carrying "current"
    pub fn find_current_version(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .resolver(None)
            .find_tagged(name, CURRENT, &self.config.flavor)?
            .map(|p| p.version))
    }

    /// Declared products for the active flavor, plus local setups, sorted
    /// by name and version
    pub fn list_products(&self, env: &EnvironmentContext, filter: &ListFilter) -> Result<Vec<ListedProduct>> {
        let name_pattern = compile_glob(filter.name.as_deref())?;
        let version_pattern = compile_glob(filter.version.as_deref())?;
        let matches = |product: &Product| {
            name_pattern.as_ref().is_none_or(|p| p.matches(&product.name))
                && version_pattern.as_ref().is_none_or(|p| p.matches(&product.version))
                && (filter.tags.is_empty() || filter.tags.iter().any(|t| product.tags.contains(t)))
        };

        let setup = self.setup_products(env);
        let is_setup = |product: &Product| {
            setup.iter().any(|s| {
                s.name == product.name
                    && s.version == product.version
                    && (s.stack.is_none() || s.stack == product.stack)
            })
        };

        let mut listed = Vec::new();
        for stack in &self.stacks {
            let reader = stack.reader(&self.config.flavor, self.config.use_cache);
            for mut product in reader.list_products(&self.config.flavor)? {
                product.tags.extend(self.local_tags.tags_for(
                    &product.name,
                    &product.flavor,
                    &product.version,
                ));
                if !matches(&product) {
                    continue;
                }
                let is_setup = is_setup(&product);
                if filter.setup_only && !is_setup {
                    continue;
                }
                listed.push(ListedProduct { product, is_setup });
            }
        }

        for product in setup.iter().filter(|p| p.is_local()) {
            if matches(product) {
                listed.push(ListedProduct {
                    product: product.clone(),
                    is_setup: true,
                });
            }
        }

        listed.sort_by(|a, b| {
            a.product
                .name
                .cmp(&b.product.name)
                .then_with(|| version::sort_order(&a.product.version, &b.product.version))
        });
        Ok(listed)
    }

    /// Rebuild a set-up product from its markers
    pub fn find_setup_product(&self, env: &EnvironmentContext, name: &str) -> Result<Option<Product>> {
        let Some(marker) = env.setup_marker(name)? else {
            return Ok(None);
        };
        let flavor = marker
            .flavor
            .clone()
            .unwrap_or_else(|| self.config.flavor.clone());

        if let Some(dir) = marker.version.strip_prefix(LOCAL_PREFIX) {
            let dir = env.product_dir(name).unwrap_or_else(|| PathBuf::from(dir));
            return Ok(Some(Product::local(name, &dir, &flavor)));
        }

        let paths = marker.stack.clone().map(|s| vec![s]);
        let resolver = self.resolver(paths.as_deref());

        let mut version = marker.version.clone();
        if self.tags.is_recognized(&version)
            && let Some(tagged) = resolver.find_tagged(name, &version, &flavor)?
        {
            version = tagged.version;
        }

        if let Some(product) = resolver.find_exact(name, &version, &flavor)? {
            return Ok(Some(product));
        }

        // No longer declared: keep what the environment knows
        let mut product = Product::new(name, version, flavor);
        product.dir = env.product_dir(name);
        product.stack = marker.stack;
        Ok(Some(product))
    }

    /// Every product with a setup marker
    pub fn setup_products(&self, env: &EnvironmentContext) -> Vec<Product> {
        env.setup_product_names()
            .into_iter()
            .filter_map(|name| match self.find_setup_product(env, &name) {
                Ok(product) => product,
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            })
            .collect()
    }

    /// True if this exact version of `product` is set up
    pub fn is_setup(&self, env: &EnvironmentContext, product: &Product) -> bool {
        self.find_setup_product(env, &product.name)
            .ok()
            .flatten()
            .is_some_and(|setup| setup.version == product.version)
    }

    /// Every entry of a product's table
    pub fn table_entries(&self, product: &Product) -> Result<Vec<TableEntry>> {
        let Some(table) = &product.table else {
            return Ok(Vec::new());
        };
        if product.is_local() && !table.exists() {
            debug!("{} has no table file {}", product.name, table.display());
            return Ok(Vec::new());
        }
        self.tables.entries(table)
    }

    /// A product's actions for the active flavor
    pub fn table_actions(&self, product: &Product, setup_type: Option<&str>) -> Result<Vec<Action>> {
        Ok(table::select(
            &self.table_entries(product)?,
            &self.config.flavor,
            setup_type,
        ))
    }

    /// Direct dependencies named by a table, resolved
    ///
    /// Dependencies that cannot be found are reported and left out.
    pub fn dependencies_from_table(&self, table: &Path, setup_type: Option<&str>) -> Result<Vec<Dependency>> {
        let entries = self.tables.entries(table)?;
        self.resolve_requests(&entries, setup_type)
    }

    /// Direct dependencies of a declared product
    pub fn product_dependencies(&self, product: &Product, setup_type: Option<&str>) -> Result<Vec<Dependency>> {
        let entries = self.table_entries(product)?;
        self.resolve_requests(&entries, setup_type)
    }

    fn resolve_requests(&self, entries: &[TableEntry], setup_type: Option<&str>) -> Result<Vec<Dependency>> {
        let mut dependencies = Vec::new();

        for request in table::dependency_requests(entries, &self.config.flavor, setup_type) {
            let spec = VersionSpec::classify(request.version.as_deref(), &self.tags)?;
            match self.resolve_with_fallback(&request.product, request.version.as_deref(), None)? {
                Some(product) => dependencies.push(Dependency {
                    product,
                    requested: request.version,
                    optional: request.optional,
                    tag_requested: matches!(spec, VersionSpec::Tag(_)),
                }),
                None if request.optional => {
                    debug!("Optional dependency {} not found", request.product);
                }
                None => warn!(
                    "Dependency {} {} not found",
                    request.product,
                    request.version.as_deref().unwrap_or("")
                ),
            }
        }

        Ok(dependencies)
    }

    /// Set up `name` in `env`
    pub fn setup(
        &self,
        env: &mut EnvironmentContext,
        name: &str,
        version: Option<&str>,
        options: &SetupOptions,
    ) -> Result<SetupReport> {
        SetupEngine::new(self, options.clone()).setup(env, name, version)
    }

    /// Set up an undeclared product straight from `dir`
    pub fn setup_local(
        &self,
        env: &mut EnvironmentContext,
        name: &str,
        dir: &Path,
        options: &SetupOptions,
    ) -> Result<SetupReport> {
        let dir = normalize_dir(dir)?;
        let product = Product::local(name, &dir, &self.config.flavor);
        SetupEngine::new(self, options.clone()).setup_product(env, &product)
    }

    /// Unsetup `name` in `env`
    pub fn unsetup(
        &self,
        env: &mut EnvironmentContext,
        name: &str,
        version: Option<&str>,
        options: &SetupOptions,
    ) -> Result<SetupReport> {
        SetupEngine::new(self, options.clone()).unsetup(env, name, version)
    }

    /// Delete cache files for every stack
    pub fn clear_cache(&mut self) -> Result<usize> {
        let mut removed = 0;
        for stack in &mut self.stacks {
            removed += stack.clear_cache()?;
        }
        Ok(removed)
    }

    /// Delete stale `*.lock` files from stacks and the user data directory
    pub fn clear_locks(&self) -> Result<usize> {
        let mut dirs: Vec<PathBuf> = self.stacks.iter().map(|s| s.stack().db_dir()).collect();
        dirs.push(self.config.user_data_dir.clone());

        let mut removed = 0;
        for dir in dirs.iter().filter(|d| d.is_dir()) {
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == "lock") {
                    if path.is_dir() {
                        std::fs::remove_dir_all(&path)?;
                    } else {
                        std::fs::remove_file(&path)?;
                    }
                    debug!("Removed lock {}", path.display());
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

pub(crate) fn not_found(name: &str, version: Option<&str>, flavor: &str) -> Error {
    match version {
        Some(version) => Error::NotFound(format!(
            "Unable to locate product {name} {version} for flavor {flavor}"
        )),
        None => Error::NotFound(format!("Unable to locate product {name} for flavor {flavor}")),
    }
}

fn compile_glob(pattern: Option<&str>) -> Result<Option<Pattern>> {
    pattern
        .map(|p| {
            Pattern::new(p).map_err(|e| Error::InvalidArgument(format!("Bad pattern {p}: {e}")))
        })
        .transpose()
}

/// Absolute form of a user-supplied directory (`~` and relative paths)
pub(crate) fn normalize_dir(dir: &Path) -> Result<PathBuf> {
    let dir = match dir.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .ok_or_else(|| Error::InvalidArgument("Cannot expand ~ without a home directory".into()))?
            .join(rest),
        Err(_) => dir.to_path_buf(),
    };

    if dir.is_absolute() {
        Ok(dir)
    } else {
        Ok(std::env::current_dir()?.join(dir))
    }
}
