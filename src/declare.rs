// src/declare.rs

//! Declaring, undeclaring, tagging and removing products
//!
//! Every write goes to the owning stack's database first and is then
//! mirrored into its cache. A dry run validates and announces but does
//! not write.

use crate::env::EnvironmentContext;
use crate::error::{Error, Result};
use crate::eups::{Eups, normalize_dir, not_found};
use crate::product::{NONE, Product, ProductId, Stack, default_table, path_or_none};
use crate::store::{ProductStack, ProductStore};
use crate::tags::CURRENT;
use crate::uses::DependencyGraph;
use regex::Regex;
use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static PRODUCT_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Where a declaration's table comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRef {
    /// An existing table file; relative paths are tried under the product
    /// directory first
    Path(PathBuf),
    /// Table text, written to the stack as `<version>.table`
    Content(String),
    /// The product has no table
    None,
}

/// Arguments to [`Eups::declare`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclareRequest {
    pub name: String,
    pub version: String,
    /// Install directory, or "none"; inferred when absent
    pub dir: Option<String>,
    /// Stack to declare into; inferred from the directory when absent
    pub stack: Option<PathBuf>,
    /// Inferred when absent
    pub table: Option<TableRef>,
    pub tag: Option<String>,
}

impl DeclareRequest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            dir: None,
            stack: None,
            table: None,
            tag: None,
        }
    }

    pub fn with_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().display().to_string());
        self
    }

    pub fn with_stack(mut self, stack: impl Into<PathBuf>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_table(mut self, table: TableRef) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Policies for [`Eups::remove`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    /// Also remove everything the product depends on
    pub recursive: bool,
    /// Refuse to remove products other products still need
    pub check_recursive: bool,
    /// Ask before each product
    pub interactive: bool,
}

/// Answer to a remove prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveReply {
    Yes,
    No,
    /// Yes to this and every later product
    Always,
    Quit,
}

impl RemoveReply {
    /// Parse `y`, `n`, `!` or `q`
    pub fn parse(reply: &str) -> Option<Self> {
        match reply.trim() {
            "y" => Some(RemoveReply::Yes),
            "n" => Some(RemoveReply::No),
            "!" => Some(RemoveReply::Always),
            "q" => Some(RemoveReply::Quit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RemoveReply::Yes => "y",
            RemoveReply::No => "n",
            RemoveReply::Always => "!",
            RemoveReply::Quit => "q",
        }
    }
}

/// Asks whether to remove a product
pub trait RemovePrompt {
    /// `default` is the previous answer
    fn ask(&mut self, product: &Product, default: RemoveReply) -> Result<RemoveReply>;
}

/// Prompts on stderr and reads replies from stdin
pub struct StdinPrompt;

impl RemovePrompt for StdinPrompt {
    fn ask(&mut self, product: &Product, default: RemoveReply) -> Result<RemoveReply> {
        let stdin = std::io::stdin();
        loop {
            eprint!(
                "Remove {} {}: (ynq!) [{}] ",
                product.name,
                product.version,
                default.as_str()
            );
            std::io::stderr().flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                return Ok(RemoveReply::Quit);
            }
            if line.trim().is_empty() {
                return Ok(default);
            }
            match RemoveReply::parse(&line) {
                Some(reply) => return Ok(reply),
                None => eprintln!("Please answer y, n, q, or !, not {}", line.trim()),
            }
        }
    }
}

/// Declaration after inference, before it is written
struct Resolved {
    product: Product,
    content: Option<String>,
}

impl Eups {
    /// Declare a product, or re-declare it to add a tag
    ///
    /// Redeclaring with a different directory or table is a conflict
    /// unless forced. An identical redeclaration only assigns the tag.
    pub fn declare(&mut self, request: &DeclareRequest) -> Result<Product> {
        if !PRODUCT_NAME.is_match(&request.name) {
            return Err(Error::InvalidName(request.name.clone()));
        }
        let tag = match &request.tag {
            Some(tag) => Some(self.tags().get(tag)?),
            None => None,
        };

        let Resolved { product, content } = self.resolve_declaration(request)?;
        let root = product
            .stack
            .clone()
            .ok_or_else(|| Error::Internal(format!("{product} has no stack")))?;

        let existing = self
            .stack_handle(&root)
            .find_product(&product.name, &product.version, &product.flavor)?;

        let mut write = true;
        if let Some(existing) = &existing {
            let differences = declaration_differences(existing, &product, content.as_deref());
            if differences.is_empty() {
                write = false;
            } else if self.config().force {
                warn!(
                    "Redeclaring {} {} ({}); proceeding",
                    product.name,
                    product.version,
                    differences.join(", ")
                );
            } else {
                return Err(Error::Conflict(format!(
                    "Redeclaring {} {} ({}); specify force to proceed",
                    product.name,
                    product.version,
                    differences.join(", ")
                )));
            }
        }

        if write {
            info!(
                "Declaring {} as {} {}{} in {}",
                product.dir_display(),
                product.name,
                product.version,
                tag.as_ref().map(|t| format!(" {t}")).unwrap_or_default(),
                root.display()
            );
            if !self.config().dry_run {
                if let (Some(content), Some(table)) = (&content, &product.table) {
                    if let Some(parent) = table.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(table, content)?;
                }
                self.write_stack(&root, |stack| stack.declare(&product))?;
            }
        } else {
            debug!("{} {} is already declared identically", product.name, product.version);
        }

        if let Some(tag) = tag {
            if write && self.config().dry_run {
                info!("Assigning {} to {} {}", tag, product.name, product.version);
            } else {
                self.assign_tag(&tag.name, &product.name, &product.version, Some(&root))?;
            }
        }

        Ok(existing.filter(|_| !write).unwrap_or(product))
    }

    /// Fill in a request's directory, table and stack
    fn resolve_declaration(&self, request: &DeclareRequest) -> Result<Resolved> {
        let flavor = self.flavor().to_string();
        let mut dir = request.dir.clone();
        let mut table = request.table.clone();

        // A tag-only redeclare takes what it is missing from the existing
        // declaration
        if request.tag.is_some() && (dir.is_none() || table.is_none()) {
            let paths = request.stack.clone().map(|s| vec![s]);
            if let Some(existing) =
                self.resolver(paths.as_deref())
                    .find_exact(&request.name, &request.version, &flavor)?
            {
                dir.get_or_insert_with(|| existing.dir_display());
                table.get_or_insert_with(|| match &existing.table {
                    Some(table) => TableRef::Path(table.clone()),
                    None => TableRef::None,
                });
            }
        }

        let dir = match dir {
            Some(dir) => dir,
            None => self
                .stacks()
                .iter()
                .map(|s| s.root().join(&flavor).join(&request.name).join(&request.version))
                .find(|candidate| candidate.is_dir())
                .map(|candidate| candidate.display().to_string())
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "Please specify a product directory for {} {} (maybe \"{NONE}\")",
                        request.name, request.version
                    ))
                })?,
        };

        let dir = match path_or_none(&dir) {
            Some(dir) => {
                let dir = normalize_dir(&dir)?;
                if !dir.is_dir() {
                    return Err(Error::InvalidArgument(format!(
                        "Product {} {}'s directory {} is not a directory",
                        request.name,
                        request.version,
                        dir.display()
                    )));
                }
                Some(dir)
            }
            None => None,
        };

        let root = self.declaration_stack(request, dir.as_deref())?;
        let stack = Stack::new(&root);

        let (table, content) = match table {
            Some(TableRef::None) => (None, None),
            Some(TableRef::Content(content)) => {
                let path = stack
                    .table_dir(&request.name, &flavor)
                    .join(format!("{}.table", request.version));
                (Some(path), Some(content))
            }
            Some(TableRef::Path(path)) => {
                let path = locate_table(&path, dir.as_deref())?;
                if !path.is_file() {
                    return Err(missing_table(&request.name, &path));
                }
                (Some(path), None)
            }
            None => match &dir {
                Some(dir) => {
                    let path = default_table(dir, &request.name);
                    if !path.is_file() {
                        return Err(missing_table(&request.name, &path));
                    }
                    (Some(path), None)
                }
                None => (None, None),
            },
        };

        let mut product = Product::new(request.name.as_str(), request.version.as_str(), flavor)
            .with_stack(root);
        product.dir = dir;
        product.table = table;
        product.declared_at = Some(chrono::Utc::now().to_rfc3339());

        Ok(Resolved { product, content })
    }

    /// The stack a declaration is written to
    fn declaration_stack(&self, request: &DeclareRequest, dir: Option<&Path>) -> Result<PathBuf> {
        if let Some(root) = &request.stack {
            if Stack::new(root).is_writable() {
                return Ok(root.clone());
            }
            return Err(Error::NoWritableStack(format!(
                "{} {} (stack {} is not writable)",
                request.name,
                request.version,
                root.display()
            )));
        }

        let writable = || self.stacks().iter().filter(|s| s.is_writable());
        let by_dir = dir.and_then(|dir| writable().find(|s| dir.starts_with(s.root())));
        by_dir
            .or_else(|| writable().next())
            .map(|s| s.root().to_path_buf())
            .ok_or_else(|| Error::NoWritableStack(format!("{} {}", request.name, request.version)))
    }

    /// Undeclare a product, or only unassign `tag` from it
    ///
    /// Without a version the product must have exactly one declared
    /// version. Returns false if nothing was removed.
    pub fn undeclare(
        &mut self,
        env: &EnvironmentContext,
        name: &str,
        version: Option<&str>,
        tag: Option<&str>,
        stack: Option<&Path>,
    ) -> Result<bool> {
        if let Some(tag) = tag {
            return self.unassign_tag(tag, name, version, stack);
        }

        let paths = stack.map(|s| vec![s.to_path_buf()]);
        let flavor = self.flavor().to_string();

        let version = match version {
            Some(version) => version.to_string(),
            None => {
                let mut versions: Vec<String> = self
                    .resolver(paths.as_deref())
                    .find_all(name, &flavor)?
                    .into_iter()
                    .map(|p| p.version)
                    .collect();
                versions.dedup();
                match versions.len() {
                    0 => return Err(not_found(name, None, &flavor)),
                    1 => versions.remove(0),
                    _ => {
                        return Err(Error::AmbiguousVersion {
                            product: name.to_string(),
                            versions,
                        });
                    }
                }
            }
        };

        let product = self
            .resolver(paths.as_deref())
            .find_exact(name, &version, &flavor)?
            .ok_or_else(|| not_found(name, Some(&version), &flavor))?;
        let root = product
            .stack
            .clone()
            .ok_or_else(|| Error::Internal(format!("{product} has no stack")))?;

        if !Stack::new(&root).is_writable() {
            return Err(Error::PermissionDenied(format!(
                "You do not have permission to undeclare products from {}",
                root.display()
            )));
        }

        if self.is_setup(env, &product) {
            let message = format!("Product {} {} is currently setup", product.name, product.version);
            if !self.config().force {
                return Err(Error::SetupInUse(message));
            }
            warn!("{}; proceeding", message);
        }

        info!(
            "Removing {} {} from version list for {}",
            product.name,
            product.version,
            root.display()
        );
        if self.config().dry_run {
            return Ok(true);
        }

        let removed = self.write_stack(&root, |stack| stack.undeclare(&product))?;
        if !removed {
            return Err(not_found(name, Some(&version), &flavor));
        }
        Ok(true)
    }

    /// Assign `tag` to a declared version
    ///
    /// Global tags are written to the product's stack; local tags live only
    /// in this session.
    pub fn assign_tag(&mut self, tag: &str, name: &str, version: &str, stack: Option<&Path>) -> Result<()> {
        let tag = self.tags().get(tag)?;
        let paths = stack.map(|s| vec![s.to_path_buf()]);
        let flavor = self.flavor().to_string();

        let product = self
            .resolver(paths.as_deref())
            .find_exact(name, version, &flavor)?
            .ok_or_else(|| not_found(name, Some(version), &flavor))?;

        if !tag.is_global() {
            info!("Assigning local tag {} to {} {}", tag, name, version);
            self.local_tags_mut().assign(&tag.name, name, &flavor, version);
            return Ok(());
        }

        let root = product
            .stack
            .clone()
            .ok_or_else(|| Error::Internal(format!("{product} has no stack")))?;
        if !Stack::new(&root).is_writable() {
            return Err(Error::PermissionDenied(format!(
                "You don't have permission to assign a global tag {} in {}",
                tag,
                root.display()
            )));
        }

        info!("Assigning {} to {} {}", tag, name, version);
        if self.config().dry_run {
            return Ok(());
        }
        self.write_stack(&root, |stack| stack.assign_tag(&tag.name, &product))
    }

    /// Remove `tag` from `name`, optionally only if `version` holds it
    ///
    /// Returns false, with a diagnostic, if the tag was not held.
    pub fn unassign_tag(
        &mut self,
        tag: &str,
        name: &str,
        version: Option<&str>,
        stack: Option<&Path>,
    ) -> Result<bool> {
        let tag = self.tags().get(tag)?;
        let flavor = self.flavor().to_string();

        if !tag.is_global() {
            let removed = self.local_tags_mut().unassign(&tag.name, name, &flavor, version);
            if !removed {
                debug!("Tag {} not assigned to {} {}", tag, name, version.unwrap_or(""));
            }
            return Ok(removed);
        }

        let paths = stack.map(|s| vec![s.to_path_buf()]);
        let holder = match version {
            Some(version) => self.resolver(paths.as_deref()).find_exact(name, version, &flavor)?,
            None => self.resolver(paths.as_deref()).find_tagged(name, &tag.name, &flavor)?,
        };
        let Some(holder) = holder else {
            if version.is_some() {
                return Err(not_found(name, version, &flavor));
            }
            debug!("Tag {} not assigned to {}", tag, name);
            return Ok(false);
        };

        let root = holder
            .stack
            .clone()
            .ok_or_else(|| Error::Internal(format!("{holder} has no stack")))?;
        if !Stack::new(&root).is_writable() {
            return Err(Error::PermissionDenied(format!(
                "You don't have permission to unassign a global tag {} in {}",
                tag,
                root.display()
            )));
        }

        info!("Unassigning {} from {} {}", tag, name, holder.version);
        if self.config().dry_run {
            return Ok(true);
        }

        let removed =
            self.write_stack(&root, |stack| stack.unassign_tag(&tag.name, name, version, &flavor))?;
        if !removed {
            debug!("Tag {} not assigned to {} {}", tag, name, holder.version);
        }
        Ok(removed)
    }

    /// Make `version` the current one
    pub fn declare_current(&mut self, name: &str, version: &str, stack: Option<&Path>) -> Result<()> {
        self.assign_tag(CURRENT, name, version, stack)
    }

    /// Undeclare a product and delete its directory
    ///
    /// Returns the products removed. A shared directory is deleted once;
    /// one already gone is skipped.
    pub fn remove(
        &mut self,
        env: &EnvironmentContext,
        name: &str,
        version: &str,
        options: RemoveOptions,
        prompt: &mut dyn RemovePrompt,
    ) -> Result<Vec<Product>> {
        let flavor = self.flavor().to_string();
        let top = self
            .resolver(None)
            .find_exact(name, version, &flavor)?
            .ok_or_else(|| {
                Error::NotFound(format!("Product {name} {version} doesn't seem to exist"))
            })?;

        let mut seen = BTreeSet::new();
        let mut to_remove = Vec::new();
        self.collect_removals(top, options.recursive, &mut seen, &mut to_remove)?;

        if options.check_recursive {
            debug!("Calculating product dependencies recursively...");
            let graph = DependencyGraph::build(self)?;
            self.check_unused(&graph, &to_remove)?;
        }

        let mut interactive = options.interactive;
        let mut default = RemoveReply::Yes;
        let mut removed_dirs = BTreeSet::new();
        let mut removed = Vec::new();

        for product in to_remove {
            if interactive {
                match prompt.ask(&product, default)? {
                    RemoveReply::Quit => break,
                    RemoveReply::No => {
                        default = RemoveReply::No;
                        continue;
                    }
                    RemoveReply::Yes => default = RemoveReply::Yes,
                    RemoveReply::Always => interactive = false,
                }
            }

            if !self.undeclare(env, &product.name, Some(&product.version), None, product.stack.as_deref())? {
                return Err(Error::Internal(format!(
                    "Not removing {} {}",
                    product.name, product.version
                )));
            }

            if let Some(dir) = &product.dir
                && removed_dirs.insert(dir.clone())
            {
                if !dir.exists() {
                    debug!("{} is already gone", dir.display());
                } else if self.config().dry_run {
                    info!("rm -rf {}", dir.display());
                } else {
                    info!("Removing {}", dir.display());
                    std::fs::remove_dir_all(dir)?;
                }
            }
            removed.push(product);
        }

        Ok(removed)
    }

    /// The product first, then (if `recursive`) its dependency closure
    fn collect_removals(
        &self,
        product: Product,
        recursive: bool,
        seen: &mut BTreeSet<ProductId>,
        out: &mut Vec<Product>,
    ) -> Result<()> {
        if !seen.insert(product.id()) {
            return Ok(());
        }
        let dependencies = if recursive {
            self.product_dependencies(&product, None)?
        } else {
            Vec::new()
        };
        out.push(product);

        for dependency in dependencies {
            self.collect_removals(dependency.product, true, seen, out)?;
        }
        Ok(())
    }

    /// Refuse removal of products still required outside `to_remove`
    fn check_unused(&self, graph: &DependencyGraph, to_remove: &[Product]) -> Result<()> {
        let removing: BTreeSet<(&str, &str)> = to_remove
            .iter()
            .map(|p| (p.name.as_str(), p.version.as_str()))
            .collect();

        for product in to_remove {
            let users: Vec<String> = graph
                .users(&product.name, Some(&product.version), 1)
                .into_iter()
                .filter(|u| !removing.contains(&(u.name.as_str(), u.version.as_str())))
                .map(|u| format!("{} {}", u.name, u.version))
                .collect();
            if users.is_empty() {
                continue;
            }

            let message = if users.len() == 1 {
                format!("{} {} is required by product {}", product.name, product.version, users[0])
            } else {
                format!(
                    "{} {} is required by products ({})",
                    product.name,
                    product.version,
                    users.join("), (")
                )
            };
            if !self.config().force {
                return Err(Error::SetupInUse(message));
            }
            warn!("{}; removing anyway", message);
        }
        Ok(())
    }

    /// A configured stack, or a transient handle on another one
    fn stack_handle(&self, root: &Path) -> ProductStack {
        self.stacks()
            .iter()
            .find(|s| s.root() == root)
            .cloned()
            .unwrap_or_else(|| ProductStack::new(Stack::new(root), &self.config().user_data_dir))
    }

    /// Run a write against the stack at `root`
    fn write_stack<T, F>(&mut self, root: &Path, write: F) -> Result<T>
    where
        F: FnOnce(&mut ProductStack) -> Result<T>,
    {
        if let Some(stack) = self.stack_mut(root) {
            return write(stack);
        }
        let mut transient = ProductStack::new(Stack::new(root), &self.config().user_data_dir);
        write(&mut transient)
    }
}

/// Relative table paths are looked for under the product directory
fn locate_table(path: &Path, dir: Option<&Path>) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    if let Some(dir) = dir {
        for candidate in [dir.join(path), dir.join("ups").join(path)] {
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }
    normalize_dir(path)
}

fn missing_table(name: &str, path: &Path) -> Error {
    Error::InvalidArgument(format!(
        "I'm unable to declare {} as tablefile {} does not exist",
        name,
        path.display()
    ))
}

/// Fields in which `declared` differs from what `existing` holds
fn declaration_differences(existing: &Product, declared: &Product, content: Option<&str>) -> Vec<String> {
    let mut differences = Vec::new();

    if existing.dir != declared.dir {
        differences.push(format!("{} != {}", declared.dir_display(), existing.dir_display()));
    }

    match (&existing.table, &declared.table) {
        (Some(old), Some(new)) => {
            let old_content = std::fs::read_to_string(old).ok();
            let new_content = match content {
                Some(content) => Some(content.to_string()),
                None if old == new => old_content.clone(),
                None => std::fs::read_to_string(new).ok(),
            };
            if old_content.is_none() || old_content != new_content {
                differences.push(format!("{} != {}", new.display(), old.display()));
            }
        }
        (None, None) => {}
        _ => differences.push(format!(
            "{} != {}",
            declared.table_display(),
            existing.table_display()
        )),
    }

    differences
}
