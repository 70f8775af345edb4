// src/setup/mod.rs

//! The setup engine: recursive environment transitions
//!
//! Setting up a product resolves it, writes its `_DIR`/`SETUP_` markers
//! and runs its table actions, which in turn set up its dependencies one
//! level deeper. Below the top level the walk is memoized: a dependency
//! already set up at the requested version is not walked again unless
//! forced.
//!
//! Failures are not rolled back. An action that fails aborts the rest of
//! its own product's table; siblings already scheduled carry on and the
//! failure is listed in the [`SetupReport`].

mod actions;
mod context;

pub use context::{Direction, SetupContext, SetupFailure, SetupOptions, SetupOutcome, SetupReport};

use crate::env::EnvironmentContext;
use crate::error::{Error, Result};
use crate::eups::Eups;
use crate::product::Product;
use crate::resolver::VersionSpec;
use crate::version;
use tracing::{debug, error, info, warn};

enum Request<'r> {
    Named {
        name: &'r str,
        version: Option<&'r str>,
    },
    Resolved(Product),
}

/// Drives setup and unsetup for one [`Eups`] session
pub struct SetupEngine<'a> {
    eups: &'a Eups,
    options: SetupOptions,
}

impl<'a> SetupEngine<'a> {
    pub fn new(eups: &'a Eups, options: SetupOptions) -> Self {
        Self { eups, options }
    }

    pub fn options(&self) -> &SetupOptions {
        &self.options
    }

    /// Active flavor
    pub fn flavor(&self) -> &str {
        &self.eups.config().flavor
    }

    /// Set up `name`, resolving `version` as a version, tag or expression
    pub fn setup(&self, env: &mut EnvironmentContext, name: &str, version: Option<&str>) -> Result<SetupReport> {
        self.run(env, Request::Named { name, version }, Direction::Setup)
    }

    /// Set up an already resolved product
    pub fn setup_product(&self, env: &mut EnvironmentContext, product: &Product) -> Result<SetupReport> {
        self.run(env, Request::Resolved(product.clone()), Direction::Setup)
    }

    /// Unsetup `name`; `version` only checks what is set up
    pub fn unsetup(&self, env: &mut EnvironmentContext, name: &str, version: Option<&str>) -> Result<SetupReport> {
        self.run(env, Request::Named { name, version }, Direction::Unsetup)
    }

    fn run(&self, env: &mut EnvironmentContext, request: Request<'_>, direction: Direction) -> Result<SetupReport> {
        let before = env.clone();
        let mut scratch;
        let target = if self.options.dry_run {
            scratch = env.clone();
            &mut scratch
        } else {
            env
        };

        let kept = match direction {
            Direction::Setup => self.eups.setup_products(target),
            Direction::Unsetup => Vec::new(),
        };
        let mut ctx = SetupContext::new(target, kept);

        let outcome = match direction {
            Direction::Setup => self.setup_at(&mut ctx, request, 0, self.options.no_recursion)?,
            Direction::Unsetup => self.unsetup_at(&mut ctx, request, 0, self.options.no_recursion)?,
        };

        let failures = std::mem::take(&mut ctx.failures);
        let changes = ctx.env().diff(&before);
        if self.options.dry_run {
            for change in &changes {
                info!("[dry run] {}", change);
            }
        }
        Ok(SetupReport {
            outcome,
            changes,
            failures,
        })
    }

    fn resolve(&self, name: &str, version: Option<&str>) -> Result<Option<Product>> {
        self.eups
            .resolve_with_fallback(name, version, self.options.paths.as_deref())
    }

    fn setup_at(
        &self,
        ctx: &mut SetupContext<'_>,
        request: Request<'_>,
        depth: usize,
        no_recursion: bool,
    ) -> Result<SetupOutcome> {
        let product = match request {
            Request::Resolved(product) => product,
            Request::Named { name, version } => match self.resolve(name, version)? {
                Some(product) => product,
                None => match ctx.kept.get(name) {
                    Some(kept) if self.options.keep => {
                        debug!("{} {} not found; keeping {}", name, version.unwrap_or(""), kept.version);
                        kept.clone()
                    }
                    _ => {
                        return Err(Error::NotFound(format!(
                            "Unable to locate product {} {} for flavor {}",
                            name,
                            version.unwrap_or(""),
                            self.flavor()
                        )));
                    }
                },
            },
        };

        let actions = match self
            .eups
            .table_actions(&product, self.options.setup_type.as_deref())
        {
            Ok(actions) => actions,
            Err(e) => {
                error!("product {} {}: {}", product.name, product.version, e);
                return Ok(SetupOutcome::Failure(e.to_string()));
            }
        };

        if ctx.announce(&product) {
            info!(
                "Setting up: {:<30} Flavor: {:<10} Version: {}",
                format!("{}{}", indent(depth), product.name),
                product.flavor,
                product.version
            );
        }

        let current = match self.eups.find_setup_product(ctx.env(), &product.name) {
            Ok(current) => current,
            Err(e) => {
                warn!("Ignoring malformed setup marker for {}: {}", product.name, e);
                None
            }
        };

        if let Some(current) = &current
            && is_same(current, &product)
            && depth > 0
            && !self.options.force
        {
            debug!("{} {} is already setup; skipping", product.name, product.version);
            return Ok(SetupOutcome::Success(product.version.clone()));
        }

        if depth > 0
            && self.options.keep
            && let Some(kept) = ctx.kept.get(&product.name).cloned()
        {
            if version::is_newer(&product.version, &kept.version) {
                info!(
                    "{} {} is setup; replacing it with newer {}",
                    kept.name, kept.version, product.version
                );
                ctx.kept.insert(product.name.clone(), product.clone());
            } else {
                let message = format!("{} {} is already setup; keeping", kept.name, kept.version);
                if kept.version != product.version && ctx.note(&message) {
                    info!("{}", message);
                }
                return Ok(SetupOutcome::Success(kept.version));
            }
        }

        if let Some(current) = &current {
            self.revert(ctx, current);
        }

        ctx.env.clear_markers(&product.name);
        ctx.env.set_markers(&product, self.flavor(), self.eups.default_stack());
        ctx.kept
            .entry(product.name.clone())
            .or_insert_with(|| product.clone());

        for action in &actions {
            if let Err(e) = action.execute(self, ctx, &product, depth + 1, Direction::Setup, no_recursion) {
                error!("Failed to setup {} {}: {}", product.name, product.version, e);
                return Ok(SetupOutcome::Failure(e.to_string()));
            }
        }

        Ok(SetupOutcome::Success(product.version))
    }

    /// Undo a set-up product's own actions before it is replaced
    fn revert(&self, ctx: &mut SetupContext<'_>, current: &Product) {
        debug!("Unsetting up {} {}", current.name, current.version);
        match self
            .eups
            .table_actions(current, self.options.setup_type.as_deref())
        {
            Ok(actions) => {
                for action in &actions {
                    if let Err(e) = action.execute(self, ctx, current, 1, Direction::Unsetup, true) {
                        warn!("Unable to unsetup {} {}: {}", current.name, current.version, e);
                    }
                }
            }
            Err(e) => debug!("No table for {} {}: {}", current.name, current.version, e),
        }
        ctx.env.clear_markers(&current.name);
    }

    fn unsetup_at(
        &self,
        ctx: &mut SetupContext<'_>,
        request: Request<'_>,
        depth: usize,
        no_recursion: bool,
    ) -> Result<SetupOutcome> {
        let (name, requested) = match &request {
            Request::Named { name, version } => (name.to_string(), version.map(str::to_string)),
            Request::Resolved(product) => (product.name.clone(), Some(product.version.clone())),
        };

        let product = match self.eups.find_setup_product(ctx.env(), &name)? {
            Some(product) => product,
            None => {
                let message = format!("I can't unsetup {name} as it isn't setup");
                debug!("{}", message);
                if !self.options.force {
                    return Ok(SetupOutcome::Failure(message));
                }
                // Enough to clear the markers
                Product::new(name.as_str(), requested.clone().unwrap_or_default(), self.flavor())
            }
        };

        if let Some(requested) = &requested
            && !self.is_requested_version(&product, requested)
        {
            warn!(
                "You asked to unsetup {} {} but version {} is currently setup; unsetting up {}",
                product.name, requested, product.version, product.version
            );
        }

        if depth == 0 {
            info!("Unsetting up: {} {}", product.name, product.version);
        }
        ctx.env.clear_markers(&product.name);

        let actions = match self
            .eups
            .table_actions(&product, self.options.setup_type.as_deref())
        {
            Ok(actions) => actions,
            Err(e) => {
                error!("product {} {}: {}", product.name, product.version, e);
                return Ok(SetupOutcome::Failure(e.to_string()));
            }
        };

        for action in &actions {
            if let Err(e) = action.execute(self, ctx, &product, depth + 1, Direction::Unsetup, no_recursion) {
                error!("Failed to unsetup {} {}: {}", product.name, product.version, e);
                return Ok(SetupOutcome::Failure(e.to_string()));
            }
        }

        Ok(SetupOutcome::Success(product.version))
    }

    /// Does the set-up product satisfy what the caller named?
    fn is_requested_version(&self, product: &Product, requested: &str) -> bool {
        match VersionSpec::classify(Some(requested), self.eups.tags()) {
            Ok(VersionSpec::Preferred) => true,
            Ok(VersionSpec::Exact(version)) => version == product.version,
            Ok(VersionSpec::Expression(expr)) => expr.matches(&product.version),
            Ok(VersionSpec::Tag(_)) => self
                .resolve(&product.name, Some(requested))
                .ok()
                .flatten()
                .is_some_and(|tagged| tagged.version == product.version),
            Err(_) => false,
        }
    }

    /// Set up (or unsetup) a dependency named by a table
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn setup_dependency(
        &self,
        ctx: &mut SetupContext<'_>,
        name: &str,
        version: Option<&str>,
        optional: bool,
        depth: usize,
        direction: Direction,
        no_recursion: bool,
    ) -> Result<()> {
        if no_recursion {
            debug!("Not recursing into {}", name);
            return Ok(());
        }
        if let Some(max_depth) = self.options.max_depth
            && depth > max_depth
        {
            debug!("{} is deeper than {} levels; skipping", name, max_depth);
            return Ok(());
        }

        let request = Request::Named { name, version };
        let result = match direction {
            Direction::Setup => self.setup_at(ctx, request, depth, no_recursion),
            Direction::Unsetup => self.unsetup_at(ctx, request, depth, no_recursion),
        };

        match (result, direction) {
            (Ok(SetupOutcome::Success(_)), _) => Ok(()),
            (Ok(SetupOutcome::Failure(reason)), Direction::Unsetup) => {
                debug!("{}", reason);
                Ok(())
            }
            (Err(e), Direction::Unsetup) => {
                debug!("Unable to unsetup {}: {}", name, e);
                Ok(())
            }
            (Ok(SetupOutcome::Failure(reason)), Direction::Setup) if optional => {
                warn!("Failed to setup optional product {}: {}", name, reason);
                Ok(())
            }
            (Err(e), Direction::Setup) if optional => {
                debug!("Optional product {} not setup: {}", name, e);
                Ok(())
            }
            (Ok(SetupOutcome::Failure(reason)), Direction::Setup) => {
                error!("Failed to setup required product {}: {}", name, reason);
                ctx.failures.push(SetupFailure {
                    product: name.to_string(),
                    reason,
                });
                Ok(())
            }
            // Unresolvable: aborts the table that asked for it
            (Err(e), Direction::Setup) => Err(e),
        }
    }
}

/// Same product by version or directory
fn is_same(current: &Product, product: &Product) -> bool {
    current.version == product.version
        || (current.dir.is_some() && current.dir == product.dir)
}

fn indent(depth: usize) -> String {
    let mut indent = "| ".repeat(depth / 2);
    if depth % 2 == 1 {
        indent.push('|');
    }
    indent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indent() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(1), "|");
        assert_eq!(indent(3), "| |");
    }

    #[test]
    fn test_is_same_by_dir() {
        let a = Product::new("afw", "1.0", "Linux").with_dir("/opt/afw");
        let b = Product::new("afw", "LOCAL:/opt/afw", "Linux").with_dir("/opt/afw");
        assert!(is_same(&a, &b));
        assert!(!is_same(&a, &Product::new("afw", "2.0", "Linux")));
    }
}
