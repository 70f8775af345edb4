// src/setup/context.rs

//! State owned by one top-level setup or unsetup call

use crate::config::Config;
use crate::env::{EnvChange, EnvironmentContext};
use crate::product::Product;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Direction of an environment transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Setup,
    Unsetup,
}

/// Policies for one setup or unsetup call
#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    /// Keep already set-up dependencies unless a newer one is required
    pub keep: bool,
    /// Re-apply products that are already set up
    pub force: bool,
    /// Apply only the requested product's own actions
    pub no_recursion: bool,
    /// Compute the changes without touching the caller's environment
    pub dry_run: bool,
    /// Deepest dependency level to set up (0 = requested product only)
    pub max_depth: Option<usize>,
    /// Selects table entries filtered by `setup_type`
    pub setup_type: Option<String>,
    /// Restrict resolution to these stacks
    pub paths: Option<Vec<PathBuf>>,
}

impl SetupOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            keep: config.keep,
            force: config.force,
            dry_run: config.dry_run,
            max_depth: config.max_depth,
            ..Default::default()
        }
    }

    pub fn with_keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_no_recursion(mut self, no_recursion: bool) -> Self {
        self.no_recursion = no_recursion;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_setup_type(mut self, setup_type: impl Into<String>) -> Self {
        self.setup_type = Some(setup_type.into());
        self
    }

    pub fn with_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.paths = Some(paths);
        self
    }
}

/// How a product's setup ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The version now set up (or kept)
    Success(String),
    /// Why this product, and only this product, failed
    Failure(String),
}

impl SetupOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SetupOutcome::Success(_))
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            SetupOutcome::Success(version) => Some(version),
            SetupOutcome::Failure(_) => None,
        }
    }
}

/// A required dependency that failed below the top level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupFailure {
    pub product: String,
    pub reason: String,
}

/// Result of a top-level call
#[derive(Debug, Clone)]
pub struct SetupReport {
    pub outcome: SetupOutcome,
    /// Environment changes made (or, in a dry run, that would be made)
    pub changes: Vec<EnvChange>,
    /// Dependencies that failed while their siblings carried on
    pub failures: Vec<SetupFailure>,
}

/// Mutable state threaded through one top-level call
///
/// Created by the top-level caller and dropped when it returns, taking
/// the keep baseline and message memo with it.
pub struct SetupContext<'e> {
    pub(crate) env: &'e mut EnvironmentContext,
    /// Products set up before the call, plus those set up during it
    pub(crate) kept: BTreeMap<String, Product>,
    pub(crate) failures: Vec<SetupFailure>,
    announced: HashSet<(String, String, String)>,
    notes: HashSet<String>,
}

impl<'e> SetupContext<'e> {
    pub fn new(env: &'e mut EnvironmentContext, kept: Vec<Product>) -> Self {
        Self {
            env,
            kept: kept.into_iter().map(|p| (p.name.clone(), p)).collect(),
            failures: Vec::new(),
            announced: HashSet::new(),
            notes: HashSet::new(),
        }
    }

    pub fn env(&self) -> &EnvironmentContext {
        &*self.env
    }

    /// True the first time `product` is seen in this call
    pub(crate) fn announce(&mut self, product: &Product) -> bool {
        self.announced.insert((
            product.name.clone(),
            product.flavor.clone(),
            product.version.clone(),
        ))
    }

    /// True the first time `message` is noted in this call
    pub(crate) fn note(&mut self, message: &str) -> bool {
        self.notes.insert(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announce_once() {
        let mut env = EnvironmentContext::new();
        let mut ctx = SetupContext::new(&mut env, Vec::new());
        let product = Product::new("afw", "1.0", "Linux");

        assert!(ctx.announce(&product));
        assert!(!ctx.announce(&product));
        assert!(ctx.announce(&Product::new("afw", "2.0", "Linux")));
    }

    #[test]
    fn test_options_from_config() {
        let config = Config::new().with_keep(true).with_max_depth(Some(2));
        let options = SetupOptions::from_config(&config);
        assert!(options.keep);
        assert!(!options.force);
        assert_eq!(options.max_depth, Some(2));
    }

    #[test]
    fn test_outcome_version() {
        assert_eq!(SetupOutcome::Success("1.0".into()).version(), Some("1.0"));
        assert!(!SetupOutcome::Failure("boom".into()).is_success());
    }
}
