// src/config.rs
//! Session configuration
//!
//! Values come from, lowest precedence first:
//! - built-in defaults
//! - `<user data dir>/config.toml`
//! - `EUPS_PATH` and `EUPS_FLAVOR`
//! - builder calls (the command line)
//!
//! The user data directory is `EUPS_USERDATA`, else `~/.eups`.

use crate::error::Result;
use crate::flavor;
use crate::tags::CURRENT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the configuration file inside the user data directory
pub const CONFIG_FILE: &str = "config.toml";

/// Everything an [`crate::Eups`] session needs to know up front
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stacks in precedence order
    pub path: Vec<PathBuf>,

    /// Active flavor
    pub flavor: String,

    /// Ordered fallbacks per flavor
    pub fallback_flavors: BTreeMap<String, Vec<String>>,

    pub preferred_tags: Vec<String>,

    /// Extra tags persisted in stack databases
    pub global_tags: Vec<String>,

    /// Extra tags held only in memory
    pub local_tags: Vec<String>,

    /// Recursion cap for setup and removal (0 = top level only)
    pub max_depth: Option<usize>,

    pub keep: bool,
    pub force: bool,
    pub dry_run: bool,
    pub use_cache: bool,

    #[serde(skip)]
    pub user_data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: Vec::new(),
            flavor: flavor::detect(),
            fallback_flavors: flavor::default_fallbacks(),
            preferred_tags: vec![CURRENT.to_string()],
            global_tags: Vec::new(),
            local_tags: Vec::new(),
            max_depth: None,
            keep: false,
            force: false,
            dry_run: false,
            use_cache: true,
            user_data_dir: default_user_data_dir(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `config.toml` from `user_data_dir`, if present
    pub fn load(user_data_dir: &Path) -> Result<Self> {
        let file = user_data_dir.join(CONFIG_FILE);
        let mut config = if file.exists() {
            debug!("Loading configuration from {}", file.display());
            let content = std::fs::read_to_string(&file)?;
            let mut config: Config = toml::from_str(&content)?;
            for (flavor, chain) in flavor::default_fallbacks() {
                config.fallback_flavors.entry(flavor).or_insert(chain);
            }
            config
        } else {
            Config::default()
        };

        config.user_data_dir = user_data_dir.to_path_buf();
        Ok(config)
    }

    /// The usual entry point: config file plus environment overrides
    pub fn from_env() -> Result<Self> {
        let user_data_dir = std::env::var_os("EUPS_USERDATA")
            .map(PathBuf::from)
            .unwrap_or_else(default_user_data_dir);
        let mut config = Self::load(&user_data_dir)?;

        if let Ok(path) = std::env::var("EUPS_PATH") {
            config.path = split_path(&path);
        }
        if let Ok(flavor) = std::env::var("EUPS_FLAVOR")
            && !flavor.is_empty()
        {
            config.flavor = flavor;
        }

        Ok(config)
    }

    pub fn with_path<I, P>(mut self, path: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.flavor = flavor.into();
        self
    }

    pub fn with_user_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_data_dir = dir.into();
        self
    }

    pub fn with_preferred_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.preferred_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_global_tag(mut self, tag: impl Into<String>) -> Self {
        self.global_tags.push(tag.into());
        self
    }

    pub fn with_local_tag(mut self, tag: impl Into<String>) -> Self {
        self.local_tags.push(tag.into());
        self
    }

    pub fn with_fallbacks<S: Into<String>>(mut self, flavor: &str, chain: impl IntoIterator<Item = S>) -> Self {
        self.fallback_flavors.insert(
            flavor.to_string(),
            chain.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Fallback flavors for the active flavor
    pub fn fallbacks(&self) -> Vec<String> {
        flavor::fallbacks(&self.flavor, &self.fallback_flavors)
    }
}

/// `~/.eups`, or `./.eups` without a home directory
pub fn default_user_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".eups")
}

/// Split a colon-separated search path, dropping empty entries
pub fn split_path(path: &str) -> Vec<PathBuf> {
    path.split(':')
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_path() {
        assert_eq!(
            split_path("/a::/b:"),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.preferred_tags, vec!["current"]);
        assert!(config.use_cache);
        assert_eq!(config.user_data_dir, temp.path());
    }

    #[test]
    fn test_load_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            r#"
flavor = "Linux"
preferred_tags = ["stable", "current"]
global_tags = ["beta"]
keep = true

[fallback_flavors]
Linux = ["Generic"]
"#,
        )
        .unwrap();

        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.flavor, "Linux");
        assert_eq!(config.preferred_tags, vec!["stable", "current"]);
        assert!(config.keep);
        assert_eq!(config.fallbacks(), vec!["Generic"]);
        assert!(config.fallback_flavors.contains_key("Linux64"));
    }

    #[test]
    fn test_builder() {
        let config = Config::new()
            .with_path(["/a", "/b"])
            .with_flavor("Darwin")
            .with_max_depth(Some(0));
        assert_eq!(config.path.len(), 2);
        assert_eq!(config.fallbacks(), vec!["generic"]);
        assert_eq!(config.max_depth, Some(0));
    }
}
