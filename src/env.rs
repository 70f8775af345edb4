// src/env.rs

//! Environment model and setup markers
//!
//! Setup never touches the real process environment. It mutates an
//! [`EnvironmentContext`] that the caller snapshots from the process (or
//! builds by hand in tests) and later diffs to find what changed.
//!
//! Each set-up product leaves two markers behind:
//!
//! - `<NAME>_DIR` holds the install directory
//! - `SETUP_<NAME>` holds `name version [-f flavor] [-Z stack]`, enough for
//!   a later process to find the product again

use crate::error::{Error, Result};
use crate::product::{LOCAL_PREFIX, Product};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static SETUP_VAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^SETUP_(\w+)$").unwrap());

/// Variables and aliases of one (possibly simulated) process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentContext {
    vars: BTreeMap<String, String>,
    aliases: BTreeMap<String, String>,
}

/// One difference between two environments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvChange {
    Set { name: String, value: String },
    Unset { name: String },
    AliasSet { name: String, value: String },
    AliasUnset { name: String },
}

impl fmt::Display for EnvChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvChange::Set { name, value } => write!(f, "set {name}={value}"),
            EnvChange::Unset { name } => write!(f, "unset {name}"),
            EnvChange::AliasSet { name, value } => write!(f, "alias {name}={value}"),
            EnvChange::AliasUnset { name } => write!(f, "unalias {name}"),
        }
    }
}

impl EnvironmentContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the variables of the running process
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            aliases: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn unset(&mut self, name: &str) {
        self.vars.remove(name);
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Put `value` at the front of a delimited list, dropping other copies
    pub fn prepend(&mut self, name: &str, value: &str, delimiter: &str) {
        let mut parts = vec![value.to_string()];
        parts.extend(self.list_without(name, value, delimiter));
        self.set(name, parts.join(delimiter));
    }

    /// Put `value` at the end of a delimited list, dropping other copies
    pub fn append(&mut self, name: &str, value: &str, delimiter: &str) {
        let mut parts = self.list_without(name, value, delimiter);
        parts.push(value.to_string());
        self.set(name, parts.join(delimiter));
    }

    /// Remove `value` from a delimited list; an emptied list is unset
    pub fn remove_from_list(&mut self, name: &str, value: &str, delimiter: &str) {
        if !self.is_set(name) {
            return;
        }
        let parts = self.list_without(name, value, delimiter);
        if parts.is_empty() {
            self.unset(name);
        } else {
            self.set(name, parts.join(delimiter));
        }
    }

    fn list_without(&self, name: &str, value: &str, delimiter: &str) -> Vec<String> {
        match self.get(name) {
            Some(current) if !delimiter.is_empty() => current
                .split(delimiter)
                .filter(|part| !part.is_empty() && *part != value)
                .map(str::to_string)
                .collect(),
            Some(current) if !current.is_empty() && current != value => vec![current.to_string()],
            _ => Vec::new(),
        }
    }

    pub fn alias(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    pub fn set_alias(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.aliases.insert(name.into(), value.into());
    }

    pub fn unset_alias(&mut self, name: &str) {
        self.aliases.remove(name);
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    /// Changes that turn `before` into `self`
    pub fn diff(&self, before: &EnvironmentContext) -> Vec<EnvChange> {
        let mut changes = Vec::new();

        for name in before.vars.keys().filter(|k| !self.vars.contains_key(*k)) {
            changes.push(EnvChange::Unset { name: name.clone() });
        }
        for (name, value) in &self.vars {
            if before.vars.get(name) != Some(value) {
                changes.push(EnvChange::Set {
                    name: name.clone(),
                    value: value.clone(),
                });
            }
        }
        for name in before.aliases.keys().filter(|k| !self.aliases.contains_key(*k)) {
            changes.push(EnvChange::AliasUnset { name: name.clone() });
        }
        for (name, value) in &self.aliases {
            if before.aliases.get(name) != Some(value) {
                changes.push(EnvChange::AliasSet {
                    name: name.clone(),
                    value: value.clone(),
                });
            }
        }

        changes
    }

    /// Name of the setup marker for `product`
    ///
    /// An exact `SETUP_<product>` wins, then a case-insensitive match, and
    /// otherwise the upper-cased name is generated.
    pub fn setup_var_name(&self, product: &str) -> String {
        let name = format!("SETUP_{product}");
        if self.vars.contains_key(&name) {
            return name;
        }

        self.vars
            .keys()
            .find(|k| k.eq_ignore_ascii_case(&name))
            .cloned()
            .unwrap_or_else(|| name.to_uppercase())
    }

    /// Parsed setup marker for `product`, if it is set up
    pub fn setup_marker(&self, product: &str) -> Result<Option<SetupMarker>> {
        let var = self.setup_var_name(product);
        match self.get(&var) {
            Some(value) => SetupMarker::parse(value).map(Some),
            None => Ok(None),
        }
    }

    /// Names of every product with a setup marker
    pub fn setup_product_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .vars
            .iter()
            .filter(|(k, _)| SETUP_VAR.is_match(k))
            .filter_map(|(_, v)| v.split_whitespace().next().map(str::to_string))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Write both markers for `product`
    pub fn set_markers(&mut self, product: &Product, default_flavor: &str, default_stack: Option<&Path>) {
        let marker = SetupMarker::for_product(product, default_flavor, default_stack);
        if let Some(dir) = &product.dir {
            self.set(dir_var_name(&product.name), dir.display().to_string());
        }
        let var = self.setup_var_name(&product.name);
        self.set(var, marker.to_string());
    }

    /// Remove both markers for `name`
    pub fn clear_markers(&mut self, name: &str) {
        self.unset(&dir_var_name(name));
        let var = self.setup_var_name(name);
        self.unset(&var);
    }

    /// Directory recorded for a set-up product
    pub fn product_dir(&self, name: &str) -> Option<PathBuf> {
        self.get(&dir_var_name(name)).map(PathBuf::from)
    }
}

/// `<NAME_UPPER>_DIR`
pub fn dir_var_name(product: &str) -> String {
    format!("{}_DIR", product.to_uppercase())
}

/// Decoded `SETUP_<NAME>` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupMarker {
    pub name: String,
    pub version: String,
    pub flavor: Option<String>,
    pub stack: Option<PathBuf>,
}

impl SetupMarker {
    /// Marker for `product`; flavor and stack are omitted when they are
    /// the defaults
    pub fn for_product(product: &Product, default_flavor: &str, default_stack: Option<&Path>) -> Self {
        Self {
            name: product.name.clone(),
            version: product.version.clone(),
            flavor: (product.flavor != default_flavor).then(|| product.flavor.clone()),
            stack: product
                .stack
                .clone()
                .filter(|stack| Some(stack.as_path()) != default_stack),
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let mut words = value.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| Error::ParseError(format!("Empty setup marker \"{value}\"")))?
            .to_string();

        let mut version = None;
        let mut flavor = None;
        let mut stack = None;

        while let Some(word) = words.next() {
            match word {
                "-f" => flavor = words.next().map(str::to_string),
                "-Z" => stack = words.next().filter(|s| *s != "(none)").map(PathBuf::from),
                _ if version.is_none() => version = Some(word.to_string()),
                _ => {
                    return Err(Error::ParseError(format!(
                        "Unexpected \"{word}\" in setup marker \"{value}\""
                    )));
                }
            }
        }

        Ok(Self {
            name,
            version: version.unwrap_or_else(|| "setup".to_string()),
            flavor,
            stack,
        })
    }

    pub fn is_local(&self) -> bool {
        self.version.starts_with(LOCAL_PREFIX)
    }
}

impl fmt::Display for SetupMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)?;
        if let Some(flavor) = &self.flavor {
            write!(f, " -f {flavor}")?;
        }
        if let Some(stack) = &self.stack {
            write!(f, " -Z {}", stack.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_omits_defaults() {
        let product = Product::new("afw", "1.0", "Linux").with_stack("/stack");
        let first = Some(Path::new("/stack"));
        let other = Some(Path::new("/other"));
        assert_eq!(SetupMarker::for_product(&product, "Linux", first).to_string(), "afw 1.0");
        assert_eq!(
            SetupMarker::for_product(&product, "Linux", other).to_string(),
            "afw 1.0 -Z /stack"
        );
        assert_eq!(
            SetupMarker::for_product(&product, "Darwin", other).to_string(),
            "afw 1.0 -f Linux -Z /stack"
        );
    }

    #[test]
    fn test_marker_parse() {
        let marker = SetupMarker::parse("afw 1.0 -f Linux -Z /stack").unwrap();
        assert_eq!(marker.version, "1.0");
        assert_eq!(marker.flavor.as_deref(), Some("Linux"));
        assert_eq!(marker.stack, Some(PathBuf::from("/stack")));

        let bare = SetupMarker::parse("afw").unwrap();
        assert_eq!(bare.version, "setup");
        assert!(SetupMarker::parse("").is_err());
        assert!(SetupMarker::parse("afw 1.0 2.0").is_err());
    }

    #[test]
    fn test_setup_var_name_lookup_order() {
        let env = EnvironmentContext::from_vars([("SETUP_afw", "afw 1.0"), ("SETUP_BOOST", "boost 1.0")]);
        assert_eq!(env.setup_var_name("afw"), "SETUP_afw");
        assert_eq!(env.setup_var_name("boost"), "SETUP_BOOST");
        assert_eq!(env.setup_var_name("eigen"), "SETUP_EIGEN");
        assert_eq!(env.setup_product_names(), vec!["afw", "boost"]);
    }

    #[test]
    fn test_set_and_clear_markers() {
        let mut env = EnvironmentContext::new();
        let product = Product::new("afw", "1.0", "Linux").with_dir("/opt/afw");

        env.set_markers(&product, "Linux", None);
        assert_eq!(env.get("AFW_DIR"), Some("/opt/afw"));
        assert_eq!(env.get("SETUP_AFW"), Some("afw 1.0"));

        env.clear_markers("afw");
        assert!(env.vars().is_empty());
    }

    #[test]
    fn test_prepend_is_idempotent() {
        let mut env = EnvironmentContext::from_vars([("PATH", "/usr/bin:/bin")]);
        env.prepend("PATH", "/opt/afw/bin", ":");
        env.prepend("PATH", "/opt/afw/bin", ":");
        assert_eq!(env.get("PATH"), Some("/opt/afw/bin:/usr/bin:/bin"));

        env.remove_from_list("PATH", "/opt/afw/bin", ":");
        assert_eq!(env.get("PATH"), Some("/usr/bin:/bin"));
    }

    #[test]
    fn test_diff() {
        let before = EnvironmentContext::from_vars([("A", "1"), ("B", "2")]);
        let mut after = before.clone();
        after.unset("A");
        after.set("B", "3");
        after.set_alias("ll", "ls -l");

        let changes: Vec<String> = after.diff(&before).iter().map(|c| c.to_string()).collect();
        assert_eq!(changes, vec!["unset A", "set B=3", "alias ll=ls -l"]);
    }
}
