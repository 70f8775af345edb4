// src/table/mod.rs

//! Product tables: the ordered actions run when a product is set up
//!
//! Tables are structured TOML documents deserialized straight into
//! [`Action`] values:
//!
//! ```toml
//! [[action]]
//! kind = "setup-required"
//! product = "cfitsio"
//! version = ">= 3.0"
//!
//! [[action]]
//! kind = "env-prepend"
//! name = "PATH"
//! value = "${PRODUCT_DIR}/bin"
//! flavor = "Linux64"
//! ```
//!
//! Any entry may carry `flavor` and `setup_type` filters; entries whose
//! filters do not match are dropped when the table is loaded.

use crate::env::EnvironmentContext;
use crate::error::{Error, Result};
use crate::product::Product;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{(\w+)\}").unwrap());

fn default_delimiter() -> String {
    ":".to_string()
}

/// One table action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Action {
    /// Set up a dependency; failure fails the depender
    SetupRequired {
        product: String,
        #[serde(default)]
        version: Option<String>,
    },
    /// Set up a dependency if it can be found
    SetupOptional {
        product: String,
        #[serde(default)]
        version: Option<String>,
    },
    EnvSet {
        name: String,
        value: String,
    },
    EnvUnset {
        name: String,
    },
    EnvPrepend {
        name: String,
        value: String,
        #[serde(default = "default_delimiter")]
        delimiter: String,
    },
    EnvAppend {
        name: String,
        value: String,
        #[serde(default = "default_delimiter")]
        delimiter: String,
    },
    AliasSet {
        name: String,
        value: String,
    },
    AliasUnset {
        name: String,
    },
    /// Run `then` if `when` holds, else `otherwise`
    Conditional {
        when: Condition,
        #[serde(default)]
        then: Vec<TableEntry>,
        #[serde(default)]
        otherwise: Vec<TableEntry>,
    },
}

/// An action plus the filters deciding whether it applies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    #[serde(flatten)]
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_type: Option<String>,
}

impl TableEntry {
    pub fn applies(&self, flavor: &str, setup_type: Option<&str>) -> bool {
        self.flavor.as_deref().is_none_or(|f| f == flavor)
            && self
                .setup_type
                .as_deref()
                .is_none_or(|t| setup_type == Some(t))
    }
}

/// Test guarding a conditional block; every given field must hold
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub setup_type: Option<String>,
    /// Holds if this variable is set
    #[serde(default)]
    pub env_set: Option<String>,
}

impl Condition {
    pub fn holds(&self, flavor: &str, setup_type: Option<&str>, env: &EnvironmentContext) -> bool {
        self.holds_statically(flavor, setup_type)
            && self.env_set.as_deref().is_none_or(|var| env.is_set(var))
    }

    /// Evaluate without an environment; `env_set` is taken to hold
    pub fn holds_statically(&self, flavor: &str, setup_type: Option<&str>) -> bool {
        self.flavor.as_deref().is_none_or(|f| f == flavor)
            && self
                .setup_type
                .as_deref()
                .is_none_or(|t| setup_type == Some(t))
    }
}

/// Keep the entries that apply to `flavor`/`setup_type`, in order
pub fn select(entries: &[TableEntry], flavor: &str, setup_type: Option<&str>) -> Vec<Action> {
    entries
        .iter()
        .filter(|e| e.applies(flavor, setup_type))
        .map(|e| e.action.clone())
        .collect()
}

/// A dependency named by a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRequest {
    pub product: String,
    pub version: Option<String>,
    pub optional: bool,
}

/// Direct dependencies of a table, in order
///
/// Conditionals are followed by their static condition, so `env_set`
/// tests are assumed to hold.
pub fn dependency_requests(
    entries: &[TableEntry],
    flavor: &str,
    setup_type: Option<&str>,
) -> Vec<DependencyRequest> {
    let mut requests = Vec::new();
    collect_requests(entries, flavor, setup_type, &mut requests);
    requests
}

fn collect_requests(
    entries: &[TableEntry],
    flavor: &str,
    setup_type: Option<&str>,
    requests: &mut Vec<DependencyRequest>,
) {
    for entry in entries.iter().filter(|e| e.applies(flavor, setup_type)) {
        match &entry.action {
            Action::SetupRequired { product, version } | Action::SetupOptional { product, version } => {
                requests.push(DependencyRequest {
                    product: product.clone(),
                    version: version.clone(),
                    optional: matches!(entry.action, Action::SetupOptional { .. }),
                });
            }
            Action::Conditional { when, then, otherwise } => {
                let branch = if when.holds_statically(flavor, setup_type) {
                    then
                } else {
                    otherwise
                };
                collect_requests(branch, flavor, setup_type, requests);
            }
            _ => {}
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TableFile {
    #[serde(default, rename = "action")]
    actions: Vec<TableEntry>,
}

/// Supplies the actions of a table
pub trait TableSource {
    /// Every entry of the table at `table`, unfiltered
    fn entries(&self, table: &Path) -> Result<Vec<TableEntry>>;

    /// Entries applying to `flavor` and `setup_type`
    fn actions(&self, table: &Path, flavor: &str, setup_type: Option<&str>) -> Result<Vec<Action>> {
        Ok(select(&self.entries(table)?, flavor, setup_type))
    }
}

/// Reads TOML table files from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlTables;

impl TableSource for TomlTables {
    fn entries(&self, table: &Path) -> Result<Vec<TableEntry>> {
        debug!("Reading table {}", table.display());
        let content = std::fs::read_to_string(table).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::NotFound(format!("Table file {} not found", table.display()))
            }
            _ => Error::IoError(e),
        })?;
        parse(&content)
    }
}

/// Parse table text
pub fn parse(content: &str) -> Result<Vec<TableEntry>> {
    let file: TableFile = toml::from_str(content)?;
    Ok(file.actions)
}

/// Expand `${...}` references
///
/// `PRODUCT_DIR`, `PRODUCT_NAME`, `PRODUCT_VERSION` and `PRODUCT_FLAVOR`
/// come from `product`; anything else from `env`. Unknown references are
/// left as written.
pub fn interpolate(value: &str, product: &Product, env: &EnvironmentContext) -> String {
    REFERENCE
        .replace_all(value, |caps: &Captures| {
            let name = &caps[1];
            let resolved = match name {
                "PRODUCT_DIR" => product.dir.as_ref().map(|d| d.display().to_string()),
                "PRODUCT_NAME" => Some(product.name.clone()),
                "PRODUCT_VERSION" => Some(product.version.clone()),
                "PRODUCT_FLAVOR" => Some(product.flavor.clone()),
                _ => env.get(name).map(str::to_string),
            };
            resolved.unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
[[action]]
kind = "setup-required"
product = "boost"
version = ">= 1.40"

[[action]]
kind = "setup-optional"
product = "doxygen"
setup_type = "build"

[[action]]
kind = "env-prepend"
name = "PATH"
value = "${PRODUCT_DIR}/bin"

[[action]]
kind = "env-set"
name = "AFW_OS"
value = "darwin"
flavor = "Darwin"

[[action]]
kind = "conditional"
when = { flavor = "Linux" }
then = [{ kind = "alias-set", name = "afwrun", value = "run" }]
otherwise = [{ kind = "alias-unset", name = "afwrun" }]
"#;

    #[test]
    fn test_parse_table() {
        let entries = parse(TABLE).unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(
            entries[0].action,
            Action::SetupRequired {
                product: "boost".to_string(),
                version: Some(">= 1.40".to_string()),
            }
        );
        assert_eq!(entries[1].setup_type.as_deref(), Some("build"));
        assert!(matches!(
            &entries[2].action,
            Action::EnvPrepend { delimiter, .. } if delimiter == ":"
        ));
    }

    #[test]
    fn test_select_filters() {
        let entries = parse(TABLE).unwrap();
        assert_eq!(select(&entries, "Linux", None).len(), 3);
        assert_eq!(select(&entries, "Linux", Some("build")).len(), 4);
        assert_eq!(select(&entries, "Darwin", None).len(), 4);
    }

    #[test]
    fn test_dependency_requests() {
        let entries = parse(TABLE).unwrap();
        let requests = dependency_requests(&entries, "Linux", Some("build"));
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].product, "boost");
        assert!(!requests[0].optional);
        assert!(requests[1].optional);

        let nested = parse(
            r#"
[[action]]
kind = "conditional"
when = { flavor = "Darwin" }
then = [{ kind = "setup-required", product = "macports" }]
otherwise = [{ kind = "setup-required", product = "gcc", version = "4.2" }]
"#,
        )
        .unwrap();
        let requests = dependency_requests(&nested, "Linux", None);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].product, "gcc");
        assert_eq!(requests[0].version.as_deref(), Some("4.2"));
    }

    #[test]
    fn test_condition() {
        let env = EnvironmentContext::from_vars([("DISPLAY", ":0")]);
        let cond = Condition {
            flavor: Some("Linux".to_string()),
            env_set: Some("DISPLAY".to_string()),
            ..Default::default()
        };
        assert!(cond.holds("Linux", None, &env));
        assert!(!cond.holds("Darwin", None, &env));
        assert!(!cond.holds("Linux", None, &EnvironmentContext::new()));
        assert!(cond.holds_statically("Linux", None));
    }

    #[test]
    fn test_interpolate() {
        let product = Product::new("afw", "1.0", "Linux").with_dir("/opt/afw");
        let env = EnvironmentContext::from_vars([("HOME", "/home/rhl")]);

        assert_eq!(interpolate("${PRODUCT_DIR}/bin", &product, &env), "/opt/afw/bin");
        assert_eq!(interpolate("${HOME}/.afw", &product, &env), "/home/rhl/.afw");
        assert_eq!(interpolate("${NOPE}/x", &product, &env), "${NOPE}/x");
    }

    #[test]
    fn test_missing_table_is_not_found() {
        let err = TomlTables.entries(Path::new("/nonexistent/afw.table")).unwrap_err();
        assert!(err.is_not_found());
    }
}
