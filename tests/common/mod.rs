// tests/common/mod.rs

//! Shared fixtures for integration tests: temporary stacks with declared
//! products and TOML tables.

#![allow(dead_code)]

use eups::tags::{CURRENT, NEWEST};
use eups::{Config, DeclareRequest, Eups, Product};
use std::path::PathBuf;
use tempfile::TempDir;

pub const FLAVOR: &str = "Linux";

/// Temporary stacks `s0`, `s1`, ... with a scratch user data directory
///
/// Keep the fixture alive for as long as the stacks are used.
pub struct Fixture {
    pub temp: TempDir,
    pub stacks: Vec<PathBuf>,
}

impl Fixture {
    pub fn new(stacks: usize) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let stacks = (0..stacks)
            .map(|i| {
                let root = temp.path().join(format!("s{i}"));
                std::fs::create_dir_all(root.join("ups_db")).unwrap();
                root
            })
            .collect();
        Self { temp, stacks }
    }

    pub fn config(&self) -> Config {
        Config::new()
            .with_path(self.stacks.clone())
            .with_flavor(FLAVOR)
            .with_user_data_dir(self.temp.path().join("user"))
            .with_preferred_tags([CURRENT, NEWEST])
    }

    pub fn eups(&self) -> Eups {
        Eups::new(self.config()).unwrap()
    }

    /// Create `<stack>/<name>/<version>` holding `ups/<name>.table`
    pub fn install(&self, stack: usize, name: &str, version: &str, table: &Table) -> PathBuf {
        let dir = self.stacks[stack].join(name).join(version);
        std::fs::create_dir_all(dir.join("ups")).unwrap();
        std::fs::write(dir.join("ups").join(format!("{name}.table")), table.to_toml(name)).unwrap();
        dir
    }

    /// Install and declare a product into one stack
    pub fn declare(&self, eups: &mut Eups, stack: usize, name: &str, version: &str, table: &Table) -> Product {
        let dir = self.install(stack, name, version, table);
        eups.declare(
            &DeclareRequest::new(name, version)
                .with_dir(&dir)
                .with_stack(&self.stacks[stack]),
        )
        .unwrap()
    }

    /// Install, declare and tag a product
    pub fn declare_tagged(
        &self,
        eups: &mut Eups,
        stack: usize,
        name: &str,
        version: &str,
        tag: &str,
        table: &Table,
    ) -> Product {
        let product = self.declare(eups, stack, name, version, table);
        eups.assign_tag(tag, name, version, Some(&self.stacks[stack]))
            .unwrap();
        product
    }
}

/// Builder for table files
///
/// Every table sets `<NAME>_MARK` to the product version and prepends
/// `<dir>/bin` to `PATH`, after any dependencies.
#[derive(Debug, Clone, Default)]
pub struct Table {
    requires: Vec<(String, Option<String>, bool)>,
    extra: Vec<String>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requires(mut self, product: &str, version: Option<&str>) -> Self {
        self.requires
            .push((product.to_string(), version.map(str::to_string), false));
        self
    }

    pub fn optional(mut self, product: &str, version: Option<&str>) -> Self {
        self.requires
            .push((product.to_string(), version.map(str::to_string), true));
        self
    }

    /// Append a raw `[[action]]` block
    pub fn action(mut self, toml: &str) -> Self {
        self.extra.push(toml.to_string());
        self
    }

    pub fn to_toml(&self, name: &str) -> String {
        let mut out = String::new();
        for (product, version, optional) in &self.requires {
            let kind = if *optional { "setup-optional" } else { "setup-required" };
            out.push_str(&format!("[[action]]\nkind = \"{kind}\"\nproduct = \"{product}\"\n"));
            if let Some(version) = version {
                out.push_str(&format!("version = \"{version}\"\n"));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "[[action]]\nkind = \"env-set\"\nname = \"{}_MARK\"\nvalue = \"${{PRODUCT_VERSION}}\"\n\n",
            name.to_uppercase()
        ));
        out.push_str(
            "[[action]]\nkind = \"env-prepend\"\nname = \"PATH\"\nvalue = \"${PRODUCT_DIR}/bin\"\n\n",
        );
        for extra in &self.extra {
            out.push_str("[[action]]\n");
            out.push_str(extra);
            out.push_str("\n\n");
        }
        out
    }
}
