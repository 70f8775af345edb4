// src/uses.rs

//! Reverse dependencies: which products need a given product
//!
//! The graph is built from every declared product's own table, one level
//! at a time, and inverted so that each (name, version) maps to the
//! products that set it up together with how many hops away they are.

use crate::env::EnvironmentContext;
use crate::error::Result;
use crate::eups::{Eups, ListFilter};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, warn};

type Key = (String, String);

/// A direct edge read from a table
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edge {
    to: Key,
    requested: Option<String>,
    optional: bool,
    tag_requested: bool,
}

/// A product that needs another one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub version: String,
    /// Version spec of the table entry naming the dependency
    pub requested: Option<String>,
    pub optional: bool,
    pub tag_requested: bool,
    /// 1 = named in this product's own table
    pub depth: usize,
}

/// Reverse-dependency index over every declared product
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<Key, Vec<Edge>>,
    users: BTreeMap<Key, Vec<User>>,
}

impl DependencyGraph {
    /// Read the direct dependencies of every product on the path
    ///
    /// Products whose tables cannot be read are reported and skipped.
    pub fn build(eups: &Eups) -> Result<Self> {
        let listed = eups.list_products(&EnvironmentContext::new(), &ListFilter::default())?;
        let mut graph = Self::default();

        for entry in listed {
            let product = entry.product;
            let from = (product.name.clone(), product.version.clone());
            if graph.edges.contains_key(&from) {
                continue;
            }

            let dependencies = match eups.product_dependencies(&product, None) {
                Ok(dependencies) => dependencies,
                Err(e) => {
                    warn!("{} {}: {}", product.name, product.version, e);
                    continue;
                }
            };

            let edges = dependencies
                .into_iter()
                .filter(|d| d.product.name != product.name || d.product.version != product.version)
                .map(|d| Edge {
                    to: (d.product.name, d.product.version),
                    requested: d.requested,
                    optional: d.optional,
                    tag_requested: d.tag_requested,
                })
                .collect();
            graph.edges.insert(from, edges);
        }

        graph.invert();
        Ok(graph)
    }

    /// Add a direct dependency by hand
    pub fn add_edge(
        &mut self,
        from: (&str, &str),
        to: (&str, &str),
        requested: Option<&str>,
        optional: bool,
    ) {
        self.edges
            .entry((from.0.to_string(), from.1.to_string()))
            .or_default()
            .push(Edge {
                to: (to.0.to_string(), to.1.to_string()),
                requested: requested.map(str::to_string),
                optional,
                tag_requested: false,
            });
        self.invert();
    }

    /// Walk outward from every product, recording the shortest hop count
    /// at which it reaches each dependency
    fn invert(&mut self) {
        self.users.clear();

        for from in self.edges.keys() {
            let mut reached: BTreeMap<&Key, (usize, &Edge)> = BTreeMap::new();
            let mut queue: VecDeque<(&Key, usize)> = VecDeque::from([(from, 0)]);

            while let Some((node, depth)) = queue.pop_front() {
                for edge in self.edges.get(node).into_iter().flatten() {
                    if &edge.to == from || reached.contains_key(&edge.to) {
                        continue;
                    }
                    reached.insert(&edge.to, (depth + 1, edge));
                    queue.push_back((&edge.to, depth + 1));
                }
            }

            for (to, (depth, edge)) in reached {
                self.users.entry(to.clone()).or_default().push(User {
                    name: from.0.clone(),
                    version: from.1.clone(),
                    requested: edge.requested.clone(),
                    optional: edge.optional,
                    tag_requested: edge.tag_requested,
                    depth,
                });
            }
        }
        debug!("Dependency graph covers {} products", self.edges.len());
    }

    /// Products needing `name` (any version if `version` is `None`) within
    /// `depth` hops
    pub fn users(&self, name: &str, version: Option<&str>, depth: usize) -> Vec<User> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|((n, v), _)| n == name && version.is_none_or(|version| v == version))
            .flat_map(|(_, users)| users.iter())
            .filter(|u| u.depth <= depth)
            .cloned()
            .collect();
        users.sort_by(|a, b| (&a.name, &a.version, a.depth).cmp(&(&b.name, &b.version, b.depth)));
        users.dedup_by(|a, b| a.name == b.name && a.version == b.version);
        users
    }

    /// Direct dependencies of (`name`, `version`) as (name, version) pairs
    pub fn dependencies(&self, name: &str, version: &str) -> Vec<(String, String)> {
        self.edges
            .get(&(name.to_string(), version.to_string()))
            .map(|edges| edges.iter().map(|e| e.to.clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
