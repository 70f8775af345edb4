// src/tags.rs

//! Tags: named markers on product versions
//!
//! Global tags (`current`, `stable`, ...) are persisted in a stack's
//! database; local tags live only for the lifetime of the process. The
//! pseudo-tag `newest` is always recognized and never stored: it selects
//! the highest version by [`crate::version::compare`].

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Tag selected when no version is requested
pub const CURRENT: &str = "current";

/// Pseudo-tag selecting the highest declared version
pub const NEWEST: &str = "newest";

/// Where a tag assignment lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagScope {
    /// Written to the stack database
    Global,
    /// Held in memory by this process only
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub scope: TagScope,
}

impl Tag {
    pub fn is_global(&self) -> bool {
        self.scope == TagScope::Global
    }

    /// The `newest` pseudo-tag
    pub fn is_newest(&self) -> bool {
        self.name == NEWEST
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Recognized tags and the preference order used to pick a version
#[derive(Debug, Clone)]
pub struct TagRegistry {
    tags: BTreeMap<String, TagScope>,
    preferred: Vec<String>,
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TagRegistry {
    /// Registry holding `current`, `stable` and `newest`
    pub fn new() -> Self {
        let mut tags = BTreeMap::new();
        tags.insert(CURRENT.to_string(), TagScope::Global);
        tags.insert("stable".to_string(), TagScope::Global);
        tags.insert(NEWEST.to_string(), TagScope::Global);

        Self {
            tags,
            preferred: vec![CURRENT.to_string()],
        }
    }

    pub fn register_global(&mut self, name: impl Into<String>) {
        self.tags.insert(name.into(), TagScope::Global);
    }

    pub fn register_local(&mut self, name: impl Into<String>) {
        self.tags.insert(name.into(), TagScope::Local);
    }

    pub fn is_recognized(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    /// Look up a tag, failing with `TagNotRecognized`
    pub fn get(&self, name: &str) -> Result<Tag> {
        self.tags
            .get(name)
            .map(|scope| Tag {
                name: name.to_string(),
                scope: *scope,
            })
            .ok_or_else(|| Error::TagNotRecognized(name.to_string()))
    }

    /// Recognized tag names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.tags.keys().map(String::as_str).collect()
    }

    pub fn preferred(&self) -> &[String] {
        &self.preferred
    }

    /// Replace the preference order
    ///
    /// Unrecognized names are dropped; if nothing survives the current
    /// order is left untouched. Returns the names that were dropped.
    pub fn set_preferred<S: AsRef<str>>(&mut self, tags: &[S]) -> Vec<String> {
        let mut kept = Vec::new();
        let mut dropped = Vec::new();

        for tag in tags {
            let tag = tag.as_ref();
            if self.is_recognized(tag) {
                if !kept.iter().any(|t: &String| t == tag) {
                    kept.push(tag.to_string());
                }
            } else {
                debug!("Ignoring unrecognized preferred tag {}", tag);
                dropped.push(tag.to_string());
            }
        }

        if !kept.is_empty() {
            self.preferred = kept;
        }
        dropped
    }
}

/// Process-local tag assignments, keyed by (tag, product, flavor)
#[derive(Debug, Clone, Default)]
pub struct LocalTags {
    assignments: BTreeMap<(String, String, String), String>,
}

impl LocalTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `tag` at `version`, moving it off any other version
    pub fn assign(&mut self, tag: &str, product: &str, flavor: &str, version: &str) {
        self.assignments.insert(
            (tag.to_string(), product.to_string(), flavor.to_string()),
            version.to_string(),
        );
    }

    /// Remove an assignment; with a version, only if it points there
    pub fn unassign(&mut self, tag: &str, product: &str, flavor: &str, version: Option<&str>) -> bool {
        let key = (tag.to_string(), product.to_string(), flavor.to_string());
        match (self.assignments.get(&key), version) {
            (Some(held), Some(version)) if held != version => false,
            (Some(_), _) => {
                self.assignments.remove(&key);
                true
            }
            (None, _) => false,
        }
    }

    pub fn version_for(&self, tag: &str, product: &str, flavor: &str) -> Option<&str> {
        self.assignments
            .get(&(tag.to_string(), product.to_string(), flavor.to_string()))
            .map(String::as_str)
    }

    /// Local tags currently pointing at a version
    pub fn tags_for(&self, product: &str, flavor: &str, version: &str) -> Vec<String> {
        self.assignments
            .iter()
            .filter(|((_, p, f), v)| p == product && f == flavor && v.as_str() == version)
            .map(|((tag, _, _), _)| tag.clone())
            .collect()
    }
}
