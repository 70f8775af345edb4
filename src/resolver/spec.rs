// src/resolver/spec.rs

//! Classification of requested versions

use crate::error::Result;
use crate::tags::TagRegistry;
use crate::version::VersionExpr;
use std::fmt;

/// What the caller asked for, classified once up front
///
/// A string that parses as a relational expression is an expression even
/// if a tag of the same name exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// Nothing requested: walk the preferred-tag list
    Preferred,
    Expression(VersionExpr),
    Tag(String),
    Exact(String),
}

impl VersionSpec {
    pub fn classify(spec: Option<&str>, tags: &TagRegistry) -> Result<Self> {
        let Some(spec) = spec.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(VersionSpec::Preferred);
        };

        if VersionExpr::is_expression(spec)? {
            return Ok(VersionSpec::Expression(VersionExpr::parse(spec)?));
        }
        if tags.is_recognized(spec) {
            return Ok(VersionSpec::Tag(spec.to_string()));
        }
        Ok(VersionSpec::Exact(spec.to_string()))
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Preferred => write!(f, "(preferred)"),
            VersionSpec::Expression(expr) => write!(f, "{expr}"),
            VersionSpec::Tag(tag) => write!(f, "{tag}"),
            VersionSpec::Exact(version) => write!(f, "{version}"),
        }
    }
}
