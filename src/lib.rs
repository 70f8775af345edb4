// src/lib.rs

//! EUPS: a multi-version software product manager
//!
//! Tracks installed versions of named products across stacked product
//! databases, resolves which version to use from version constraints and
//! tags, and moves an environment between configurations by running each
//! product's table actions.
//!
//! # Architecture
//!
//! - Stacks: each search-path entry holds a SQLite product database under
//!   `ups_db/`, mirrored by advisory per-flavor JSON caches
//! - Resolution: version expressions, tags and preferred-tag order, first
//!   stack on the path wins
//! - Setup: a recursive walk over table actions, memoized below the top
//!   level, applied to an explicit [`EnvironmentContext`]
//! - Declaration: declare, tag, undeclare and remove with conflict and
//!   reverse-dependency checks

pub mod config;
pub mod db;
pub mod declare;
pub mod env;
mod error;
pub mod eups;
pub mod flavor;
pub mod manifest;
pub mod product;
pub mod resolver;
pub mod setup;
pub mod store;
pub mod table;
pub mod tags;
pub mod uses;
pub mod version;

pub use config::Config;
pub use declare::{DeclareRequest, RemoveOptions, RemovePrompt, RemoveReply, StdinPrompt, TableRef};
pub use env::{EnvChange, EnvironmentContext, SetupMarker};
pub use error::{Error, Result};
pub use eups::{Dependency, Eups, ListFilter, ListedProduct};
pub use manifest::{Manifest, ManifestEntry};
pub use product::{Product, ProductId, Stack};
pub use resolver::{Resolver, VersionSpec};
pub use setup::{Direction, SetupEngine, SetupFailure, SetupOptions, SetupOutcome, SetupReport};
pub use store::{ProductStack, ProductStore};
pub use table::{Action, TableEntry, TableSource, TomlTables};
pub use tags::{LocalTags, Tag, TagRegistry, TagScope};
pub use uses::{DependencyGraph, User};
pub use version::VersionExpr;
