// src/cli/mod.rs
//! CLI definitions for the eups product manager
//!
//! Argument parsing only; the command implementations live in the
//! `commands` module.
//!
//! - Queries: `list`, `uses`, `flavor`, `path`
//! - Declaration: `declare`, `undeclare`, `tag`, `untag`, `remove`
//! - Environment: `setup`, `unsetup`
//! - Housekeeping: `clear-cache`, `completions`

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "eups")]
#[command(author = "EUPS Contributors")]
#[command(version)]
#[command(about = "Manage multiple versions of software products and their environments", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Search path, colon separated (overrides EUPS_PATH)
    #[arg(short = 'Z', long, global = true)]
    pub path: Option<String>,

    /// Flavor to use (overrides EUPS_FLAVOR)
    #[arg(short, long, global = true)]
    pub flavor: Option<String>,

    /// Proceed past conflicts and re-apply set-up products
    #[arg(short = 'F', long, global = true)]
    pub force: bool,

    /// Keep already set-up dependencies unless a newer one is required
    #[arg(short, long, global = true)]
    pub keep: bool,

    /// Show what would happen without changing anything
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Read the product databases directly
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Deepest dependency level to set up (0 = requested product only)
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// Preferred tags, most preferred first
    #[arg(short, long = "tag", global = true, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// More output (repeat for debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List declared products
    List {
        /// Product name (shell wildcards allowed)
        product: Option<String>,

        /// Version (shell wildcards allowed)
        version: Option<String>,

        /// Only products that are set up
        #[arg(short, long)]
        setup: bool,

        /// Show install directories
        #[arg(short, long)]
        directory: bool,
    },

    /// Declare a product
    Declare {
        product: String,
        version: String,

        /// Install directory, or "none"
        #[arg(short = 'r', long)]
        root: Option<String>,

        /// Table file, or "none"
        #[arg(short = 'm', long)]
        table: Option<String>,

        /// Read the table from this file and store it in the stack
        #[arg(long, conflicts_with = "table")]
        table_content: Option<PathBuf>,

        /// Stack to declare into
        #[arg(long)]
        stack: Option<PathBuf>,

        /// Tag to assign
        #[arg(long = "assign")]
        assign: Option<String>,

        /// Make this the current version
        #[arg(short, long)]
        current: bool,
    },

    /// Undeclare a product (or only unassign a tag)
    Undeclare {
        product: String,
        version: Option<String>,

        /// Only unassign this tag
        #[arg(long = "unassign")]
        unassign: Option<String>,

        /// Stack to undeclare from
        #[arg(long)]
        stack: Option<PathBuf>,
    },

    /// Assign a tag to a declared version
    Tag {
        tag: String,
        product: String,
        version: String,
    },

    /// Unassign a tag
    Untag {
        tag: String,
        product: String,
        version: Option<String>,
    },

    /// Show which products depend on a product
    Uses {
        product: String,
        version: Option<String>,

        /// Only dependers within this many hops
        #[arg(short, long, default_value = "9999")]
        depth: usize,
    },

    /// Undeclare a product and delete its files
    Remove {
        product: String,
        version: String,

        /// Also remove its dependencies
        #[arg(short = 'R', long)]
        recursive: bool,

        /// Skip the check for products that still need it
        #[arg(long)]
        no_check: bool,

        /// Ask before removing each product
        #[arg(short, long)]
        interactive: bool,
    },

    /// Set up a product and print the environment changes
    Setup {
        product: String,
        version: Option<String>,

        /// Set up an undeclared product from this directory
        #[arg(short = 'r', long, conflicts_with = "version")]
        root: Option<PathBuf>,

        /// Only this product, not its dependencies
        #[arg(short = 'j', long)]
        just: bool,

        /// Select table entries for this setup type
        #[arg(long)]
        setup_type: Option<String>,
    },

    /// Unset up a product and print the environment changes
    Unsetup {
        product: String,
        version: Option<String>,

        /// Only this product, not its dependencies
        #[arg(short = 'j', long)]
        just: bool,
    },

    /// Print the active flavor
    Flavor,

    /// Print the search path
    Path,

    /// Delete product caches (and stale locks)
    ClearCache {
        /// Also remove lock files
        #[arg(long)]
        locks: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
