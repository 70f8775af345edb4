// src/commands/mod.rs
//! Command handlers for the eups CLI

mod declare;
mod query;
mod setup;
mod system;

pub use declare::{DeclareArgs, cmd_declare, cmd_remove, cmd_tag, cmd_undeclare, cmd_untag};
pub use query::{cmd_flavor, cmd_list, cmd_path, cmd_uses};
pub use setup::{cmd_setup, cmd_unsetup};
pub use system::{cmd_clear_cache, cmd_completions};

use crate::cli::GlobalArgs;
use anyhow::{Context, Result};
use eups::config::split_path;
use eups::{Config, Eups, SetupOptions};

/// Configuration from the environment with command-line overrides applied
pub fn load_config(global: &GlobalArgs) -> Result<Config> {
    let mut config = Config::from_env().context("Failed to load configuration")?;

    if let Some(path) = &global.path {
        config.path = split_path(path);
    }
    if let Some(flavor) = &global.flavor {
        config.flavor = flavor.clone();
    }
    if !global.tags.is_empty() {
        config.preferred_tags = global.tags.clone();
    }
    if global.max_depth.is_some() {
        config.max_depth = global.max_depth;
    }

    config.force |= global.force;
    config.keep |= global.keep;
    config.dry_run |= global.dry_run;
    config.use_cache &= !global.no_cache;
    Ok(config)
}

/// Open a session on the configured search path
pub fn open_session(global: &GlobalArgs) -> Result<Eups> {
    let config = load_config(global)?;
    if config.path.is_empty() {
        anyhow::bail!("No search path; set EUPS_PATH or pass --path");
    }
    Eups::new(config).context("Failed to open product stacks")
}

/// Setup policies for this invocation
fn setup_options(eups: &Eups) -> SetupOptions {
    SetupOptions::from_config(eups.config())
}
