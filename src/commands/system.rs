// src/commands/system.rs
//! Housekeeping commands: clear-cache, completions

use super::open_session;
use crate::cli::{Cli, GlobalArgs};
use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use tracing::info;

pub fn cmd_clear_cache(global: &GlobalArgs, locks: bool) -> Result<()> {
    let mut eups = open_session(global)?;

    let caches = eups.clear_cache()?;
    info!("Removed {} cache files", caches);
    println!("Removed {caches} cache file(s)");

    if locks {
        let removed = eups.clear_locks()?;
        println!("Removed {removed} lock(s)");
    }
    Ok(())
}

pub fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "eups", &mut std::io::stdout());
    Ok(())
}
