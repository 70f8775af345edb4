// src/commands/declare.rs
//! Declaration commands: declare, undeclare, tag, untag, remove

use super::open_session;
use crate::cli::GlobalArgs;
use anyhow::{Context, Result};
use eups::product::NONE;
use eups::tags::CURRENT;
use eups::{DeclareRequest, EnvironmentContext, RemoveOptions, StdinPrompt, TableRef};
use std::path::{Path, PathBuf};

/// Arguments of `eups declare`
pub struct DeclareArgs<'a> {
    pub product: &'a str,
    pub version: &'a str,
    pub root: Option<&'a str>,
    pub table: Option<&'a str>,
    pub table_content: Option<&'a Path>,
    pub stack: Option<&'a Path>,
    pub tag: Option<&'a str>,
    pub current: bool,
}

pub fn cmd_declare(global: &GlobalArgs, args: DeclareArgs<'_>) -> Result<()> {
    let mut eups = open_session(global)?;

    let mut request = DeclareRequest::new(args.product, args.version);
    request.dir = args.root.map(str::to_string);
    request.stack = args.stack.map(Path::to_path_buf);
    request.tag = args
        .tag
        .map(str::to_string)
        .or_else(|| args.current.then(|| CURRENT.to_string()));
    request.table = match (args.table, args.table_content) {
        (_, Some(file)) => Some(TableRef::Content(
            std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read table {}", file.display()))?,
        )),
        (Some(NONE), None) => Some(TableRef::None),
        (Some(table), None) => Some(TableRef::Path(PathBuf::from(table))),
        (None, None) => None,
    };

    let product = eups
        .declare(&request)
        .with_context(|| format!("Failed to declare {} {}", args.product, args.version))?;
    if !global.dry_run
        && let Some(stack) = &product.stack
    {
        println!("Declared {} {} in {}", product.name, product.version, stack.display());
    }
    Ok(())
}

pub fn cmd_undeclare(
    global: &GlobalArgs,
    product: &str,
    version: Option<&str>,
    tag: Option<&str>,
    stack: Option<&Path>,
) -> Result<()> {
    let mut eups = open_session(global)?;
    let env = EnvironmentContext::from_process();

    if !eups.undeclare(&env, product, version, tag, stack)? {
        println!("Nothing to undeclare for {} {}", product, version.unwrap_or(""));
    }
    Ok(())
}

pub fn cmd_tag(global: &GlobalArgs, tag: &str, product: &str, version: &str) -> Result<()> {
    let mut eups = open_session(global)?;
    eups.assign_tag(tag, product, version, None)
        .with_context(|| format!("Failed to tag {product} {version} {tag}"))?;
    Ok(())
}

pub fn cmd_untag(global: &GlobalArgs, tag: &str, product: &str, version: Option<&str>) -> Result<()> {
    let mut eups = open_session(global)?;
    if !eups.unassign_tag(tag, product, version, None)? {
        println!("Tag {tag} is not assigned to {product}");
    }
    Ok(())
}

pub fn cmd_remove(global: &GlobalArgs, product: &str, version: &str, options: RemoveOptions) -> Result<()> {
    let mut eups = open_session(global)?;
    let env = EnvironmentContext::from_process();

    let removed = eups.remove(&env, product, version, options, &mut StdinPrompt)?;
    for product in removed {
        println!("Removed {} {}", product.name, product.version);
    }
    Ok(())
}
