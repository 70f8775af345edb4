// src/commands/query.rs
//! Read-only commands: list, uses, flavor, path

use super::{load_config, open_session};
use crate::cli::GlobalArgs;
use anyhow::Result;
use eups::{DependencyGraph, EnvironmentContext, ListFilter};

/// List declared products, marking those set up
pub fn cmd_list(
    global: &GlobalArgs,
    product: Option<&str>,
    version: Option<&str>,
    setup_only: bool,
    show_dir: bool,
) -> Result<()> {
    let eups = open_session(global)?;
    let env = EnvironmentContext::from_process();

    let filter = ListFilter {
        name: product.map(str::to_string),
        version: version.map(str::to_string),
        tags: global.tags.clone(),
        setup_only,
    };
    let listed = eups.list_products(&env, &filter)?;

    if listed.is_empty() {
        if product.is_some() {
            println!("No products found.");
        }
        return Ok(());
    }

    for entry in listed {
        let product = &entry.product;
        let mut tags: Vec<&str> = product.tags.iter().map(String::as_str).collect();
        if entry.is_setup {
            tags.push("setup");
        }

        if show_dir {
            println!("{:<20} {:<20} {}", product.name, product.version, product.dir_display());
        } else {
            println!("   {:<20} {:<20} {}", product.name, product.version, tags.join(" "));
        }
    }
    Ok(())
}

/// Show the products that need a product
pub fn cmd_uses(global: &GlobalArgs, product: &str, version: Option<&str>, depth: usize) -> Result<()> {
    let eups = open_session(global)?;
    let graph = DependencyGraph::build(&eups)?;
    let users = graph.users(product, version, depth);

    if users.is_empty() {
        println!("No products use {} {}", product, version.unwrap_or(""));
        return Ok(());
    }

    for user in users {
        let optional = if user.optional { " (optional)" } else { "" };
        println!(
            "{:<20} {:<20} {}{}{}",
            user.name,
            user.version,
            "  ".repeat(user.depth.saturating_sub(1)),
            user.requested.as_deref().unwrap_or(""),
            optional
        );
    }
    Ok(())
}

pub fn cmd_flavor(global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    println!("{}", config.flavor);
    Ok(())
}

pub fn cmd_path(global: &GlobalArgs) -> Result<()> {
    let config = load_config(global)?;
    for stack in &config.path {
        println!("{}", stack.display());
    }
    Ok(())
}
