// src/main.rs

use anyhow::Result;
use clap::Parser;
use eups::RemoveOptions;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise -v raises the default
    let default_level = match cli.global.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let global = &cli.global;
    match cli.command {
        Commands::List {
            product,
            version,
            setup,
            directory,
        } => commands::cmd_list(global, product.as_deref(), version.as_deref(), setup, directory),

        Commands::Declare {
            product,
            version,
            root,
            table,
            table_content,
            stack,
            assign,
            current,
        } => commands::cmd_declare(
            global,
            commands::DeclareArgs {
                product: &product,
                version: &version,
                root: root.as_deref(),
                table: table.as_deref(),
                table_content: table_content.as_deref(),
                stack: stack.as_deref(),
                tag: assign.as_deref(),
                current,
            },
        ),

        Commands::Undeclare {
            product,
            version,
            unassign,
            stack,
        } => commands::cmd_undeclare(
            global,
            &product,
            version.as_deref(),
            unassign.as_deref(),
            stack.as_deref(),
        ),

        Commands::Tag { tag, product, version } => commands::cmd_tag(global, &tag, &product, &version),

        Commands::Untag { tag, product, version } => {
            commands::cmd_untag(global, &tag, &product, version.as_deref())
        }

        Commands::Uses {
            product,
            version,
            depth,
        } => commands::cmd_uses(global, &product, version.as_deref(), depth),

        Commands::Remove {
            product,
            version,
            recursive,
            no_check,
            interactive,
        } => commands::cmd_remove(
            global,
            &product,
            &version,
            RemoveOptions {
                recursive,
                check_recursive: !no_check,
                interactive,
            },
        ),

        Commands::Setup {
            product,
            version,
            root,
            just,
            setup_type,
        } => commands::cmd_setup(
            global,
            &product,
            version.as_deref(),
            root.as_deref(),
            just,
            setup_type.as_deref(),
        ),

        Commands::Unsetup { product, version, just } => {
            commands::cmd_unsetup(global, &product, version.as_deref(), just)
        }

        Commands::Flavor => commands::cmd_flavor(global),

        Commands::Path => commands::cmd_path(global),

        Commands::ClearCache { locks } => commands::cmd_clear_cache(global, locks),

        Commands::Completions { shell } => commands::cmd_completions(shell),
    }
}
