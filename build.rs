// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: product name
fn product_arg() -> Arg {
    Arg::new("product").required(true).help("Product name")
}

/// Common argument: version, tag or version expression
fn version_arg(required: bool) -> Arg {
    Arg::new("version")
        .required(required)
        .help("Version, tag or version expression")
}

/// Common argument: skip dependencies
fn just_arg() -> Arg {
    Arg::new("just")
        .short('j')
        .long("just")
        .action(ArgAction::SetTrue)
        .help("Only this product, not its dependencies")
}

fn flag(name: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(long)
        .global(true)
        .action(ArgAction::SetTrue)
        .help(help)
}

fn build_cli() -> Command {
    Command::new("eups")
        .version(env!("CARGO_PKG_VERSION"))
        .author("EUPS Contributors")
        .about("Manage multiple versions of software products and their environments")
        .subcommand_required(true)
        .arg(
            Arg::new("path")
                .short('Z')
                .long("path")
                .global(true)
                .help("Search path, colon separated (overrides EUPS_PATH)"),
        )
        .arg(
            Arg::new("flavor")
                .short('f')
                .long("flavor")
                .global(true)
                .help("Flavor to use (overrides EUPS_FLAVOR)"),
        )
        .arg(flag("force", "force", "Proceed past conflicts and re-apply set-up products").short('F'))
        .arg(flag("keep", "keep", "Keep already set-up dependencies unless a newer one is required").short('k'))
        .arg(flag("dry_run", "dry-run", "Show what would happen without changing anything").short('n'))
        .arg(flag("no_cache", "no-cache", "Read the product databases directly"))
        .arg(
            Arg::new("max_depth")
                .long("max-depth")
                .global(true)
                .value_parser(clap::value_parser!(usize))
                .help("Deepest dependency level to set up (0 = requested product only)"),
        )
        .arg(
            Arg::new("tags")
                .short('t')
                .long("tag")
                .global(true)
                .action(ArgAction::Append)
                .value_delimiter(',')
                .help("Preferred tags, most preferred first"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count)
                .help("More output (repeat for debug)"),
        )
        .subcommand(
            Command::new("list")
                .about("List declared products")
                .arg(Arg::new("product").help("Product name (shell wildcards allowed)"))
                .arg(Arg::new("version").help("Version (shell wildcards allowed)"))
                .arg(
                    Arg::new("setup")
                        .short('s')
                        .long("setup")
                        .action(ArgAction::SetTrue)
                        .help("Only products that are set up"),
                )
                .arg(
                    Arg::new("directory")
                        .short('d')
                        .long("directory")
                        .action(ArgAction::SetTrue)
                        .help("Show install directories"),
                ),
        )
        .subcommand(
            Command::new("declare")
                .about("Declare a product")
                .arg(product_arg())
                .arg(version_arg(true))
                .arg(Arg::new("root").short('r').long("root").help("Install directory, or \"none\""))
                .arg(Arg::new("table").short('m').long("table").help("Table file, or \"none\""))
                .arg(
                    Arg::new("table_content")
                        .long("table-content")
                        .conflicts_with("table")
                        .help("Read the table from this file and store it in the stack"),
                )
                .arg(Arg::new("stack").long("stack").help("Stack to declare into"))
                .arg(Arg::new("assign").long("assign").help("Tag to assign"))
                .arg(
                    Arg::new("current")
                        .short('c')
                        .long("current")
                        .action(ArgAction::SetTrue)
                        .help("Make this the current version"),
                ),
        )
        .subcommand(
            Command::new("undeclare")
                .about("Undeclare a product (or only unassign a tag)")
                .arg(product_arg())
                .arg(version_arg(false))
                .arg(Arg::new("unassign").long("unassign").help("Only unassign this tag"))
                .arg(Arg::new("stack").long("stack").help("Stack to undeclare from")),
        )
        .subcommand(
            Command::new("tag")
                .about("Assign a tag to a declared version")
                .arg(Arg::new("tag").required(true).help("Tag name"))
                .arg(product_arg())
                .arg(version_arg(true)),
        )
        .subcommand(
            Command::new("untag")
                .about("Unassign a tag")
                .arg(Arg::new("tag").required(true).help("Tag name"))
                .arg(product_arg())
                .arg(version_arg(false)),
        )
        .subcommand(
            Command::new("uses")
                .about("Show which products depend on a product")
                .arg(product_arg())
                .arg(version_arg(false))
                .arg(
                    Arg::new("depth")
                        .short('d')
                        .long("depth")
                        .default_value("9999")
                        .value_parser(clap::value_parser!(usize))
                        .help("Only dependers within this many hops"),
                ),
        )
        .subcommand(
            Command::new("remove")
                .about("Undeclare a product and delete its files")
                .arg(product_arg())
                .arg(version_arg(true))
                .arg(
                    Arg::new("recursive")
                        .short('R')
                        .long("recursive")
                        .action(ArgAction::SetTrue)
                        .help("Also remove its dependencies"),
                )
                .arg(
                    Arg::new("no_check")
                        .long("no-check")
                        .action(ArgAction::SetTrue)
                        .help("Skip the check for products that still need it"),
                )
                .arg(
                    Arg::new("interactive")
                        .short('i')
                        .long("interactive")
                        .action(ArgAction::SetTrue)
                        .help("Ask before removing each product"),
                ),
        )
        .subcommand(
            Command::new("setup")
                .about("Set up a product and print the environment changes")
                .arg(product_arg())
                .arg(version_arg(false))
                .arg(
                    Arg::new("root")
                        .short('r')
                        .long("root")
                        .conflicts_with("version")
                        .help("Set up an undeclared product from this directory"),
                )
                .arg(just_arg())
                .arg(
                    Arg::new("setup_type")
                        .long("setup-type")
                        .help("Select table entries for this setup type"),
                ),
        )
        .subcommand(
            Command::new("unsetup")
                .about("Unset up a product and print the environment changes")
                .arg(product_arg())
                .arg(version_arg(false))
                .arg(just_arg()),
        )
        .subcommand(Command::new("flavor").about("Print the active flavor"))
        .subcommand(Command::new("path").about("Print the search path"))
        .subcommand(
            Command::new("clear-cache")
                .about("Delete product caches (and stale locks)")
                .arg(
                    Arg::new("locks")
                        .long("locks")
                        .action(ArgAction::SetTrue)
                        .help("Also remove lock files"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell to generate completions for"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("eups.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
