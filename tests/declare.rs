// tests/declare.rs

//! Declaring, undeclaring and removing products, the reverse dependency
//! graph and manifests.

mod common;

use common::{FLAVOR, Fixture, Table};
use eups::tags::CURRENT;
use eups::{
    DeclareRequest, DependencyGraph, EnvironmentContext, Error, Eups, Manifest, Product,
    RemoveOptions, RemovePrompt, RemoveReply, Result, SetupOptions, TableRef,
};
use std::collections::VecDeque;

/// Replies from a script, then quits
struct Scripted(VecDeque<RemoveReply>);

impl RemovePrompt for Scripted {
    fn ask(&mut self, _product: &Product, _default: RemoveReply) -> Result<RemoveReply> {
        Ok(self.0.pop_front().unwrap_or(RemoveReply::Quit))
    }
}

fn no_prompt() -> Scripted {
    Scripted(VecDeque::new())
}

/// `app` requires `lib`, which requires `base`
fn chain() -> (Fixture, Eups) {
    let fixture = Fixture::new(1);
    let mut eups = fixture.eups();
    fixture.declare(&mut eups, 0, "base", "1.0", &Table::new());
    fixture.declare(&mut eups, 0, "lib", "1.0", &Table::new().requires("base", None));
    fixture.declare(&mut eups, 0, "app", "1.0", &Table::new().requires("lib", Some("1.0")));
    (fixture, eups)
}

#[test]
fn test_declared_product_reads_back() {
    let fixture = Fixture::new(1);
    let mut eups = fixture.eups();
    let declared = fixture.declare(&mut eups, 0, "afw", "1.0", &Table::new());

    let found = eups.get_product("afw", Some("1.0"), None).unwrap();
    assert_eq!(found.dir, declared.dir);
    assert_eq!(found.table, declared.table);
    assert_eq!(found.flavor, FLAVOR);
    assert_eq!(found.stack.as_deref(), Some(fixture.stacks[0].as_path()));
    assert!(found.tags.is_empty());

    // A fresh session sees the same declaration
    let fresh = fixture.eups();
    assert_eq!(fresh.get_product("afw", Some("1.0"), None).unwrap().dir, declared.dir);
}

#[test]
fn test_redeclare_conflict_needs_force() {
    let fixture = Fixture::new(1);
    let mut eups = fixture.eups();
    fixture.declare(&mut eups, 0, "afw", "1.0", &Table::new());

    // Identical redeclaration with a tag just tags
    fixture.declare_tagged(&mut eups, 0, "afw", "1.0", CURRENT, &Table::new());
    let found = eups.get_product("afw", Some(CURRENT), None).unwrap();
    assert_eq!(found.version, "1.0");

    let elsewhere = fixture.install(0, "afw", "1.0-rebuilt", &Table::new());
    let request = DeclareRequest::new("afw", "1.0")
        .with_dir(&elsewhere)
        .with_stack(&fixture.stacks[0]);

    let err = eups.declare(&request).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    eups.set_force(true);
    eups.declare(&request).unwrap();
    let found = eups.get_product("afw", Some("1.0"), None).unwrap();
    assert_eq!(found.dir.as_deref(), Some(elsewhere.as_path()));
}

#[test]
fn test_declare_with_table_content() {
    let fixture = Fixture::new(1);
    let mut eups = fixture.eups();
    let dir = fixture.install(0, "afw", "2.0", &Table::new());
    let content = Table::new().to_toml("afw");

    let product = eups
        .declare(
            &DeclareRequest::new("afw", "2.0")
                .with_dir(&dir)
                .with_table(TableRef::Content(content.clone())),
        )
        .unwrap();

    let table = product.table.unwrap();
    assert!(table.ends_with("2.0.table"));
    assert_eq!(std::fs::read_to_string(table).unwrap(), content);
}

#[test]
fn test_declare_rejects_bad_input() {
    let fixture = Fixture::new(1);
    let mut eups = fixture.eups();

    let err = eups
        .declare(&DeclareRequest::new("bad name", "1.0").with_dir(fixture.temp.path()))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidName(_)));

    // Nothing at <stack>/<flavor>/ghost/1.0 to infer a directory from
    assert!(eups.declare(&DeclareRequest::new("ghost", "1.0")).is_err());
}

#[test]
fn test_undeclare() {
    let fixture = Fixture::new(1);
    let mut eups = fixture.eups();
    fixture.declare(&mut eups, 0, "afw", "1.0", &Table::new());
    fixture.declare(&mut eups, 0, "afw", "2.0", &Table::new());
    let env = EnvironmentContext::new();

    let err = eups.undeclare(&env, "afw", None, None, None).unwrap_err();
    match err {
        Error::AmbiguousVersion { product, versions } => {
            assert_eq!(product, "afw");
            assert_eq!(versions.len(), 2);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(eups.undeclare(&env, "afw", Some("1.0"), None, None).unwrap());
    assert!(eups.find_product("afw", Some("1.0"), None, None).unwrap().is_none());

    // Only one version left, so none needs naming
    assert!(eups.undeclare(&env, "afw", None, None, None).unwrap());
    assert!(eups.undeclare(&env, "afw", None, None, None).unwrap_err().is_not_found());
}

#[test]
fn test_undeclare_setup_product_needs_force() {
    let fixture = Fixture::new(1);
    let mut eups = fixture.eups();
    fixture.declare(&mut eups, 0, "afw", "1.0", &Table::new());

    let mut env = EnvironmentContext::new();
    eups.setup(&mut env, "afw", Some("1.0"), &SetupOptions::default())
        .unwrap();

    let err = eups.undeclare(&env, "afw", Some("1.0"), None, None).unwrap_err();
    assert!(matches!(err, Error::SetupInUse(_)));

    eups.set_force(true);
    assert!(eups.undeclare(&env, "afw", Some("1.0"), None, None).unwrap());
}

#[test]
fn test_undeclare_with_tag_only_untags() {
    let fixture = Fixture::new(1);
    let mut eups = fixture.eups();
    fixture.declare_tagged(&mut eups, 0, "afw", "1.0", CURRENT, &Table::new());
    let env = EnvironmentContext::new();

    assert!(eups.undeclare(&env, "afw", Some("1.0"), Some(CURRENT), None).unwrap());
    assert!(eups.find_product("afw", Some(CURRENT), None, None).unwrap().is_none());
    assert!(eups.find_product("afw", Some("1.0"), None, None).unwrap().is_some());

    // Nothing left to unassign
    assert!(!eups.undeclare(&env, "afw", Some("1.0"), Some(CURRENT), None).unwrap());
}

#[test]
fn test_uses_graph() {
    let (_fixture, eups) = chain();
    let graph = DependencyGraph::build(&eups).unwrap();

    let users = graph.users("base", None, 9999);
    let names: Vec<(&str, usize)> = users.iter().map(|u| (u.name.as_str(), u.depth)).collect();
    assert_eq!(names, vec![("app", 2), ("lib", 1)]);

    let direct = graph.users("base", Some("1.0"), 1);
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].name, "lib");

    let lib_users = graph.users("lib", None, 9999);
    assert_eq!(lib_users[0].requested.as_deref(), Some("1.0"));
    assert!(graph.users("app", None, 9999).is_empty());
}

#[test]
fn test_remove_refuses_used_product() {
    let (fixture, mut eups) = chain();
    let env = EnvironmentContext::new();
    let options = RemoveOptions {
        check_recursive: true,
        ..Default::default()
    };

    let err = eups
        .remove(&env, "base", "1.0", options, &mut no_prompt())
        .unwrap_err();
    assert!(matches!(err, Error::SetupInUse(_)));
    assert!(fixture.stacks[0].join("base/1.0").exists());

    eups.set_force(true);
    let removed = eups
        .remove(&env, "base", "1.0", options, &mut no_prompt())
        .unwrap();
    assert_eq!(removed.len(), 1);
    assert!(!fixture.stacks[0].join("base/1.0").exists());
    assert!(eups.find_product("base", Some("1.0"), None, None).unwrap().is_none());
}

#[test]
fn test_remove_recursive() {
    let (fixture, mut eups) = chain();
    let env = EnvironmentContext::new();
    let options = RemoveOptions {
        recursive: true,
        check_recursive: true,
        interactive: false,
    };

    let removed = eups
        .remove(&env, "app", "1.0", options, &mut no_prompt())
        .unwrap();
    let names: Vec<&str> = removed.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["app", "lib", "base"]);

    for name in ["app", "lib", "base"] {
        assert!(!fixture.stacks[0].join(name).join("1.0").exists());
    }
    assert!(eups.list_products(&env, &Default::default()).unwrap().is_empty());
}

#[test]
fn test_remove_interactive() {
    let (fixture, mut eups) = chain();
    let env = EnvironmentContext::new();
    let options = RemoveOptions {
        recursive: true,
        check_recursive: false,
        interactive: true,
    };

    // Skip app, take lib, then quit before base
    let mut prompt = Scripted(VecDeque::from([RemoveReply::No, RemoveReply::Yes]));
    let removed = eups.remove(&env, "app", "1.0", options, &mut prompt).unwrap();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].name, "lib");
    assert!(fixture.stacks[0].join("app/1.0").exists());
    assert!(fixture.stacks[0].join("base/1.0").exists());
}

#[test]
fn test_manifest_lists_dependencies_first() {
    let (fixture, eups) = chain();
    let graph = DependencyGraph::build(&eups).unwrap();
    let products: Vec<Product> = ["lib", "app", "base"]
        .iter()
        .map(|name| eups.get_product(name, Some("1.0"), None).unwrap())
        .collect();

    let manifest = Manifest::from_products("app", "1.0", &products, &graph, "generic");
    let order: Vec<&str> = manifest.entries.iter().map(|e| e.product.as_str()).collect();
    assert_eq!(order, vec!["base", "lib", "app"]);
    assert_eq!(manifest.entries[0].table_file, "base.table");

    let path = fixture.temp.path().join(manifest.file_name());
    manifest.write(&path).unwrap();
    assert_eq!(Manifest::read(&path).unwrap(), manifest);
}
