// tests/resolver.rs

//! Product resolution across stacks: tags, newest, expressions, fallbacks.

mod common;

use common::{FLAVOR, Fixture, Table};
use eups::tags::{CURRENT, NEWEST};
use eups::{DeclareRequest, Eups, Error};

fn two_stacks() -> (Fixture, Eups) {
    let fixture = Fixture::new(2);
    let mut eups = fixture.eups();
    fixture.declare_tagged(&mut eups, 0, "afw", "1.0", CURRENT, &Table::new());
    fixture.declare_tagged(&mut eups, 1, "afw", "2.0", CURRENT, &Table::new());
    fixture.declare(&mut eups, 1, "afw", "1.5", &Table::new());
    (fixture, eups)
}

#[test]
fn test_tag_lookup_follows_path_order() {
    let (fixture, eups) = two_stacks();

    let product = eups.find_product("afw", Some(CURRENT), None, None).unwrap().unwrap();
    assert_eq!(product.version, "1.0");
    assert_eq!(product.stack.as_deref(), Some(fixture.stacks[0].as_path()));

    // Reversing the path flips the winner
    let reversed = vec![fixture.stacks[1].clone(), fixture.stacks[0].clone()];
    let product = eups
        .find_product("afw", Some(CURRENT), Some(reversed.as_slice()), None)
        .unwrap()
        .unwrap();
    assert_eq!(product.version, "2.0");
}

#[test]
fn test_newest_ignores_path_order() {
    let (fixture, eups) = two_stacks();

    let product = eups.find_product("afw", Some(NEWEST), None, None).unwrap().unwrap();
    assert_eq!(product.version, "2.0");

    let reversed = vec![fixture.stacks[1].clone(), fixture.stacks[0].clone()];
    let product = eups
        .find_product("afw", Some(NEWEST), Some(reversed.as_slice()), None)
        .unwrap()
        .unwrap();
    assert_eq!(product.version, "2.0");
}

#[test]
fn test_preferred_tags_when_no_version() {
    let (_fixture, mut eups) = two_stacks();
    assert_eq!(
        eups.find_product("afw", None, None, None).unwrap().unwrap().version,
        "1.0"
    );

    let dropped = eups.set_preferred_tags(&["bogus", NEWEST]);
    assert_eq!(dropped, vec!["bogus"]);
    assert_eq!(
        eups.find_product("afw", None, None, None).unwrap().unwrap().version,
        "2.0"
    );
}

#[test]
fn test_expression_selects_preferred_candidate() {
    let (_fixture, eups) = two_stacks();

    // 1.5 and 2.0 match; 2.0 carries "current"
    let product = eups.find_product("afw", Some(">= 1.5"), None, None).unwrap().unwrap();
    assert_eq!(product.version, "2.0");

    // Only 1.5 matches and carries no preferred tag
    let product = eups
        .find_product("afw", Some("== 1.5 || == 9.9"), None, None)
        .unwrap()
        .unwrap();
    assert_eq!(product.version, "1.5");

    let product = eups.find_product("afw", Some("< 2.0"), None, None).unwrap().unwrap();
    assert_eq!(product.version, "1.0");
}

#[test]
fn test_literal_version() {
    let (fixture, eups) = two_stacks();
    let product = eups.find_product("afw", Some("1.5"), None, None).unwrap().unwrap();
    assert_eq!(product.stack.as_deref(), Some(fixture.stacks[1].as_path()));
    assert!(eups.find_product("afw", Some("3.0"), None, None).unwrap().is_none());
    assert!(eups.get_product("afw", Some("3.0"), None).unwrap_err().is_not_found());
}

#[test]
fn test_malformed_expression_is_reported() {
    let (_fixture, eups) = two_stacks();
    let err = eups.find_product("afw", Some("= 1.0"), None, None).unwrap_err();
    assert!(matches!(err, Error::ParseError(_)));
}

#[test]
fn test_missing_stack_is_skipped() {
    let (fixture, eups) = two_stacks();
    let paths = vec![fixture.temp.path().join("gone"), fixture.stacks[1].clone()];
    let product = eups.find_product("afw", Some(CURRENT), Some(paths.as_slice()), None).unwrap().unwrap();
    assert_eq!(product.version, "2.0");
}

#[test]
fn test_flavor_fallback() {
    let fixture = Fixture::new(1);
    let dir = fixture.install(0, "doxygen", "1.8", &Table::new());

    let mut generic = Eups::new(fixture.config().with_flavor("generic")).unwrap();
    generic
        .declare(&DeclareRequest::new("doxygen", "1.8").with_dir(&dir))
        .unwrap();

    let eups = fixture.eups();
    assert!(eups.find_product("doxygen", Some("1.8"), None, None).unwrap().is_none());

    let product = eups
        .resolve_with_fallback("doxygen", Some("1.8"), None)
        .unwrap()
        .unwrap();
    assert_eq!(product.flavor, "generic");
    assert_ne!(product.flavor, FLAVOR);
}

#[test]
fn test_cache_and_database_agree() {
    let (fixture, eups) = two_stacks();
    let uncached = Eups::new(fixture.config().with_cache(false)).unwrap();

    for spec in [Some(CURRENT), Some(NEWEST), Some(">= 1.5"), None] {
        assert_eq!(
            eups.find_product("afw", spec, None, None).unwrap(),
            uncached.find_product("afw", spec, None, None).unwrap()
        );
    }
}
