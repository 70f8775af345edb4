// src/flavor/mod.rs
//! Host flavor detection and flavor fallback chains
//!
//! A flavor names the platform a product was built for (`Linux64`,
//! `DarwinX86`, ...). When a product is missing for the active flavor the
//! setup engine retries an ordered list of fallback flavors, ending in the
//! platform-independent `generic`.

use std::collections::BTreeMap;

/// Flavor used for platform-independent products
pub const GENERIC: &str = "generic";

/// Detect the flavor of the running host
pub fn detect() -> String {
    flavor_for(std::env::consts::OS, std::env::consts::ARCH)
}

/// Map an OS/architecture pair onto a flavor name
pub fn flavor_for(os: &str, arch: &str) -> String {
    match (os, arch) {
        ("linux", "x86_64") => "Linux64".to_string(),
        ("linux", "aarch64") => "LinuxARM64".to_string(),
        ("linux", _) => "Linux".to_string(),
        ("macos", "x86_64") => "DarwinX86".to_string(),
        ("macos", "aarch64") => "DarwinARM64".to_string(),
        ("macos", _) => "Darwin".to_string(),
        ("solaris", _) => "SunOS".to_string(),
        (os, arch) => format!("{os}-{arch}"),
    }
}

/// Built-in fallback chains, keyed by flavor
pub fn default_fallbacks() -> BTreeMap<String, Vec<String>> {
    let table: &[(&str, &[&str])] = &[
        ("Linux64", &["Linux", GENERIC]),
        ("LinuxARM64", &["Linux", GENERIC]),
        ("Linux", &[GENERIC]),
        ("DarwinX86", &["Darwin", GENERIC]),
        ("DarwinARM64", &["Darwin", GENERIC]),
        ("Darwin", &[GENERIC]),
    ];

    table
        .iter()
        .map(|(flavor, chain)| {
            (
                flavor.to_string(),
                chain.iter().map(|f| f.to_string()).collect(),
            )
        })
        .collect()
}

/// Ordered fallbacks for `flavor`, never including `flavor` itself
///
/// Flavors without an explicit chain fall back to `generic` only.
pub fn fallbacks(flavor: &str, table: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    let chain = match table.get(flavor) {
        Some(chain) => chain.clone(),
        None => vec![GENERIC.to_string()],
    };

    chain.into_iter().filter(|f| f != flavor).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flavor_for_known_hosts() {
        assert_eq!(flavor_for("linux", "x86_64"), "Linux64");
        assert_eq!(flavor_for("linux", "x86"), "Linux");
        assert_eq!(flavor_for("macos", "x86_64"), "DarwinX86");
        assert_eq!(flavor_for("freebsd", "x86_64"), "freebsd-x86_64");
    }

    #[test]
    fn test_fallbacks_from_table() {
        let table = default_fallbacks();
        assert_eq!(fallbacks("Linux64", &table), vec!["Linux", "generic"]);
        assert_eq!(fallbacks("Linux", &table), vec!["generic"]);
    }

    #[test]
    fn test_fallbacks_unknown_flavor() {
        let table = default_fallbacks();
        assert_eq!(fallbacks("Plan9", &table), vec!["generic"]);
        assert!(fallbacks(GENERIC, &table).is_empty());
    }
}
