// src/version/mod.rs

//! Version ordering and relational version expressions
//!
//! Versions are opaque strings ordered by splitting them on `.` and `_` and
//! comparing component by component, numerically when both sides are
//! integers and lexically otherwise. A trailing modifier refines the order:
//!
//! - `VV-EE` (or `VVmEE` with integer `EE`) is a pre-release and sorts
//!   *before* `VV`, so `1.10.0-rc2 < 1.10.0`
//! - `VV+FF` (or `VVpFF` with integer `FF`) is a patch and sorts *after*
//!   `VV`, so `1.10.0+hack1 > 1.10.0`
//!
//! Two versions whose first components differ in kind (numeric vs.
//! non-numeric) have no defined order; [`compare`] reports `None` for them.
//!
//! Expressions combine `<`, `<=`, `==`, `>=`, `>` terms with `||` (or the
//! word `or`); a bare version implies `==`.

use crate::error::{Error, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

/// CVS-style modifiers: `1.2m3` (pre-release) and `1.2p3` (patch)
static CVS_MODIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*\d)([mp])(\d+)$").unwrap());

/// Characters allowed in a version literal inside an expression
static VERSION_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+.:/\w]+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModifierKind {
    Pre,
    Patch,
}

#[derive(Debug)]
struct Modifier<'a> {
    kind: ModifierKind,
    value: &'a str,
}

#[derive(Debug)]
struct ParsedVersion<'a> {
    components: Vec<&'a str>,
    modifier: Option<Modifier<'a>>,
}

impl<'a> ParsedVersion<'a> {
    fn parse(version: &'a str) -> Self {
        let (core, modifier) = if let Some(pos) = version.find(['-', '+']) {
            let kind = if version[pos..].starts_with('-') {
                ModifierKind::Pre
            } else {
                ModifierKind::Patch
            };
            (
                &version[..pos],
                Some(Modifier {
                    kind,
                    value: &version[pos + 1..],
                }),
            )
        } else if let Some(caps) = CVS_MODIFIER.captures(version) {
            let core = caps.get(1).map_or("", |m| m.as_str());
            let kind = if &caps[2] == "m" {
                ModifierKind::Pre
            } else {
                ModifierKind::Patch
            };
            let value = caps.get(3).map_or("", |m| m.as_str());
            (core, Some(Modifier { kind, value }))
        } else {
            (version, None)
        };

        Self {
            components: core.split(['.', '_']).collect(),
            modifier,
        }
    }
}

fn is_numeric(component: &str) -> bool {
    !component.is_empty() && component.bytes().all(|b| b.is_ascii_digit())
}

fn compare_component(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) if is_numeric(a) && is_numeric(b) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

fn compare_modifiers(a: Option<&Modifier<'_>>, b: Option<&Modifier<'_>>) -> Ordering {
    use ModifierKind::{Patch, Pre};

    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(m), None) => match m.kind {
            Pre => Ordering::Less,
            Patch => Ordering::Greater,
        },
        (None, Some(m)) => match m.kind {
            Pre => Ordering::Greater,
            Patch => Ordering::Less,
        },
        (Some(x), Some(y)) => match (x.kind, y.kind) {
            (Pre, Patch) => Ordering::Less,
            (Patch, Pre) => Ordering::Greater,
            _ => compare_component(x.value, y.value),
        },
    }
}

/// Compare two version strings
///
/// Returns `None` when the versions are incomparable, i.e. their leading
/// components differ in kind (`"1.0"` vs `"v1.0"`).
pub fn compare(v1: &str, v2: &str) -> Option<Ordering> {
    let a = ParsedVersion::parse(v1);
    let b = ParsedVersion::parse(v2);

    let first_a = a.components.first().copied().unwrap_or("");
    let first_b = b.components.first().copied().unwrap_or("");
    if is_numeric(first_a) != is_numeric(first_b) {
        return None;
    }

    for (x, y) in a.components.iter().zip(b.components.iter()) {
        match compare_component(x, y) {
            Ordering::Equal => {}
            ord => return Some(ord),
        }
    }

    // A strict prefix sorts first: 1.2 < 1.2.0
    match a.components.len().cmp(&b.components.len()) {
        Ordering::Equal => {}
        ord => return Some(ord),
    }

    Some(compare_modifiers(a.modifier.as_ref(), b.modifier.as_ref()))
}

/// Total order for sorting: incomparable pairs fall back to plain string order
pub fn sort_order(v1: &str, v2: &str) -> Ordering {
    compare(v1, v2).unwrap_or_else(|| v1.cmp(v2))
}

/// True if `candidate` is strictly newer than `current`
pub fn is_newer(candidate: &str, current: &str) -> bool {
    compare(candidate, current) == Some(Ordering::Greater)
}

/// Relational operators permitted in version expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl RelOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Eq => "==",
            RelOp::Ge => ">=",
            RelOp::Gt => ">",
        }
    }

    /// Apply the operator to an ordering; no ordering never satisfies
    fn holds(&self, ord: Option<Ordering>) -> bool {
        let Some(ord) = ord else {
            return false;
        };
        match self {
            RelOp::Lt => ord == Ordering::Less,
            RelOp::Le => ord != Ordering::Greater,
            RelOp::Eq => ord == Ordering::Equal,
            RelOp::Ge => ord != Ordering::Less,
            RelOp::Gt => ord == Ordering::Greater,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Op(RelOp),
    Or,
    Literal(&'a str),
}

fn tokenize(expr: &str) -> Result<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut rest = expr.trim_start();

    while !rest.is_empty() {
        let (token, len) = if rest.starts_with("||") {
            (Token::Or, 2)
        } else if rest.starts_with("<=") {
            (Token::Op(RelOp::Le), 2)
        } else if rest.starts_with(">=") {
            (Token::Op(RelOp::Ge), 2)
        } else if rest.starts_with("==") {
            (Token::Op(RelOp::Eq), 2)
        } else if rest.starts_with('<') {
            (Token::Op(RelOp::Lt), 1)
        } else if rest.starts_with('>') {
            (Token::Op(RelOp::Gt), 1)
        } else if rest.starts_with('=') {
            return Err(Error::ParseError(format!(
                "Bad expr syntax: {expr}; did you mean '=='?"
            )));
        } else {
            let end = rest
                .find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '=' | '|'))
                .unwrap_or(rest.len());
            if end == 0 {
                return Err(Error::ParseError(format!(
                    "Unexpected operator {} in \"{expr}\"",
                    &rest[..1]
                )));
            }
            let word = &rest[..end];
            if word == "or" {
                (Token::Or, end)
            } else if VERSION_LITERAL.is_match(word) {
                (Token::Literal(word), end)
            } else {
                return Err(Error::ParseError(format!(
                    "Unexpected token {word} in \"{expr}\""
                )));
            }
        };
        tokens.push(token);
        rest = rest[len..].trim_start();
    }

    Ok(tokens)
}

/// A disjunction of relational version terms, e.g. `>= 1.0 || == 3.0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionExpr {
    terms: Vec<(RelOp, String)>,
}

impl VersionExpr {
    /// Does this string look like a relational expression rather than a
    /// literal version or tag?
    ///
    /// A leading bare `=` is rejected instead of being guessed at.
    pub fn is_expression(spec: &str) -> Result<bool> {
        let trimmed = spec.trim_start();
        if trimmed.starts_with('=') && !trimmed.starts_with("==") {
            return Err(Error::ParseError(format!(
                "Bad expr syntax: {spec}; did you mean '=='?"
            )));
        }
        Ok(spec.contains('<') || spec.contains('>') || spec.contains("==") || spec.contains("||"))
    }

    /// Parse an expression; terms must be joined by `||` or `or`
    pub fn parse(expr: &str) -> Result<Self> {
        let mut terms = Vec::new();
        let mut tokens = tokenize(expr)?.into_iter().peekable();
        let mut expect_term = true;

        while let Some(token) = tokens.next() {
            match token {
                Token::Or if !expect_term => expect_term = true,
                Token::Or => {
                    return Err(Error::ParseError(format!(
                        "Unexpected || in \"{expr}\""
                    )));
                }
                Token::Op(_) | Token::Literal(_) if !expect_term => {
                    return Err(Error::ParseError(format!(
                        "Expected logical operator || in \"{expr}\""
                    )));
                }
                Token::Op(op) => match tokens.next() {
                    Some(Token::Literal(version)) => {
                        terms.push((op, version.to_string()));
                        expect_term = false;
                    }
                    _ => {
                        return Err(Error::ParseError(format!(
                            "Missing version after {} in \"{expr}\"",
                            op.as_str()
                        )));
                    }
                },
                Token::Literal(version) => {
                    terms.push((RelOp::Eq, version.to_string()));
                    expect_term = false;
                }
            }
        }

        if terms.is_empty() || expect_term {
            return Err(Error::ParseError(format!(
                "Incomplete version expression \"{expr}\""
            )));
        }

        Ok(Self { terms })
    }

    /// Evaluate left to right, stopping at the first satisfied term
    pub fn matches(&self, version: &str) -> bool {
        self.terms
            .iter()
            .any(|(op, target)| op.holds(compare(version, target)))
    }

    pub fn terms(&self) -> &[(RelOp, String)] {
        &self.terms
    }
}

impl fmt::Display for VersionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|(op, v)| format!("{} {}", op.as_str(), v))
            .collect();
        write!(f, "{}", parts.join(" || "))
    }
}

/// Check a version against an expression string
pub fn version_match(version: &str, expr: &str) -> Result<bool> {
    Ok(VersionExpr::parse(expr)?.matches(version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_numeric_components() {
        assert_eq!(compare("1.2", "1.10"), Some(Ordering::Less));
        assert_eq!(compare("2.0", "10.0"), Some(Ordering::Less));
        assert_eq!(compare("1_2_3", "1.2.3"), Some(Ordering::Equal));
    }

    #[test]
    fn test_compare_prefix_is_older() {
        assert_eq!(compare("1.2", "1.2.0"), Some(Ordering::Less));
        assert_eq!(compare("1.2.0", "1.2"), Some(Ordering::Greater));
    }

    #[test]
    fn test_compare_pre_release_sorts_first() {
        assert_eq!(compare("1.10.0-rc2", "1.10.0"), Some(Ordering::Less));
        assert_eq!(compare("1.10.0m2", "1.10.0"), Some(Ordering::Less));
        assert_eq!(compare("1.10.0-rc1", "1.10.0-rc2"), Some(Ordering::Less));
        assert_eq!(compare("1.10.0-2", "1.10.0-10"), Some(Ordering::Less));
    }

    #[test]
    fn test_compare_patch_sorts_last() {
        assert_eq!(compare("1.10.0+hack1", "1.10.0"), Some(Ordering::Greater));
        assert_eq!(compare("1.10.0p1", "1.10.0"), Some(Ordering::Greater));
        assert_eq!(compare("1.10.0-rc1", "1.10.0+hack1"), Some(Ordering::Less));
    }

    #[test]
    fn test_compare_core_wins_over_modifier() {
        assert_eq!(compare("1.9+hack", "1.10-rc1"), Some(Ordering::Less));
    }

    #[test]
    fn test_compare_incomparable_kinds() {
        assert_eq!(compare("1.0", "v1.0"), None);
        assert_eq!(compare("v1.0", "1.0"), None);
        assert_eq!(compare("svn123", "svn124"), Some(Ordering::Less));
    }

    #[test]
    fn test_compare_reflexive() {
        for v in ["1.0", "1.10.0-rc2", "2.3+p4", "trunk", "1.2m3"] {
            assert_eq!(compare(v, v), Some(Ordering::Equal), "{v}");
        }
    }

    #[test]
    fn test_sort_order_falls_back_to_strings() {
        let mut versions = vec!["2.0", "v1", "1.10", "1.9"];
        versions.sort_by(|a, b| sort_order(a, b));
        assert_eq!(versions, vec!["1.9", "1.10", "2.0", "v1"]);
    }

    #[test]
    fn test_version_match_or_terms() {
        assert!(version_match("2.0", ">=1.0 || ==3.0").unwrap());
        assert!(!version_match("2.0", "<1.0 || ==3.0").unwrap());
        assert!(version_match("3.0", "<1.0 or 3.0").unwrap());
    }

    #[test]
    fn test_version_match_without_spaces() {
        assert!(version_match("1.5", ">1.0").unwrap());
        assert!(!version_match("1.0", ">1.0").unwrap());
        assert!(version_match("1.0", "<=1.0").unwrap());
    }

    #[test]
    fn test_incomparable_never_matches() {
        assert!(!version_match("trunk", ">= 1.0").unwrap());
        assert!(!version_match("trunk", "< 1.0").unwrap());
    }

    #[test]
    fn test_bare_equals_is_rejected() {
        assert!(VersionExpr::parse("= 1.0").is_err());
        assert!(VersionExpr::is_expression("=1.0").is_err());
        assert!(VersionExpr::is_expression("== 1.0").unwrap());
    }

    #[test]
    fn test_missing_disjunction_is_rejected() {
        assert!(VersionExpr::parse(">= 1.0 < 2.0").is_err());
        assert!(VersionExpr::parse(">= 1.0 ||").is_err());
        assert!(VersionExpr::parse("").is_err());
    }

    #[test]
    fn test_is_expression() {
        assert!(VersionExpr::is_expression(">= 1.0").unwrap());
        assert!(!VersionExpr::is_expression("1.0").unwrap());
        assert!(!VersionExpr::is_expression("current").unwrap());
    }

    #[test]
    fn test_expression_display() {
        let expr = VersionExpr::parse(">=1.0 || 3.0").unwrap();
        assert_eq!(expr.to_string(), ">= 1.0 || == 3.0");
    }
}
