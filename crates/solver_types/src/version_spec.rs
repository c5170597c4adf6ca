//! The version-matching half of a [`crate::MatchSpec`] (e.g. `>=1.2,<2.0`,
//! `1.2.*`, `==1.2.3`). Grounded on `rattler_conda_types::version_spec`, with
//! the combinator tree collapsed to the flat comma-conjunction form that is
//! all conda ever actually emits (a fuller `VersionTree`-style parser also
//! supports `|` and parenthesization; only comma-separated conjunctions are
//! needed here, so that is all this models).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::version::{ParseVersionError, Version};

/// A single comparison against a fixed version.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Constraint {
    /// `==1.2.3`, or a bare `1.2.3` with no operator.
    Exact(Version),
    /// `!=1.2.3`
    NotEqual(Version),
    /// `>1.2.3`
    Greater(Version),
    /// `>=1.2.3`
    GreaterEquals(Version),
    /// `<1.2.3`
    Less(Version),
    /// `<=1.2.3`
    LessEquals(Version),
    /// `1.2.*` — matches any version whose dotted prefix equals `1.2`.
    Fuzzy(Version),
}

impl Constraint {
    fn matches(&self, version: &Version) -> bool {
        match self {
            Constraint::Exact(v) => version == v,
            Constraint::NotEqual(v) => version != v,
            Constraint::Greater(v) => version > v,
            Constraint::GreaterEquals(v) => version >= v,
            Constraint::Less(v) => version < v,
            Constraint::LessEquals(v) => version <= v,
            Constraint::Fuzzy(prefix) => version.starts_with_segments(prefix),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Exact(v) => write!(f, "=={v}"),
            Constraint::NotEqual(v) => write!(f, "!={v}"),
            Constraint::Greater(v) => write!(f, ">{v}"),
            Constraint::GreaterEquals(v) => write!(f, ">={v}"),
            Constraint::Less(v) => write!(f, "<{v}"),
            Constraint::LessEquals(v) => write!(f, "<={v}"),
            Constraint::Fuzzy(v) => write!(f, "{v}.*"),
        }
    }
}

/// An error while parsing a [`VersionSpec`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ParseVersionSpecError {
    /// One of the comma-separated clauses failed to parse as a [`Version`].
    #[error("invalid version constraint `{0}`: {1}")]
    InvalidConstraint(String, ParseVersionError),
}

/// A conjunction of [`Constraint`]s (all must hold). Construct via
/// [`VersionSpec::from_str`] or [`VersionSpec::exact`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VersionSpec {
    constraints: Vec<Constraint>,
    source: String,
}

impl VersionSpec {
    /// A spec that matches only the given exact version.
    pub fn exact(version: Version) -> Self {
        let source = format!("=={version}");
        VersionSpec {
            constraints: vec![Constraint::Exact(version)],
            source,
        }
    }

    /// Whether `version` satisfies every clause in this spec.
    pub fn matches(&self, version: &Version) -> bool {
        self.constraints.iter().all(|c| c.matches(version))
    }

    /// True if this spec can only ever match one version (`==` or a bare
    /// pin with no operator), used to compute [`crate::Strictness`].
    pub fn is_exact(&self) -> bool {
        matches!(self.constraints.as_slice(), [Constraint::Exact(_)])
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl FromStr for VersionSpec {
    type Err = ParseVersionSpecError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let mut constraints = Vec::new();
        for clause in raw.split(',') {
            let clause = clause.trim();
            constraints.push(parse_clause(clause)?);
        }
        Ok(VersionSpec {
            constraints,
            source: raw.to_owned(),
        })
    }
}

fn parse_clause(clause: &str) -> Result<Constraint, ParseVersionSpecError> {
    let parse_err =
        |e: ParseVersionError| ParseVersionSpecError::InvalidConstraint(clause.to_owned(), e);

    if let Some(body) = clause.strip_suffix(".*") {
        let body = body.strip_prefix("==").unwrap_or(body);
        let version = Version::from_str(body).map_err(parse_err)?;
        return Ok(Constraint::Fuzzy(version));
    }
    for (prefix, ctor) in [
        (">=", Constraint::GreaterEquals as fn(Version) -> Constraint),
        ("<=", Constraint::LessEquals as fn(Version) -> Constraint),
        ("!=", Constraint::NotEqual as fn(Version) -> Constraint),
        ("==", Constraint::Exact as fn(Version) -> Constraint),
        (">", Constraint::Greater as fn(Version) -> Constraint),
        ("<", Constraint::Less as fn(Version) -> Constraint),
    ] {
        if let Some(body) = clause.strip_prefix(prefix) {
            let version = Version::from_str(body).map_err(parse_err)?;
            return Ok(ctor(version));
        }
    }
    let version = Version::from_str(clause).map_err(parse_err)?;
    Ok(Constraint::Exact(version))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn v(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    #[rstest]
    #[case("1.2.3", "1.2.3", true)]
    #[case("1.2.3", "1.2.4", false)]
    #[case(">=1.0,<2.0", "1.5", true)]
    #[case(">=1.0,<2.0", "2.0", false)]
    #[case("1.2.*", "1.2.9", true)]
    #[case("1.2.*", "1.3.0", false)]
    #[case("!=1.2.3", "1.2.4", true)]
    #[case("!=1.2.3", "1.2.3", false)]
    #[case(">1.0", "1.0", false)]
    #[case("<=1.0", "1.0", true)]
    fn operator_table(#[case] spec: &str, #[case] version: &str, #[case] expected: bool) {
        let spec = VersionSpec::from_str(spec).unwrap();
        assert_eq!(spec.matches(&v(version)), expected);
    }

    #[test]
    fn exact_match() {
        let spec = VersionSpec::from_str("1.2.3").unwrap();
        assert!(spec.matches(&v("1.2.3")));
        assert!(!spec.matches(&v("1.2.4")));
        assert!(spec.is_exact());
    }

    #[test]
    fn range_conjunction() {
        let spec = VersionSpec::from_str(">=1.0,<2.0").unwrap();
        assert!(spec.matches(&v("1.5")));
        assert!(!spec.matches(&v("2.0")));
        assert!(!spec.matches(&v("0.9")));
        assert!(!spec.is_exact());
    }

    #[test]
    fn fuzzy_wildcard() {
        let spec = VersionSpec::from_str("1.2.*").unwrap();
        assert!(spec.matches(&v("1.2.9")));
        assert!(!spec.matches(&v("1.3.0")));
    }

    #[test]
    fn fuzzy_wildcard_does_not_match_longer_segment() {
        // A naive string-prefix match would wrongly accept "1.20.0" here
        // since "1.20.0".starts_with("1.2") is true.
        let spec = VersionSpec::from_str("1.2.*").unwrap();
        assert!(!spec.matches(&v("1.20.0")));
    }

    #[test]
    fn not_equal() {
        let spec = VersionSpec::from_str("!=1.2.3").unwrap();
        assert!(!spec.matches(&v("1.2.3")));
        assert!(spec.matches(&v("1.2.4")));
    }
}
