//! `MatchSpec` — a constraint expression matching zero or more
//! [`crate::PackageRecord`]s. Grounded on `rattler_conda_types::match_spec`,
//! trimmed to the components an orchestration-layer solver actually needs
//! (no channel-URL parsing, no conditionals, no digest pins).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::package_record::PackageRecord;
use crate::version::Version;
use crate::version_spec::{ParseVersionSpecError, VersionSpec};

/// How specific a [`MatchSpec`] is. Higher is stricter. Used to decide
/// whether a retry-loop relaxation ("neutering") actually weakened a spec,
/// and to detect ambiguous multi-match situations during spec assembly.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct Strictness(pub u8);

/// A constraint expression. Every present field narrows the match; a field
/// left as `None` is a full wildcard for that component.
#[derive(Debug, Clone, Default)]
pub struct MatchSpec {
    /// The package name. `None` only ever appears on the synthetic
    /// `NamelessMatchSpec` produced by [`MatchSpec::without_name`]; a
    /// `MatchSpec` intended for matching always carries a name.
    pub name: Option<String>,
    /// Version constraint, see [`VersionSpec`].
    pub version: Option<VersionSpec>,
    /// Exact build string match.
    pub build: Option<String>,
    /// Exact build number match.
    pub build_number: Option<u64>,
    /// Exact channel match.
    pub channel: Option<String>,
    /// Exact subdir match.
    pub subdir: Option<String>,
    /// Required features (legacy feature-variant tagging).
    pub features: Option<Vec<String>>,
    /// Required track_features.
    pub track_features: Option<Vec<String>>,
    /// A hint pointing at an existing record this spec prefers, expressed
    /// as the record's identity string. Does not itself narrow
    /// `.matches()`.
    pub target: Option<String>,
    /// If true, the solver may drop this spec entirely rather than fail to
    /// satisfy it (used for pinned specs and inconsistency floats).
    pub optional: bool,
}

/// An error produced while parsing a [`MatchSpec`] from its string form.
#[derive(Debug, Error)]
pub enum ParseMatchSpecError {
    /// The spec string had no package name component.
    #[error("match spec `{0}` has no package name")]
    MissingName(String),
    /// The version clause failed to parse.
    #[error(transparent)]
    InvalidVersion(#[from] ParseVersionSpecError),
}

/// Raised by [`MatchSpec::merge`] when two specs for the same name cannot
/// be combined into one (e.g. disjoint exact-version pins).
#[derive(Debug, Error)]
#[error("specs for `{name}` conflict: `{a}` vs `{b}`")]
pub struct SpecsConfigurationConflict {
    /// The package name both specs share.
    pub name: String,
    /// The first spec's string form.
    pub a: String,
    /// The second spec's string form.
    pub b: String,
}

impl MatchSpec {
    /// A bare spec matching every build/version of the given name.
    pub fn name(name: impl Into<String>) -> Self {
        MatchSpec {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// A bare spec for `name`, with `target` set to prefer `target_id`.
    /// This is the "float to preserve deps" idiom used throughout
    /// `conda/core/solve.py`'s spec assembly phase.
    pub fn name_with_target(name: impl Into<String>, target_id: impl Into<String>) -> Self {
        MatchSpec {
            name: Some(name.into()),
            target: Some(target_id.into()),
            ..Default::default()
        }
    }

    /// The package name this spec constrains, if it has one.
    pub fn name_str(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// How strict this spec is: the count of non-wildcard components,
    /// weighted so an exact version pin counts for more than a range —
    /// more present components means a stricter spec.
    pub fn strictness(&self) -> Strictness {
        let mut score = 0u8;
        if let Some(v) = &self.version {
            score += if v.is_exact() { 3 } else { 1 };
        }
        score += self.build.is_some() as u8;
        score += self.build_number.is_some() as u8;
        score += self.channel.is_some() as u8;
        score += self.subdir.is_some() as u8;
        score += self.features.is_some() as u8;
        score += self.track_features.is_some() as u8;
        Strictness(score)
    }

    /// Whether `record` satisfies every present component of this spec.
    /// Virtual packages and records alike go through this path; the
    /// never-unlink-unmanageable invariant is enforced by callers, not by
    /// `matches` itself.
    pub fn matches(&self, record: &PackageRecord) -> bool {
        if let Some(name) = &self.name {
            if !name.eq_ignore_ascii_case(record.name.as_normalized().as_str()) {
                return false;
            }
        }
        if let Some(version) = &self.version {
            if !version.matches(&record.version) {
                return false;
            }
        }
        if let Some(build) = &self.build {
            if build != &record.build_string {
                return false;
            }
        }
        if let Some(build_number) = self.build_number {
            if build_number != record.build_number {
                return false;
            }
        }
        if let Some(channel) = &self.channel {
            if channel != &record.channel {
                return false;
            }
        }
        if let Some(subdir) = &self.subdir {
            if subdir != &record.subdir {
                return false;
            }
        }
        if let Some(features) = &self.features {
            if !features.iter().all(|f| record.features.contains(f)) {
                return false;
            }
        }
        if let Some(track_features) = &self.track_features {
            if !track_features
                .iter()
                .all(|f| record.track_features.contains(f))
            {
                return false;
            }
        }
        true
    }

    /// The strictest possible spec that still matches exactly `record`:
    /// every identity component pinned.
    pub fn to_match_spec_for(record: &PackageRecord) -> Self {
        MatchSpec {
            name: Some(record.name.as_source().to_owned()),
            version: Some(VersionSpec::exact(record.version.clone())),
            build: Some(record.build_string.clone()),
            build_number: Some(record.build_number),
            channel: Some(record.channel.clone()),
            subdir: Some(record.subdir.clone()),
            features: None,
            track_features: None,
            target: None,
            optional: false,
        }
    }

    /// Combines two specs for the same name by intersecting their
    /// constraints, failing if the combination can never match anything
    /// (currently detected only for conflicting exact version pins).
    pub fn merge(&self, other: &MatchSpec) -> Result<MatchSpec, SpecsConfigurationConflict> {
        let conflict = || SpecsConfigurationConflict {
            name: self.name.clone().unwrap_or_default(),
            a: self.to_string(),
            b: other.to_string(),
        };

        let version = match (&self.version, &other.version) {
            (Some(a), Some(b)) => {
                if a.is_exact() && b.is_exact() && a != b {
                    return Err(conflict());
                }
                Some(if a.is_exact() { a.clone() } else { b.clone() })
            }
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };

        if let (Some(a), Some(b)) = (&self.build, &other.build) {
            if a != b {
                return Err(conflict());
            }
        }

        Ok(MatchSpec {
            name: self.name.clone().or_else(|| other.name.clone()),
            version,
            build: self.build.clone().or_else(|| other.build.clone()),
            build_number: self.build_number.or(other.build_number),
            channel: self.channel.clone().or_else(|| other.channel.clone()),
            subdir: self.subdir.clone().or_else(|| other.subdir.clone()),
            features: self.features.clone().or_else(|| other.features.clone()),
            track_features: self
                .track_features
                .clone()
                .or_else(|| other.track_features.clone()),
            target: self.target.clone().or_else(|| other.target.clone()),
            optional: self.optional && other.optional,
        })
    }

    /// Same spec, with `features` cleared. Used by `PrefixGraph::remove_spec`
    /// when preserving a history spec across a track-features cascade
    /// removal.
    pub fn without_features(&self) -> Self {
        MatchSpec {
            features: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name.as_deref().unwrap_or("*"))?;
        if let Some(version) = &self.version {
            write!(f, " {version}")?;
        }
        if let Some(build) = &self.build {
            write!(f, " {build}")?;
        }
        Ok(())
    }
}

impl PartialEq for MatchSpec {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
            && self.channel == other.channel
            && self.subdir == other.subdir
            && self.build_number == other.build_number
            && self.features == other.features
            && self.track_features == other.track_features
    }
}

impl Eq for MatchSpec {}

impl std::hash::Hash for MatchSpec {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl FromStr for MatchSpec {
    type Err = ParseMatchSpecError;

    /// Parses the common `name`, `name version`, `name version build`
    /// forms. Bracketed key=value clauses are not supported; nothing this
    /// crate needs requires them.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let mut parts = raw.split_whitespace();
        let name = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ParseMatchSpecError::MissingName(raw.to_owned()))?;
        let version = parts.next().map(VersionSpec::from_str).transpose()?;
        let build = parts.next().map(str::to_owned);
        Ok(MatchSpec {
            name: Some(name.to_owned()),
            version,
            build,
            ..Default::default()
        })
    }
}

/// Parses a dependency/constraint expression string (as found in
/// [`PackageRecord::depends`]/`constrains`) down to just the package name,
/// the way `rattler_conda_types::repo_data::topological_sort`'s
/// `package_name_from_match_spec` does, without allocating a full
/// [`MatchSpec`].
pub fn package_name_from_expression(expr: &str) -> &str {
    expr.split_whitespace().next().unwrap_or(expr)
}

/// Parses `version` onto a fresh exact-version spec, used by the
/// `UPDATE_SPECS` "translate to max available" step.
pub fn exact_version_spec(version: &Version) -> VersionSpec {
    VersionSpec::exact(version.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_record::tests::sample_record;

    #[test]
    fn bare_name_matches_any_version() {
        let spec = MatchSpec::from_str("flask").unwrap();
        assert!(spec.matches(&sample_record("flask", "1.0.0", 0)));
        assert!(spec.matches(&sample_record("flask", "2.0.0", 0)));
    }

    #[test]
    fn version_clause_narrows_match() {
        let spec = MatchSpec::from_str("flask >=2.0").unwrap();
        assert!(!spec.matches(&sample_record("flask", "1.0.0", 0)));
        assert!(spec.matches(&sample_record("flask", "2.0.0", 0)));
    }

    #[test]
    fn to_match_spec_for_pins_everything() {
        let record = sample_record("flask", "2.0.0", 3);
        let spec = MatchSpec::to_match_spec_for(&record);
        assert!(spec.matches(&record));
        assert!(!spec.matches(&sample_record("flask", "2.0.1", 3)));
    }

    #[test]
    fn merge_conflicting_exact_pins_fails() {
        let a = MatchSpec::from_str("flask ==1.0.0").unwrap();
        let b = MatchSpec::from_str("flask ==2.0.0").unwrap();
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn merge_bare_with_pin_keeps_pin() {
        let a = MatchSpec::from_str("flask").unwrap();
        let b = MatchSpec::from_str("flask ==2.0.0").unwrap();
        let merged = a.merge(&b).unwrap();
        assert!(merged.matches(&sample_record("flask", "2.0.0", 0)));
        assert!(!merged.matches(&sample_record("flask", "1.0.0", 0)));
    }

    #[test]
    fn strictness_orders_pin_above_bare() {
        let bare = MatchSpec::from_str("flask").unwrap();
        let pinned = MatchSpec::from_str("flask ==2.0.0").unwrap();
        assert!(pinned.strictness() > bare.strictness());
    }
}
